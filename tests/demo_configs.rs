// tests/demo_configs.rs
mod common;
use crate::common::{demo_dir, init_tracing};

use assetdag::config::load_and_validate;
use assetdag::dag::{SideEffect, StageKind, TaskGraph};
use assetdag::engine::RunRequest;
use assetdag::types::Environment;
use assetdag::watch::WatchRouter;

#[test]
fn webapp_demo_loads_and_validates() {
    init_tracing();
    let cfg = load_and_validate(demo_dir("webapp").join("Assetdag.toml")).unwrap();

    assert_eq!(cfg.environment(), Environment::Dev);
    assert_eq!(cfg.root, demo_dir("webapp"));
    assert!(cfg.manifest.contains("desktop"));
    assert!(cfg.manifest.contains("mobile"));

    let backend = cfg.backend.as_ref().unwrap();
    assert_eq!(backend.command, vec!["docker-compose", "up"]);
    assert_eq!(backend.task.as_deref(), Some("build-server"));
    assert!(backend.restart_exit_codes.contains(&8));
}

#[test]
fn webapp_demo_resolves_the_default_build() {
    let cfg = load_and_validate(demo_dir("webapp").join("Assetdag.toml")).unwrap();
    let graph = TaskGraph::from_config(&cfg).unwrap();

    let order = graph.resolve(&cfg.config.default_tasks).unwrap();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

    assert!(pos("clean-css") < pos("css"));
    assert!(pos("clean-root") < pos("root"));
    assert!(pos("app-files") < pos("clean-server"));
    assert!(pos("clean-server") < pos("build-server"));
    assert!(!order.iter().any(|n| n == "clean-dest"));

    let css = graph.get("css").unwrap();
    assert_eq!(css.action.kind, StageKind::Stylesheet);
    assert!(css.action.effects.contains(&SideEffect::LiveReload));
}

#[test]
fn webapp_demo_watch_rules_route_changes() {
    let cfg = load_and_validate(demo_dir("webapp").join("Assetdag.toml")).unwrap();
    let router = WatchRouter::from_config(&cfg).unwrap();

    assert_eq!(
        router.match_path("source/less/_variables.scss"),
        Some(RunRequest::new(["css"]))
    );
    assert_eq!(
        router.match_path("sources.json"),
        Some(RunRequest::new(["desktop-js"]))
    );
    assert_eq!(
        router.match_path("source/server/app.js"),
        Some(RunRequest::new(["build-server"]))
    );
    assert_eq!(
        router.match_path("Dockerfile"),
        Some(RunRequest::new(["app-files"]))
    );
    assert_eq!(router.match_path("_package/app.js"), None);
    assert_eq!(router.match_path("source/less/index.scss.swp"), None);
}
