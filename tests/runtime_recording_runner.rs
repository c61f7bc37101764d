// tests/runtime_recording_runner.rs
mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::init_tracing;
#[cfg(unix)]
use crate::common::{is_alive, read_pids, wait_for_pids};
use crate::common::recording_runner::RecordingRunner;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use assetdag::config::ConfigFile;
use assetdag::dag::{Scheduler, TaskGraph};
use assetdag::engine::{
    CoreRuntime, RunRequest, Runtime, RuntimeEvent, ShutdownReason, TriggerReason,
};
use assetdag::errors::AssetdagError;
#[cfg(unix)]
use assetdag::exec::ProcessSupervisor;
use assetdag::watch::WatchRouter;

fn project(window: &str) -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("clean-css", TaskConfigBuilder::group().build())
        .with_task(
            "css",
            TaskConfigBuilder::group()
                .after("clean-css")
                .watch("styles/**")
                .build(),
        )
        .with_task("fonts", TaskConfigBuilder::group().watch("fonts/**").build())
        .with_coalesce_window(window)
        .build()
}

fn runtime(
    cfg: &ConfigFile,
    runner: RecordingRunner,
) -> (Runtime, mpsc::Sender<RuntimeEvent>) {
    let graph = Arc::new(TaskGraph::from_config(cfg).unwrap());
    let router = WatchRouter::from_config(cfg).unwrap();
    let core = CoreRuntime::new(Arc::clone(&graph), router, false, None);
    let scheduler = Scheduler::new(graph, Arc::new(runner));
    let (tx, rx) = mpsc::channel(16);
    (Runtime::new(core, rx, scheduler, None), tx)
}

fn initial(tasks: &[&str]) -> RuntimeEvent {
    RuntimeEvent::RunRequested {
        request: RunRequest::new(tasks.iter().copied()),
        reason: TriggerReason::Initial,
    }
}

#[tokio::test]
async fn initial_run_executes_then_closed_channel_ends_the_loop() {
    crate::common::with_timeout(async {
        init_tracing();
        let runner = RecordingRunner::new();
        let (rt, tx) = runtime(&project("0ms"), runner.clone());

        tx.send(initial(&["css", "fonts"])).await.unwrap();
        drop(tx);

        let reason = rt.run().await.unwrap();
        assert_eq!(reason, ShutdownReason::EventsClosed);
        assert_eq!(runner.snapshot(), vec!["clean-css", "css", "fonts"]);
    })
    .await
}

#[tokio::test]
async fn file_change_runs_only_the_matching_task_closure() {
    crate::common::with_timeout(async {
        init_tracing();
        let runner = RecordingRunner::new();
        let (rt, tx) = runtime(&project("0ms"), runner.clone());

        tx.send(RuntimeEvent::PathChanged {
            path: "styles/index.scss".into(),
        })
        .await
        .unwrap();
        tx.send(RuntimeEvent::PathChanged {
            path: "scripts/app.js".into(),
        })
        .await
        .unwrap();
        drop(tx);

        rt.run().await.unwrap();
        assert_eq!(runner.snapshot(), vec!["clean-css", "css"]);
    })
    .await
}

#[tokio::test]
async fn changes_within_the_window_coalesce_into_one_run() {
    crate::common::with_timeout(async {
        init_tracing();
        let runner = RecordingRunner::new();
        let (rt, tx) = runtime(&project("100ms"), runner.clone());
        let handle = tokio::spawn(rt.run());

        for path in ["styles/a.scss", "fonts/x.woff", "styles/b.scss"] {
            tx.send(RuntimeEvent::PathChanged { path: path.into() })
                .await
                .unwrap();
        }

        // Let the window close before hanging up.
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(tx);

        handle.await.unwrap().unwrap();
        assert_eq!(runner.snapshot(), vec!["clean-css", "css", "fonts"]);
    })
    .await
}

#[tokio::test]
async fn failed_run_does_not_end_the_session() {
    crate::common::with_timeout(async {
        init_tracing();
        let runner = RecordingRunner::new().failing_on("clean-css");
        let (rt, tx) = runtime(&project("0ms"), runner.clone());

        tx.send(initial(&["css"])).await.unwrap();
        tx.send(RuntimeEvent::PathChanged {
            path: "fonts/x.woff".into(),
        })
        .await
        .unwrap();
        drop(tx);

        let reason = rt.run().await.unwrap();
        assert_eq!(reason, ShutdownReason::EventsClosed);
        assert_eq!(runner.snapshot(), vec!["clean-css", "fonts"]);
    })
    .await
}

#[tokio::test]
async fn shutdown_request_stops_with_its_reason() {
    crate::common::with_timeout(async {
        init_tracing();
        let runner = RecordingRunner::new();
        let (rt, tx) = runtime(&project("0ms"), runner.clone());

        tx.send(RuntimeEvent::ShutdownRequested {
            reason: ShutdownReason::Interrupted,
        })
        .await
        .unwrap();
        tx.send(initial(&["fonts"])).await.unwrap();

        let reason = rt.run().await.unwrap();
        assert_eq!(reason, ShutdownReason::Interrupted);
        assert_eq!(reason.exit_code(), 130);
        // Events after the shutdown request are never handled.
        assert!(runner.snapshot().is_empty());
    })
    .await
}

#[tokio::test]
async fn watcher_failure_is_fatal() {
    crate::common::with_timeout(async {
        init_tracing();
        let (rt, tx) = runtime(&project("0ms"), RecordingRunner::new());

        tx.send(RuntimeEvent::WatchFailed {
            message: "too many open files".into(),
        })
        .await
        .unwrap();

        let err = rt.run().await.unwrap_err();
        assert!(matches!(err, AssetdagError::WatchIoFailure(_)), "{err}");
        assert_eq!(err.exit_code(), 4);
    })
    .await
}

/// A runtime whose backend is a real supervised process.
#[cfg(unix)]
fn supervised_runtime(
    cfg: &ConfigFile,
    runner: RecordingRunner,
) -> (Runtime, mpsc::Sender<RuntimeEvent>) {
    let graph = Arc::new(TaskGraph::from_config(cfg).unwrap());
    let (tx, rx) = mpsc::channel(16);
    let backend = cfg.backend.clone().unwrap();
    let backend_task = backend.task.clone();
    let supervisor = ProcessSupervisor::new(backend, cfg.root.clone(), tx.clone());
    let core = CoreRuntime::new(
        Arc::clone(&graph),
        WatchRouter::from_config(cfg).unwrap(),
        true,
        backend_task,
    );
    let scheduler = Scheduler::new(graph, Arc::new(runner));
    (Runtime::new(core, rx, scheduler, Some(supervisor)), tx)
}

#[cfg(unix)]
#[tokio::test]
async fn backend_starts_after_initial_run_and_dies_with_the_runtime() {
    crate::common::with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("backend.pid");

        let cfg = ConfigFileBuilder::new()
            .with_task("build-server", TaskConfigBuilder::group().build())
            .with_backend(
                &["sh", "-c", "echo $$ > backend.pid; exec sleep 30"],
                Some("build-server"),
                &[8],
            )
            .with_coalesce_window("0ms")
            .build()
            .with_root(dir.path());

        let runner = RecordingRunner::new();
        let (rt, tx) = supervised_runtime(&cfg, runner.clone());
        let handle = tokio::spawn(rt.run());

        tx.send(initial(&["build-server"])).await.unwrap();
        let pid = wait_for_pids(&pid_file, 1).await[0];

        tx.send(RuntimeEvent::ShutdownRequested {
            reason: ShutdownReason::Terminated,
        })
        .await
        .unwrap();

        let reason = handle.await.unwrap().unwrap();
        assert_eq!(reason, ShutdownReason::Terminated);
        assert_eq!(runner.snapshot(), vec!["build-server"]);
        assert!(!is_alive(pid), "backend {pid} outlived the runtime");
    })
    .await
}

#[cfg(unix)]
#[tokio::test]
async fn backend_follows_its_task_and_waits_after_a_sentinel_exit() {
    crate::common::with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let pids = dir.path().join("backend.pids");
        let crash = dir.path().join("crash");

        // Runs until a `crash` file appears, then asks for a rebuild.
        let cfg = ConfigFileBuilder::new()
            .with_task(
                "build-server",
                TaskConfigBuilder::group().watch("server/**").build(),
            )
            .with_backend(
                &[
                    "sh",
                    "-c",
                    "echo $$ >> backend.pids; \
                     while [ ! -f crash ]; do sleep 0.05; done; \
                     rm -f crash; exit 8",
                ],
                Some("build-server"),
                &[8],
            )
            .with_coalesce_window("0ms")
            .build()
            .with_root(dir.path());

        let runner = RecordingRunner::new();
        let (rt, tx) = supervised_runtime(&cfg, runner.clone());
        let handle = tokio::spawn(rt.run());

        tx.send(initial(&["build-server"])).await.unwrap();
        let first = wait_for_pids(&pids, 1).await[0];

        // A change under the backend task's rule rebuilds and replaces it.
        tx.send(RuntimeEvent::PathChanged {
            path: "server/app.js".into(),
        })
        .await
        .unwrap();
        let second = wait_for_pids(&pids, 2).await[1];
        assert_ne!(first, second);
        assert!(!is_alive(first), "replaced backend {first} still running");

        // Restart code: the backend stays down.
        std::fs::write(&crash, "").unwrap();
        while is_alive(second) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(read_pids(&pids).len(), 2, "backend respawned without a build");

        // The next backend build brings it back.
        tx.send(RuntimeEvent::PathChanged {
            path: "server/app.js".into(),
        })
        .await
        .unwrap();
        let third = wait_for_pids(&pids, 3).await[2];
        assert!(is_alive(third));

        tx.send(RuntimeEvent::ShutdownRequested {
            reason: ShutdownReason::HungUp,
        })
        .await
        .unwrap();

        let reason = handle.await.unwrap().unwrap();
        assert_eq!(reason, ShutdownReason::HungUp);
        assert_eq!(reason.exit_code(), 129);
        assert!(!is_alive(third), "backend {third} outlived the runtime");
        assert_eq!(
            runner.snapshot(),
            vec!["build-server", "build-server", "build-server"]
        );
    })
    .await
}
