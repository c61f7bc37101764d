// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod stages;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{RunReport, Scheduler, TaskGraph};
use crate::engine::{
    CoreRuntime, RunMode, RunRequest, Runtime, RuntimeEvent, ShutdownReason, TaskName,
    TriggerReason,
};
use crate::errors::{AssetdagError, Result};
use crate::exec::{ProcessSupervisor, StageRunner};
use crate::stages::{livereload, PipelineRunner};
use crate::watch::{spawn_watcher, RuleSet, WatchRouter};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, then runs the selected mode. Returns the
/// process exit status for a normal end (0, or 129/130/143 after a signal).
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = Arc::new(TaskGraph::from_config(&cfg)?);
    let requested = requested_tasks(&args, &cfg, &graph);

    if args.dry_run {
        print_dry_run(&cfg, &graph, &requested, args.mode())?;
        return Ok(0);
    }

    match args.mode() {
        RunMode::Build => {
            let report = build(&cfg, graph, &requested).await?;
            info!(tasks = report.records.len(), "build finished");
            Ok(0)
        }
        RunMode::Watch => {
            let reason = watch(&cfg, graph, &requested).await?;
            Ok(reason.exit_code())
        }
    }
}

/// CLI task names, else `[config].default_tasks`, else every task.
fn requested_tasks(args: &CliArgs, cfg: &ConfigFile, graph: &TaskGraph) -> Vec<TaskName> {
    if !args.tasks().is_empty() {
        return args.tasks().to_vec();
    }
    if !cfg.config.default_tasks.is_empty() {
        return cfg.config.default_tasks.clone();
    }
    graph.task_names().map(str::to_string).collect()
}

/// One-shot build: resolve, execute in order, fail on the first failing task.
pub async fn build(cfg: &ConfigFile, graph: Arc<TaskGraph>, tasks: &[TaskName]) -> Result<RunReport> {
    let runner: Arc<dyn StageRunner> = Arc::new(PipelineRunner::from_config(cfg));
    build_with(graph, runner, tasks).await
}

/// [`build`] with an explicit stage runner.
pub async fn build_with(
    graph: Arc<TaskGraph>,
    runner: Arc<dyn StageRunner>,
    tasks: &[TaskName],
) -> Result<RunReport> {
    let order = graph.resolve(tasks)?;
    info!(?order, "building");
    let mut scheduler = Scheduler::new(graph, runner);
    scheduler.execute(&order, None).await.into_result()
}

/// Continuous mode: initial build, backend start, then rebuild on changes
/// until a signal arrives or file watching fails.
///
/// This wires together:
/// - the pipeline runner (with the live-reload server when a task wants it)
/// - the file watcher
/// - Ctrl-C / SIGTERM handling
/// - the process supervisor
/// - core + runtime
pub async fn watch(
    cfg: &ConfigFile,
    graph: Arc<TaskGraph>,
    tasks: &[TaskName],
) -> Result<ShutdownReason> {
    // Unknown names are fatal here, before anything starts.
    graph.resolve(tasks)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (flag_tx, flag_rx) = tokio::sync::watch::channel(false);

    let mut runner = PipelineRunner::from_config(cfg);
    if cfg.wants_live_reload() {
        match livereload::start(cfg.config.live_reload_port) {
            Ok(handle) => runner = runner.with_live_reload(handle),
            Err(err) => {
                let msg = format!("{err:#}");
                warn!(error = %msg, "live reload disabled");
            }
        }
    }

    let _watcher = spawn_watcher(&cfg.root, rt_tx.clone())
        .map_err(|e| AssetdagError::WatchIoFailure(format!("{e:#}")))?;

    spawn_signal_listener(rt_tx.clone(), flag_tx);

    let supervisor = cfg
        .backend
        .clone()
        .map(|spec| ProcessSupervisor::new(spec, cfg.root.clone(), rt_tx.clone()));
    let backend_task = cfg.backend.as_ref().and_then(|b| b.task.clone());

    let router = WatchRouter::from_config(cfg)?;
    let core = CoreRuntime::new(Arc::clone(&graph), router, supervisor.is_some(), backend_task);

    rt_tx
        .send(RuntimeEvent::RunRequested {
            request: RunRequest::new(tasks.iter().cloned()),
            reason: TriggerReason::Initial,
        })
        .await
        .map_err(|_| anyhow!("runtime event channel closed before start"))?;

    let scheduler = Scheduler::new(graph, Arc::new(runner));
    Runtime::new(core, rt_rx, scheduler, supervisor)
        .with_shutdown_flag(flag_rx)
        .run()
        .await
}

/// Ctrl-C / SIGTERM / SIGHUP → raise the shutdown flag, then tell the runtime.
fn spawn_signal_listener(
    tx: mpsc::Sender<RuntimeEvent>,
    flag: tokio::sync::watch::Sender<bool>,
) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        let reason = tokio::select! {
            _ = ctrl_c => ShutdownReason::Interrupted,
            reason = wait_for_unix_signal() => reason,
        };

        let _ = flag.send(true);
        let _ = tx.send(RuntimeEvent::ShutdownRequested { reason }).await;
    });
}

/// SIGTERM or SIGHUP, whichever comes first.
#[cfg(unix)]
async fn wait_for_unix_signal() -> ShutdownReason {
    use tokio::signal::unix::{signal, SignalKind};

    async fn recv(kind: SignalKind, name: &str) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, signal = name, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    }

    tokio::select! {
        _ = recv(SignalKind::terminate(), "SIGTERM") => ShutdownReason::Terminated,
        _ = recv(SignalKind::hangup(), "SIGHUP") => ShutdownReason::HungUp,
    }
}

#[cfg(not(unix))]
async fn wait_for_unix_signal() -> ShutdownReason {
    std::future::pending::<ShutdownReason>().await
}

/// Dry-run output: print the resolved order, watch rules and backend.
fn print_dry_run(
    cfg: &ConfigFile,
    graph: &TaskGraph,
    requested: &[TaskName],
    mode: RunMode,
) -> Result<()> {
    let order = graph.resolve(requested)?;
    let rules = RuleSet::from_config(cfg)?;

    println!("assetdag dry-run");
    println!("  mode = {mode:?}");
    println!("  environment = {}", cfg.environment());
    println!("  root = {}", cfg.root.display());
    println!("  out_dir = {}", cfg.config.out_dir);
    println!("  coalesce_window = {:?}", cfg.coalesce_window);
    println!();

    println!("run order ({}):", order.len());
    for (idx, name) in order.iter().enumerate() {
        let Some(spec) = graph.get(name) else { continue };
        println!("  {}. {name} [{:?}]", idx + 1, spec.action.kind);
        if !spec.prerequisites.is_empty() {
            println!("      after: {:?}", spec.prerequisites);
        }
        if !spec.action.sources.is_empty() {
            println!("      src: {:?}", spec.action.sources);
        }
        if let Some(dest) = &spec.action.destination {
            println!("      dest: {}", dest.display());
        }
        if !spec.action.effects.is_empty() {
            println!("      effects: {:?}", spec.action.effects);
        }
    }

    if mode == RunMode::Watch {
        println!();
        println!("watch rules ({}):", rules.rules().len());
        for rule in rules.rules() {
            println!("  {} -> {:?}", rule.glob(), rule.triggered_tasks());
        }
        println!("  exclude: {:?}", rules.exclude_patterns());

        if let Some(backend) = &cfg.backend {
            println!();
            println!("backend:");
            println!("  cmd: {:?}", backend.command);
            if let Some(task) = &backend.task {
                println!("  task: {task}");
            }
            println!("  restart_exit_codes: {:?}", backend.restart_exit_codes);
            println!("  kill_timeout: {:?}", backend.kill_timeout);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
