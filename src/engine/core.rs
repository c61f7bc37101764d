// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces a list of commands describing what
//! the IO shell should do next.
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels and sleeping until coalescing deadlines
//! - executing resolved runs through the scheduler
//! - driving the process supervisor
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes. Time is passed in explicitly.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler::RunReport;
use crate::dag::task_info::TaskRunState;
use crate::engine::{RunRequest, RuntimeEvent, ShutdownReason, TaskName, TriggerReason};
use crate::watch::router::WatchRouter;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Execute `order` (the resolution of `request`) now.
    ExecuteRun {
        request: RunRequest,
        order: Vec<TaskName>,
        reason: TriggerReason,
    },
    /// Stop the backend (if running) and start it again.
    RestartBackend,
    /// Hand a backend exit to the supervisor.
    BackendExited { generation: u64, code: Option<i32> },
    /// Leave the event loop.
    Stop(ShutdownReason),
    /// Leave the event loop with a fatal watch failure.
    Abort { message: String },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    fn with(command: CoreCommand) -> Self {
        Self {
            commands: vec![command],
            keep_running: true,
        }
    }

    fn stop(command: CoreCommand) -> Self {
        Self {
            commands: vec![command],
            keep_running: false,
        }
    }
}

/// Pure core runtime state.
///
/// This owns:
/// - the (immutable) task graph, for resolving run requests
/// - the watch router and its coalescing window
/// - what it needs to know about the backend to decide restarts
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    graph: Arc<TaskGraph>,
    router: WatchRouter,
    has_backend: bool,
    backend_task: Option<TaskName>,
}

impl CoreRuntime {
    pub fn new(
        graph: Arc<TaskGraph>,
        router: WatchRouter,
        has_backend: bool,
        backend_task: Option<TaskName>,
    ) -> Self {
        Self {
            graph,
            router,
            has_backend,
            backend_task,
        }
    }

    /// When the shell should call [`poll`](Self::poll) next, if ever.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.router.next_deadline()
    }

    /// Handle a single runtime event, returning the resulting commands.
    pub fn step(&mut self, event: RuntimeEvent, now: Instant) -> CoreStep {
        match event {
            RuntimeEvent::PathChanged { path } => {
                if !self.router.on_path_changed(&path, now) {
                    return CoreStep::idle();
                }
                // A zero-length window releases immediately.
                self.poll(now)
            }
            RuntimeEvent::RunRequested { request, reason } => self.plan_run(request, reason),
            RuntimeEvent::ProcessExited { generation, code } => {
                CoreStep::with(CoreCommand::BackendExited { generation, code })
            }
            RuntimeEvent::ShutdownRequested { reason } => {
                info!(?reason, "shutdown requested");
                CoreStep::stop(CoreCommand::Stop(reason))
            }
            RuntimeEvent::WatchFailed { message } => {
                error!(error = %message, "file watching failed");
                CoreStep::stop(CoreCommand::Abort { message })
            }
        }
    }

    /// Release a coalesced request whose window has closed.
    pub fn poll(&mut self, now: Instant) -> CoreStep {
        match self.router.poll(now) {
            Some(request) => self.plan_run(request, TriggerReason::FileWatch),
            None => CoreStep::idle(),
        }
    }

    fn plan_run(&self, request: RunRequest, reason: TriggerReason) -> CoreStep {
        if request.is_empty() && reason != TriggerReason::Initial {
            return CoreStep::idle();
        }
        match self.graph.resolve(request.tasks()) {
            Ok(order) => {
                debug!(?reason, tasks = ?request.tasks(), ?order, "planned run");
                CoreStep::with(CoreCommand::ExecuteRun {
                    request,
                    order,
                    reason,
                })
            }
            Err(err) => {
                // Watch mode isolates per-request failures.
                error!(error = %err, tasks = ?request.tasks(), "cannot resolve run request");
                CoreStep::idle()
            }
        }
    }

    /// Decide what follows a finished run.
    ///
    /// - After the initial run the backend is started, unless its task was
    ///   part of the run and did not succeed.
    /// - After a file-triggered run it is restarted only if its task ran and
    ///   succeeded.
    pub fn on_run_finished(&self, reason: TriggerReason, report: &RunReport) -> CoreStep {
        if !self.has_backend || report.interrupted {
            return CoreStep::idle();
        }

        let restart = match (&self.backend_task, reason) {
            (Some(task), TriggerReason::Initial) => report
                .state_of(task)
                .is_none_or(|state| state == TaskRunState::Succeeded),
            (None, TriggerReason::Initial) => true,
            (Some(task), TriggerReason::FileWatch) => report.succeeded(task),
            (None, TriggerReason::FileWatch) => false,
        };

        if restart {
            CoreStep::with(CoreCommand::RestartBackend)
        } else {
            CoreStep::idle()
        }
    }
}
