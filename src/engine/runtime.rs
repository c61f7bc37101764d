// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::dag::scheduler::Scheduler;
use crate::errors::{AssetdagError, Result};
use crate::exec::supervisor::{ExitDisposition, ProcessSupervisor};

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent, ShutdownReason};

/// Drives the scheduler and the process supervisor in response to
/// `RuntimeEvent`s.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. It is the single consumer of the event channel: runs
/// execute inline, so no two runs overlap and supervisor transitions never
/// interleave with task execution.
pub struct Runtime {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    scheduler: Scheduler,
    supervisor: Option<ProcessSupervisor>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        scheduler: Scheduler,
        supervisor: Option<ProcessSupervisor>,
    ) -> Self {
        Self {
            core,
            event_rx,
            scheduler,
            supervisor,
            shutdown: None,
        }
    }

    /// Flag checked between tasks so a shutdown request does not wait for
    /// the rest of a long run.
    pub fn with_shutdown_flag(mut self, flag: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`, waking up for coalescing
    ///   deadlines in between.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core.
    ///
    /// Whatever way the loop ends, the backend process is shut down before
    /// this returns.
    pub async fn run(mut self) -> Result<ShutdownReason> {
        info!("assetdag runtime started");

        let result = self.event_loop().await;

        if let Some(supervisor) = self.supervisor.as_mut() {
            supervisor.shutdown().await;
        }

        info!("runtime exiting");
        result
    }

    async fn event_loop(&mut self) -> Result<ShutdownReason> {
        loop {
            let deadline = self.core.next_deadline();

            let step = tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => {
                        debug!(?event, "runtime received event");
                        self.core.step(event, Instant::now())
                    }
                    None => {
                        info!("runtime event channel closed; exiting");
                        return Ok(ShutdownReason::EventsClosed);
                    }
                },
                _ = sleep_until(deadline) => self.core.poll(Instant::now()),
            };

            let keep_running = step.keep_running;
            if let Some(reason) = self.execute_commands(step.commands).await? {
                return Ok(reason);
            }
            if !keep_running {
                info!("core requested exit; stopping runtime");
                return Ok(ShutdownReason::EventsClosed);
            }
        }
    }

    /// Execute commands from the core, including the follow-ups a finished
    /// run produces. Returns the shutdown reason if one of them ends the loop.
    async fn execute_commands(
        &mut self,
        commands: Vec<CoreCommand>,
    ) -> Result<Option<ShutdownReason>> {
        let mut queue: VecDeque<CoreCommand> = commands.into();

        while let Some(command) = queue.pop_front() {
            match command {
                CoreCommand::ExecuteRun {
                    request,
                    order,
                    reason,
                } => {
                    info!(?reason, tasks = ?request.tasks(), "running tasks");
                    let report = self.scheduler.execute(&order, self.shutdown.as_ref()).await;
                    if let Some(err) = &report.failure {
                        // Isolated: the session keeps watching.
                        error!(run_id = report.run_id, error = %err, "run failed; waiting for changes");
                    }
                    queue.extend(self.core.on_run_finished(reason, &report).commands);
                }
                CoreCommand::RestartBackend => self.restart_backend().await,
                CoreCommand::BackendExited { generation, code } => {
                    if let Some(supervisor) = self.supervisor.as_mut() {
                        let disposition = supervisor.on_exited(generation, code);
                        debug!(generation, ?disposition, "handled backend exit");
                        if let ExitDisposition::RebuildRequested(_) = disposition {
                            info!("backend will be relaunched after its task rebuilds");
                        }
                    }
                }
                CoreCommand::Stop(reason) => return Ok(Some(reason)),
                CoreCommand::Abort { message } => {
                    return Err(AssetdagError::WatchIoFailure(message));
                }
            }
        }

        Ok(None)
    }

    async fn restart_backend(&mut self) {
        let Some(supervisor) = self.supervisor.as_mut() else {
            return;
        };
        // A spawn failure is reported and the session goes on, so a
        // fix-and-save can retry.
        if let Err(err) = supervisor.restart().await {
            error!(error = %err, "backend did not start; waiting for changes");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}
