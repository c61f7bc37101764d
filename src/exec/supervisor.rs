// src/exec/supervisor.rs

use std::fmt;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::model::BackendConfig;
use crate::engine::RuntimeEvent;
use crate::errors::{AssetdagError, Result};
use crate::exec::process::{backend_command, describe, monitor};

/// Lifecycle of the supervised backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What a `ProcessExited` event meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// The backend exited with a configured restart code: it wants a rebuild
    /// and will be relaunched once the backend task succeeds again.
    RebuildRequested(i32),
    /// Any other non-zero exit (or death by signal, `None`).
    Failed(Option<i32>),
    /// Exit status 0.
    Clean,
    /// The event belongs to a process this supervisor already replaced.
    Stale,
}

/// Internal handle for the running backend.
///
/// - `stop` asks the monitor task to terminate the child.
/// - `handle` is the Tokio task that owns the child and waits on it.
struct ActiveProcess {
    generation: u64,
    pid: Option<u32>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Owns zero or one backend process.
///
/// Every transition goes through `&mut self`, so restarts are serialized by
/// the single runtime consumer that owns the supervisor. A new process is
/// spawned only after the previous one has been reaped.
pub struct ProcessSupervisor {
    spec: BackendConfig,
    root: PathBuf,
    state: SupervisorState,
    generation: u64,
    active: Option<ActiveProcess>,
    events: mpsc::Sender<RuntimeEvent>,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("command", &self.spec.command)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("pid", &self.pid())
            .finish()
    }
}

impl ProcessSupervisor {
    pub fn new(
        spec: BackendConfig,
        root: impl Into<PathBuf>,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            spec,
            root: root.into(),
            state: SupervisorState::Stopped,
            generation: 0,
            active: None,
            events,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Generation of the most recently spawned process (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// OS pid of the running backend, if any.
    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().and_then(|a| a.pid)
    }

    /// Stop the current process (if any), then start a fresh one.
    ///
    /// A spawn failure leaves the supervisor `Stopped` and is returned as
    /// `ProcessSpawnFailure`; the caller decides whether that is fatal.
    pub async fn restart(&mut self) -> Result<()> {
        if self.active.is_some() {
            info!(generation = self.generation, "restarting backend process");
            self.stop().await;
        }

        self.state = SupervisorState::Starting;
        self.generation += 1;
        let generation = self.generation;
        let command = describe(&self.spec.command);

        let child = match backend_command(&self.spec, &self.root).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = SupervisorState::Stopped;
                error!(generation, %command, error = %source, "failed to start backend process");
                return Err(AssetdagError::ProcessSpawnFailure { command, source });
            }
        };

        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(monitor(
            child,
            generation,
            stop_rx,
            self.spec.kill_timeout,
            self.events.clone(),
        ));

        self.active = Some(ActiveProcess {
            generation,
            pid,
            stop: Some(stop_tx),
            handle,
        });
        self.state = SupervisorState::Running;
        info!(generation, pid = ?pid, %command, "backend process started");
        Ok(())
    }

    /// Terminate the current process and wait until it has been reaped.
    pub async fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            self.state = SupervisorState::Stopped;
            return;
        };

        self.state = SupervisorState::Stopping;
        debug!(generation = active.generation, pid = ?active.pid, "stopping backend process");

        if let Some(stop) = active.stop.take() {
            // Err means the monitor already saw the process exit.
            let _ = stop.send(());
        }
        if let Err(err) = active.handle.await {
            warn!(generation = active.generation, error = %err, "backend monitor task failed");
        }

        self.state = SupervisorState::Stopped;
    }

    /// Guaranteed-kill path used on every runtime exit.
    pub async fn shutdown(&mut self) {
        if self.active.is_some() {
            info!("shutting down backend process");
        }
        self.stop().await;
    }

    /// Interpret a `ProcessExited` event.
    ///
    /// Never respawns: after a restart code the runtime rebuilds the backend
    /// task and calls [`restart`](Self::restart) itself.
    pub fn on_exited(&mut self, generation: u64, code: Option<i32>) -> ExitDisposition {
        let current = self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation);
        if !current {
            debug!(generation, exit_code = ?code, "ignoring exit of a replaced backend process");
            return ExitDisposition::Stale;
        }

        // The monitor has already returned; dropping the handle detaches it.
        self.active = None;
        self.state = SupervisorState::Stopped;

        match code {
            Some(0) => {
                info!(generation, "backend process exited cleanly");
                ExitDisposition::Clean
            }
            Some(c) if self.spec.restart_exit_codes.contains(&c) => {
                warn!(generation, exit_code = c, "Error detected, waiting for changes...");
                ExitDisposition::RebuildRequested(c)
            }
            other => {
                error!(generation, exit_code = ?other, "backend process failed");
                ExitDisposition::Failed(other)
            }
        }
    }
}
