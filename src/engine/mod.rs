// src/engine/mod.rs

//! Orchestration engine for assetdag.
//!
//! This module ties together:
//! - the task graph and scheduler (what runs, in which order)
//! - the watch router (which file changes trigger which tasks)
//! - the process supervisor (the backend's lifecycle)
//! - the main runtime event loop that reacts to:
//!   - file-watch events
//!   - backend process exits
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// An ordered, deduplicated list of tasks to execute now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    tasks: Vec<TaskName>,
}

impl RunRequest {
    /// Build a request, keeping the first occurrence of each name.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        let mut request = Self::default();
        request.extend(names);
        request
    }

    /// Append names not already present, preserving order.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        for name in names {
            let name = name.into();
            if !self.tasks.contains(&name) {
                self.tasks.push(name);
            }
        }
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn contains(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t == task)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Why a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The initial build at startup.
    Initial,
    /// Triggered due to a filesystem event.
    FileWatch,
}

/// Why the runtime is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C.
    Interrupted,
    /// SIGTERM.
    Terminated,
    /// SIGHUP: the controlling terminal went away.
    HungUp,
    /// Every event producer went away.
    EventsClosed,
}

impl ShutdownReason {
    /// Conventional exit status for this reason (128 + signal number).
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownReason::Interrupted => 130,
            ShutdownReason::Terminated => 143,
            ShutdownReason::HungUp => 129,
            ShutdownReason::EventsClosed => 0,
        }
    }
}

/// Which orchestrator mode the runtime runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resolve and execute once, then exit. No watching, no backend.
    Build,
    /// Build once, start the backend, then follow file changes.
    Watch,
}

/// Events flowing into the runtime from watchers, the supervisor and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A file changed; `path` is relative to the project root.
    PathChanged { path: String },
    /// Run these tasks (and their prerequisites) now.
    RunRequested {
        request: RunRequest,
        reason: TriggerReason,
    },
    /// The backend process exited on its own.
    ProcessExited { generation: u64, code: Option<i32> },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested { reason: ShutdownReason },
    /// The filesystem watcher itself failed.
    WatchFailed { message: String },
}

pub mod core;
pub mod runtime;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use runtime::Runtime;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_dedups_in_order() {
        let mut req = RunRequest::new(["css", "root", "css"]);
        req.extend(["fonts", "root"]);
        assert_eq!(req.tasks(), ["css", "root", "fonts"]);
        assert!(req.contains("fonts"));
        assert_eq!(req.len(), 3);
    }

    #[test]
    fn signal_reasons_map_to_conventional_exit_codes() {
        assert_eq!(ShutdownReason::HungUp.exit_code(), 129);
        assert_eq!(ShutdownReason::Interrupted.exit_code(), 130);
        assert_eq!(ShutdownReason::Terminated.exit_code(), 143);
        assert_eq!(ShutdownReason::EventsClosed.exit_code(), 0);
    }
}
