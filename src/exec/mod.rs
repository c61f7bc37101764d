// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `StageRunner` trait the scheduler runs tasks
//!   through; tests replace it with a recording fake.
//! - [`supervisor`] owns the backend process and its state machine.
//! - [`process`] spawns, monitors and terminates that process with
//!   `tokio::process::Command`.

pub mod backend;
pub mod process;
pub mod supervisor;

pub use backend::{StageOutput, StageRunner};
pub use supervisor::{ExitDisposition, ProcessSupervisor, SupervisorState};
