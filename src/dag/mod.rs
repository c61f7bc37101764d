// src/dag/mod.rs

//! Task graph and execution.
//!
//! - [`graph`] holds the immutable task DAG and resolves run orders.
//! - [`scheduler`] executes a resolved order one task at a time.
//! - [`task_info`] provides task specs, stage configs and per-run records.

pub mod graph;
pub mod scheduler;
pub mod task_info;

pub use graph::TaskGraph;
pub use scheduler::{RunReport, Scheduler};
pub use task_info::{SideEffect, StageConfig, StageKind, TaskRecord, TaskRunState, TaskSpec};
