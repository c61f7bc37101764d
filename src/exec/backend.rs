// src/exec/backend.rs

//! Pluggable stage runner abstraction.
//!
//! The scheduler talks to a `StageRunner` instead of calling the pipeline
//! stages directly. Production code uses
//! [`PipelineRunner`](crate::stages::PipelineRunner); tests provide their own
//! implementation that, for example, records which tasks ran and fails on
//! demand without touching the filesystem.

use std::path::PathBuf;

use crate::dag::task_info::TaskSpec;

/// Files a stage wrote (or removed, for clean stages).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    pub outputs: Vec<PathBuf>,
}

impl StageOutput {
    pub fn new(outputs: Vec<PathBuf>) -> Self {
        Self { outputs }
    }
}

/// Runs one task's pipeline stage to completion.
///
/// Called from the blocking thread pool, one task at a time, so
/// implementations may do synchronous IO freely.
pub trait StageRunner: Send + Sync {
    fn run_stage(&self, task: &TaskSpec) -> anyhow::Result<StageOutput>;
}
