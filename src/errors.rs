// src/errors.rs

//! Crate-wide error type and aliases.

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cyclic dependency between tasks: {}", render_cycle(.cycle))]
    CyclicDependency { cycle: Vec<TaskName> },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task '{task}' failed: {source:#}")]
    StageFailure {
        task: TaskName,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to start backend process `{command}`: {source}")]
    ProcessSpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File watching failed: {0}")]
    WatchIoFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetdagError {
    /// Process exit status used by `main` when this error ends the program.
    pub fn exit_code(&self) -> i32 {
        match self {
            AssetdagError::StageFailure { .. } => 1,
            AssetdagError::ConfigError(_)
            | AssetdagError::TaskNotFound(_)
            | AssetdagError::TomlError(_)
            | AssetdagError::JsonError(_) => 2,
            AssetdagError::CyclicDependency { .. } => 3,
            AssetdagError::WatchIoFailure(_) => 4,
            AssetdagError::ProcessSpawnFailure { .. } => 5,
            AssetdagError::IoError(_) | AssetdagError::Other(_) => 1,
        }
    }
}

/// `a -> b -> a`; the first task is repeated at the end to close the loop.
fn render_cycle(cycle: &[TaskName]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
