// src/dag/task_info.rs

//! Task metadata and per-run outcome types.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{StageKindConfig, TaskConfig};
use crate::engine::TaskName;
use crate::types::Environment;

/// What a stage does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    /// Grouping task: prerequisites only.
    None,
    /// Copy matched files, preserving paths relative to each glob's base.
    Copy,
    /// Compile stylesheet entries to `<stem>.css`.
    Stylesheet,
    /// Concatenate the manifest files of `bundle` into `<bundle>.js`.
    Bundle {
        bundle: String,
        preamble: Option<String>,
    },
    /// Delete the destination, or only its top-level files when `shallow`.
    Clean { shallow: bool, keep: Vec<String> },
}

/// Optional post-stage effect. Only present in a dev build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Notify { title: String },
    LiveReload,
}

/// Everything a pipeline stage needs to run once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub kind: StageKind,
    /// Source globs, relative to the project root.
    pub sources: Vec<String>,
    /// Output directory, relative to the project root.
    pub destination: Option<PathBuf>,
    pub minify: bool,
    pub emit_source_map: bool,
    /// Effects to run after the stage succeeds, in order.
    pub effects: Vec<SideEffect>,
}

impl StageConfig {
    /// A stage that does nothing.
    pub fn none() -> Self {
        Self {
            kind: StageKind::None,
            sources: Vec::new(),
            destination: None,
            minify: false,
            emit_source_map: false,
            effects: Vec::new(),
        }
    }

    pub fn from_config(name: &str, cfg: &TaskConfig, env: Environment) -> Self {
        let kind = match cfg.stage {
            StageKindConfig::None => StageKind::None,
            StageKindConfig::Copy => StageKind::Copy,
            StageKindConfig::Stylesheet => StageKind::Stylesheet,
            StageKindConfig::Bundle => StageKind::Bundle {
                bundle: cfg.bundle.clone().unwrap_or_else(|| name.to_string()),
                preamble: cfg.preamble.clone(),
            },
            StageKindConfig::Clean => StageKind::Clean {
                shallow: cfg.shallow,
                keep: cfg.keep.clone(),
            },
        };

        let mut effects = Vec::new();
        if env.is_dev() {
            if cfg.live_reload {
                effects.push(SideEffect::LiveReload);
            }
            if cfg.notify && kind != StageKind::None {
                let title = cfg
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("{name} built"));
                effects.push(SideEffect::Notify { title });
            }
        }

        Self {
            kind,
            sources: cfg.src.clone(),
            destination: cfg.dest.as_ref().map(PathBuf::from),
            minify: cfg.effective_minify(env),
            emit_source_map: cfg.source_map,
            effects,
        }
    }
}

/// A named unit of work: one stage invocation plus its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: TaskName,
    /// Direct prerequisites in declaration order.
    pub prerequisites: Vec<TaskName>,
    pub action: StageConfig,
    /// Re-running produces an equivalent output set. Every stage here is.
    pub idempotent: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>, prerequisites: Vec<TaskName>, action: StageConfig) -> Self {
        Self {
            name: name.into(),
            prerequisites,
            action,
            idempotent: true,
        }
    }

    pub fn from_config(name: &str, cfg: &TaskConfig, env: Environment) -> Self {
        Self::new(
            name,
            cfg.after.clone(),
            StageConfig::from_config(name, cfg, env),
        )
    }
}

/// How a task fared in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    Succeeded,
    Failed,
    /// Never started: an earlier task failed or shutdown was requested.
    Skipped,
}

/// Outcome of one task within a run.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: TaskName,
    pub state: TaskRunState,
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_are_dropped_in_prod() {
        let mut cfg = TaskConfig::new(StageKindConfig::Copy);
        cfg.live_reload = true;

        let dev = StageConfig::from_config("fonts", &cfg, Environment::Dev);
        assert_eq!(
            dev.effects,
            vec![
                SideEffect::LiveReload,
                SideEffect::Notify {
                    title: "fonts built".into()
                }
            ]
        );
        assert!(!dev.minify);

        let prod = StageConfig::from_config("fonts", &cfg, Environment::Prod);
        assert!(prod.effects.is_empty());
        assert!(prod.minify);
    }

    #[test]
    fn bundle_name_defaults_to_task_name() {
        let cfg = TaskConfig::new(StageKindConfig::Bundle);
        let stage = StageConfig::from_config("desktop", &cfg, Environment::Prod);
        assert_eq!(
            stage.kind,
            StageKind::Bundle {
                bundle: "desktop".into(),
                preamble: None
            }
        );
    }

    #[test]
    fn grouping_tasks_do_not_notify() {
        let cfg = TaskConfig::new(StageKindConfig::None);
        let stage = StageConfig::from_config("js", &cfg, Environment::Dev);
        assert!(stage.effects.is_empty());
    }
}
