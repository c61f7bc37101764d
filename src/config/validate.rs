// src/config/validate.rs

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{
    BackendConfig, ConfigFile, RawConfigFile, StageKindConfig,
};
use crate::dag::graph::find_cycle;
use crate::errors::{AssetdagError, Result};
use crate::types::parse_duration;
use crate::watch::patterns::compile_glob;

static TASK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("task name regex is valid")
});

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let coalesce_window = parse_duration(&raw.config.coalesce_window).map_err(|e| {
            AssetdagError::ConfigError(format!("[config].coalesce_window: {e}"))
        })?;
        let backend = validate_backend(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, backend, coalesce_window))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_names(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_stages(cfg)?;
    validate_watch_rules(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> AssetdagError {
    AssetdagError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.task.keys() {
        if !TASK_NAME.is_match(name) {
            return Err(config_error(format!(
                "invalid task name '{name}': use letters, digits, '_', '.', ':' or '-'"
            )));
        }
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.out_dir.trim().is_empty() {
        return Err(config_error("[config].out_dir must not be empty"));
    }

    for name in &cfg.config.default_tasks {
        if !cfg.task.contains_key(name) {
            return Err(config_error(format!(
                "[config].default_tasks references unknown task '{name}'"
            )));
        }
    }

    for pat in &cfg.default.exclude {
        compile_glob(pat).map_err(|e| config_error(format!("[default].exclude: {e:#}")))?;
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(AssetdagError::CyclicDependency {
                    cycle: vec![name.clone()],
                });
            }
        }
    }
    Ok(())
}

fn validate_stages(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let needs_dest = !matches!(task.stage, StageKindConfig::None);
        let needs_src = matches!(
            task.stage,
            StageKindConfig::Copy | StageKindConfig::Stylesheet
        );

        if needs_dest && task.dest.as_deref().is_none_or(|d| d.trim().is_empty()) {
            return Err(config_error(format!(
                "task '{name}' ({:?} stage) needs a `dest`",
                task.stage
            )));
        }
        if needs_src && task.src.is_empty() {
            return Err(config_error(format!(
                "task '{name}' ({:?} stage) needs at least one `src` pattern",
                task.stage
            )));
        }
        if task.stage == StageKindConfig::Bundle && !task.src.is_empty() {
            return Err(config_error(format!(
                "task '{name}': bundle sources come from the manifest, not `src`"
            )));
        }

        for pat in task.src.iter().chain(task.watch.iter()) {
            compile_glob(pat).map_err(|e| config_error(format!("task '{name}': {e:#}")))?;
        }
    }
    Ok(())
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    for (idx, rule) in cfg.watch.iter().enumerate() {
        if rule.tasks.is_empty() {
            return Err(config_error(format!(
                "[[watch]] #{idx} ('{}') triggers no tasks",
                rule.glob
            )));
        }
        for task in &rule.tasks {
            if !cfg.task.contains_key(task) {
                return Err(config_error(format!(
                    "[[watch]] '{}' references unknown task '{task}'",
                    rule.glob
                )));
            }
        }
        compile_glob(&rule.glob).map_err(|e| config_error(format!("[[watch]]: {e:#}")))?;
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let edges = cfg
        .task
        .iter()
        .map(|(name, task)| (name.as_str(), task.after.as_slice()));

    match find_cycle(edges) {
        None => Ok(()),
        Some(cycle) => Err(AssetdagError::CyclicDependency { cycle }),
    }
}

fn validate_backend(cfg: &RawConfigFile) -> Result<Option<BackendConfig>> {
    let Some(backend) = cfg.backend.as_ref() else {
        return Ok(None);
    };

    if backend.cmd.is_empty() || backend.cmd[0].trim().is_empty() {
        return Err(config_error("[backend].cmd must name a program"));
    }

    if let Some(task) = &backend.task {
        if !cfg.task.contains_key(task) {
            return Err(config_error(format!(
                "[backend].task references unknown task '{task}'"
            )));
        }
    }

    let restart_exit_codes: BTreeSet<i32> = backend.restart_exit_codes.iter().copied().collect();
    if restart_exit_codes.contains(&0) {
        return Err(config_error(
            "[backend].restart_exit_codes must not contain 0 (a clean exit)",
        ));
    }

    let kill_timeout = parse_duration(&backend.kill_timeout)
        .map_err(|e| config_error(format!("[backend].kill_timeout: {e}")))?;

    Ok(Some(BackendConfig {
        command: backend.cmd.clone(),
        task: backend.task.clone(),
        restart_exit_codes,
        kill_timeout,
        cwd: backend.cwd.as_ref().map(Into::into),
    }))
}
