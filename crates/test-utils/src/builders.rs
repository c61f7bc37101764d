#![allow(dead_code)]

use std::collections::BTreeMap;

use assetdag::config::{
    BackendSection, ConfigFile, ConfigSection, DefaultSection, RawConfigFile, StageKindConfig,
    TaskConfig, WatchRuleConfig,
};
use assetdag::errors::Result;
use assetdag::types::Environment;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                backend: None,
                task: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    /// Add a `[[watch]]` rule.
    pub fn with_watch_rule(mut self, glob: &str, tasks: &[&str]) -> Self {
        self.config.watch.push(WatchRuleConfig {
            glob: glob.to_string(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.config.config.environment = env;
        self
    }

    pub fn with_coalesce_window(mut self, window: &str) -> Self {
        self.config.config.coalesce_window = window.to_string();
        self
    }

    pub fn with_default_tasks(mut self, tasks: &[&str]) -> Self {
        self.config.config.default_tasks = tasks.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Set `[backend]` with the given argv, build task and sentinel codes.
    pub fn with_backend(mut self, cmd: &[&str], task: Option<&str>, restart_codes: &[i32]) -> Self {
        self.config.backend = Some(BackendSection {
            cmd: cmd.iter().map(|c| c.to_string()).collect(),
            task: task.map(str::to_string),
            restart_exit_codes: restart_codes.to_vec(),
            kill_timeout: "2s".to_string(),
            cwd: None,
        });
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(stage: StageKindConfig) -> Self {
        Self {
            task: TaskConfig::new(stage),
        }
    }

    /// Action-less grouping task.
    pub fn group() -> Self {
        Self::new(StageKindConfig::None)
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dir: &str) -> Self {
        self.task.dest = Some(dir.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.task.watch.push(pattern.to_string());
        self
    }

    pub fn bundle(mut self, name: &str) -> Self {
        self.task.bundle = Some(name.to_string());
        self
    }

    pub fn minify(mut self, val: bool) -> Self {
        self.task.minify = Some(val);
        self
    }

    pub fn source_map(mut self, val: bool) -> Self {
        self.task.source_map = val;
        self
    }

    pub fn live_reload(mut self, val: bool) -> Self {
        self.task.live_reload = val;
        self
    }

    pub fn notify(mut self, val: bool) -> Self {
        self.task.notify = val;
        self
    }

    pub fn shallow(mut self, val: bool) -> Self {
        self.task.shallow = val;
        self
    }

    pub fn keep(mut self, name: &str) -> Self {
        self.task.keep.push(name.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
