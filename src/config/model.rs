// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::manifest::BundleManifest;
use crate::engine::TaskName;
use crate::types::Environment;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// environment = "dev"
/// out_dir = "_package"
/// default_tasks = ["css", "desktop-js"]
///
/// [default]
/// exclude = ["**/*.swp"]
///
/// [backend]
/// cmd = ["docker-compose", "up"]
/// task = "build-server"
/// restart_exit_codes = [8]
///
/// [task.css]
/// stage = "stylesheet"
/// src = ["source/less/index.scss"]
/// dest = "_package/frontend/css"
/// watch = ["source/less/**"]
///
/// [[watch]]
/// glob = "sources.json"
/// tasks = ["desktop-js"]
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one task.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Defaults shared by every watch rule, from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// Optional supervised backend process from `[backend]`.
    #[serde(default)]
    pub backend: Option<BackendSection>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<TaskName, TaskConfig>,

    /// Explicit watch rules from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchRuleConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"dev"` (default) or `"prod"`.
    #[serde(default)]
    pub environment: Environment,

    /// Output root. Paths under it never trigger watch rules.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Tasks built when the command line names none.
    #[serde(default)]
    pub default_tasks: Vec<TaskName>,

    /// Coalescing window for file events, e.g. `"100ms"`.
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window: String,

    /// Path of the bundle manifest (JSON object of bundle name -> files).
    #[serde(default)]
    pub manifest: Option<String>,

    /// Port for the live-reload WebSocket server.
    #[serde(default = "default_live_reload_port")]
    pub live_reload_port: u16,
}

fn default_out_dir() -> String {
    "_package".to_string()
}

fn default_coalesce_window() -> String {
    "100ms".to_string()
}

fn default_live_reload_port() -> u16 {
    35729
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            out_dir: default_out_dir(),
            default_tasks: Vec::new(),
            coalesce_window: default_coalesce_window(),
            manifest: None,
            live_reload_port: default_live_reload_port(),
        }
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Paths matching any of these globs never trigger a rule.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[backend]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    /// Command line of the backend process (argv, not a shell string).
    pub cmd: Vec<String>,

    /// Task whose successful completion (re)starts the backend.
    #[serde(default)]
    pub task: Option<TaskName>,

    /// Exit codes meaning "my inputs changed; rebuild and relaunch me".
    ///
    /// This is a convention between the tool and the backend, so it has no
    /// built-in default.
    #[serde(default)]
    pub restart_exit_codes: Vec<i32>,

    /// Grace period between SIGTERM and a forced kill, e.g. `"5s"`.
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout: String,

    /// Working directory, relative to the project root.
    #[serde(default)]
    pub cwd: Option<String>,
}

fn default_kill_timeout() -> String {
    "5s".to_string()
}

/// Which pipeline stage a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageKindConfig {
    /// Copy matched files under `dest`.
    Copy,
    /// Compile stylesheet entries to CSS.
    Stylesheet,
    /// Concatenate a manifest bundle into one script.
    Bundle,
    /// Remove `dest` (or its top-level files).
    Clean,
    /// No action; only groups prerequisites.
    #[default]
    None,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub stage: StageKindConfig,

    /// Source globs, relative to the project root.
    #[serde(default)]
    pub src: Vec<String>,

    /// Destination directory, relative to the project root.
    #[serde(default)]
    pub dest: Option<String>,

    /// Prerequisites: these tasks run before this one.
    #[serde(default)]
    pub after: Vec<TaskName>,

    /// Shorthand watch rules that trigger only this task.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Manifest bundle name for `stage = "bundle"`; defaults to the task name.
    #[serde(default)]
    pub bundle: Option<String>,

    /// Overrides the environment default (on in prod, off in dev).
    #[serde(default)]
    pub minify: Option<bool>,

    #[serde(default)]
    pub source_map: bool,

    /// Text placed at the top of minified bundles.
    #[serde(default)]
    pub preamble: Option<String>,

    /// Emit a completion notification (dev only).
    #[serde(default = "default_true")]
    pub notify: bool,

    /// Notification title; defaults to "<task> built".
    #[serde(default)]
    pub title: Option<String>,

    /// Ask connected browsers to reload after this task (dev only).
    #[serde(default)]
    pub live_reload: bool,

    /// `stage = "clean"`: only delete top-level files of `dest`.
    #[serde(default)]
    pub shallow: bool,

    /// `stage = "clean"` with `shallow`: file names to leave in place.
    #[serde(default)]
    pub keep: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl TaskConfig {
    /// An action-less task of the given stage; every optional field unset.
    pub fn new(stage: StageKindConfig) -> Self {
        Self {
            stage,
            src: Vec::new(),
            dest: None,
            after: Vec::new(),
            watch: Vec::new(),
            bundle: None,
            minify: None,
            source_map: false,
            preamble: None,
            notify: true,
            title: None,
            live_reload: false,
            shallow: false,
            keep: Vec::new(),
        }
    }

    /// Effective `minify` given the build environment.
    pub fn effective_minify(&self, env: Environment) -> bool {
        self.minify.unwrap_or(env == Environment::Prod)
    }
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchRuleConfig {
    pub glob: String,
    pub tasks: Vec<TaskName>,
}

/// Validated `[backend]` section with parsed values.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub command: Vec<String>,
    pub task: Option<TaskName>,
    pub restart_exit_codes: BTreeSet<i32>,
    pub kill_timeout: Duration,
    pub cwd: Option<PathBuf>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or the loader), so code
/// holding a `ConfigFile` can rely on:
/// - every referenced task existing,
/// - the prerequisite relation being acyclic,
/// - durations and globs being well-formed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub backend: Option<BackendConfig>,
    pub task: BTreeMap<TaskName, TaskConfig>,
    pub watch: Vec<WatchRuleConfig>,
    pub coalesce_window: Duration,
    /// Project root all relative paths resolve against.
    pub root: PathBuf,
    /// Bundle manifest as read at startup (empty when none is configured).
    pub manifest: BundleManifest,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        backend: Option<BackendConfig>,
        coalesce_window: Duration,
    ) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            backend,
            task: raw.task,
            watch: raw.watch,
            coalesce_window,
            root: PathBuf::from("."),
            manifest: BundleManifest::default(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn tasks(&self) -> &BTreeMap<TaskName, TaskConfig> {
        &self.task
    }

    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    /// Absolute (or root-relative) output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.config.out_dir)
    }

    /// Path of the bundle manifest, if one is configured.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.config.manifest.as_ref().map(|m| self.root.join(m))
    }

    /// Whether any task asks for live reload (and the environment allows it).
    pub fn wants_live_reload(&self) -> bool {
        self.environment().is_dev() && self.task.values().any(|t| t.live_reload)
    }

    /// Re-root the configuration (used by the loader).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_manifest(mut self, manifest: BundleManifest) -> Self {
        self.manifest = manifest;
        self
    }
}
