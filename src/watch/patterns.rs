// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;

/// Compile one project-relative glob.
///
/// Matching is case-sensitive and `*` never crosses a `/`; use `**` for that.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat.as_ref())?);
    }
    Ok(builder.build()?)
}

/// Split a glob into its literal directory prefix and the wildcard rest.
///
/// `source/server/**` → (`source/server`, Some(`**`)), `root/index.html` →
/// (`root/index.html`, None). The prefix is what copy stages strip from
/// matched paths.
pub fn split_glob_base(pattern: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = pattern.split('/').collect();
    let split = parts
        .iter()
        .position(|c| c.contains(['*', '?', '[', '{']))
        .unwrap_or(parts.len());

    let base = parts[..split].join("/");
    if split == parts.len() {
        (base, None)
    } else {
        (base, Some(parts[split..].join("/")))
    }
}

/// A compiled `{glob, triggered tasks}` pair.
#[derive(Clone)]
pub struct WatchRule {
    glob: String,
    matcher: GlobMatcher,
    triggered_tasks: Vec<TaskName>,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("glob", &self.glob)
            .field("triggered_tasks", &self.triggered_tasks)
            .finish()
    }
}

impl WatchRule {
    pub fn new<S: Into<TaskName>>(
        glob: &str,
        tasks: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        Ok(Self {
            glob: glob.to_string(),
            matcher: compile_glob(glob)?.compile_matcher(),
            triggered_tasks: tasks.into_iter().map(Into::into).collect(),
        })
    }

    pub fn glob(&self) -> &str {
        &self.glob
    }

    pub fn triggered_tasks(&self) -> &[TaskName] {
        &self.triggered_tasks
    }

    /// `rel_path` is relative to the project root, with forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.is_match(rel_path)
    }
}

/// All watch rules of a project plus the paths none of them may see.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<WatchRule>,
    exclude: GlobSet,
    exclude_patterns: Vec<String>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl RuleSet {
    pub fn new(rules: Vec<WatchRule>, exclude: Vec<String>) -> Result<Self> {
        let set = build_globset(&exclude).context("building exclude globset")?;
        Ok(Self {
            rules,
            exclude: set,
            exclude_patterns: exclude,
        })
    }

    /// Rules from a validated config.
    ///
    /// `[[watch]]` entries come first in declaration order, followed by each
    /// task's `watch` shorthand in task-name order. The output directory is
    /// always excluded, together with `[default].exclude`.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut rules = Vec::new();

        for rule in &cfg.watch {
            rules.push(WatchRule::new(&rule.glob, rule.tasks.iter().cloned())?);
        }
        for (name, task) in cfg.tasks() {
            for glob in &task.watch {
                rules.push(
                    WatchRule::new(glob, [name.clone()])
                        .with_context(|| format!("watch pattern of task {name}"))?,
                );
            }
        }

        let out_dir = cfg.config.out_dir.trim_end_matches('/');
        let mut exclude = vec![out_dir.to_string(), format!("{out_dir}/**")];
        exclude.extend(cfg.default_section().exclude.iter().cloned());

        Self::new(rules, exclude)
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude.is_match(rel_path)
    }

    /// Union of the tasks of every rule matching `rel_path`, in rule order,
    /// without duplicates. Excluded paths match nothing.
    pub fn tasks_for(&self, rel_path: &str) -> Vec<TaskName> {
        if self.is_excluded(rel_path) {
            return Vec::new();
        }

        let mut tasks: Vec<TaskName> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.matches(rel_path)) {
            for task in rule.triggered_tasks() {
                if !tasks.contains(task) {
                    tasks.push(task.clone());
                }
            }
        }
        tasks
    }
}
