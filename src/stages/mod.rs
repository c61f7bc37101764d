// src/stages/mod.rs

//! Pipeline stages: the transforms tasks run.
//!
//! Each stage is a synchronous function from a [`StageConfig`] to the list of
//! files it wrote. [`PipelineRunner`] dispatches on the stage kind and then
//! runs the task's side effects.

pub mod bundle;
pub mod clean;
pub mod copy;
pub mod effects;
pub mod livereload;
pub mod sourcemap;
pub mod stylesheet;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use walkdir::WalkDir;

use crate::config::manifest::BundleManifest;
use crate::config::model::ConfigFile;
use crate::dag::task_info::{StageConfig, StageKind, TaskSpec};
use crate::exec::{StageOutput, StageRunner};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{compile_glob, split_glob_base};

pub use livereload::LiveReloadHandle;

/// The production [`StageRunner`].
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    root: PathBuf,
    manifest_path: Option<PathBuf>,
    live_reload: Option<LiveReloadHandle>,
}

impl PipelineRunner {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            root: cfg.root.clone(),
            manifest_path: cfg.manifest_path(),
            live_reload: None,
        }
    }

    pub fn with_live_reload(mut self, handle: LiveReloadHandle) -> Self {
        self.live_reload = Some(handle);
        self
    }

    /// The manifest is re-read on every bundle run so edits take effect
    /// without restarting.
    fn load_manifest(&self) -> Result<BundleManifest> {
        let path = self
            .manifest_path
            .as_ref()
            .ok_or_else(|| anyhow!("bundle stage needs [config].manifest"))?;
        Ok(BundleManifest::load(path)?)
    }
}

impl StageRunner for PipelineRunner {
    fn run_stage(&self, task: &TaskSpec) -> Result<StageOutput> {
        let started = Instant::now();
        let stage = &task.action;

        let outputs = match &stage.kind {
            StageKind::None => Vec::new(),
            StageKind::Copy => copy::run(&self.root, stage)?,
            StageKind::Stylesheet => stylesheet::run(&self.root, stage)?,
            StageKind::Bundle { bundle, preamble } => {
                let manifest = self.load_manifest()?;
                bundle::run(&self.root, stage, &manifest, bundle, preamble.as_deref())?
            }
            StageKind::Clean { shallow, keep } => clean::run(&self.root, stage, *shallow, keep)?,
        };

        effects::apply(
            &task.name,
            &stage.effects,
            &outputs,
            started.elapsed(),
            self.live_reload.as_ref(),
            &self.root,
        );

        Ok(StageOutput::new(outputs))
    }
}

/// Absolute destination directory of a stage.
pub(crate) fn destination(root: &Path, stage: &StageConfig) -> Result<PathBuf> {
    let dest = stage
        .destination
        .as_ref()
        .ok_or_else(|| anyhow!("stage has no destination"))?;
    Ok(root.join(dest))
}

/// A file matched by a source glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    /// Path below the glob's literal base.
    pub relative: PathBuf,
}

/// Expand one project-relative glob into files, sorted by path.
///
/// A pattern without wildcards names a single file (kept with its file name)
/// or a directory (all files below it). Missing bases match nothing.
pub(crate) fn expand_sources(root: &Path, pattern: &str) -> Result<Vec<SourceFile>> {
    let (base, rest) = split_glob_base(pattern);
    let base_path = root.join(&base);

    let Some(rest) = rest else {
        if base_path.is_file() {
            let name = base_path
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("source '{pattern}' has no file name"))?;
            return Ok(vec![SourceFile {
                path: base_path,
                relative: name,
            }]);
        }
        if base_path.is_dir() {
            return walk_files(&base_path, &base_path);
        }
        return Ok(Vec::new());
    };

    if !base_path.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = compile_glob(&rest)?.compile_matcher();
    let files = walk_files(&base_path, &base_path)?;
    Ok(files
        .into_iter()
        .filter(|f| {
            relative_str(&base_path, &f.path)
                .map(|rel| matcher.is_match(rel.as_str()))
                .unwrap_or(false)
        })
        .collect())
}

fn walk_files(dir: &Path, base: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(base) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => bail!("{} is outside {}", entry.path().display(), base.display()),
        };
        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }
    Ok(files)
}
