// src/stages/copy.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::dag::task_info::StageConfig;
use crate::stages::{destination, expand_sources};

/// Copy every file matched by `stage.sources` below the destination,
/// preserving each file's path relative to its glob's literal base.
pub fn run(root: &Path, stage: &StageConfig) -> Result<Vec<PathBuf>> {
    let dest = destination(root, stage)?;
    let mut outputs = Vec::new();

    for pattern in &stage.sources {
        let files = expand_sources(root, pattern)?;
        if files.is_empty() {
            debug!(pattern = %pattern, "copy pattern matched no files");
        }

        for file in files {
            let target = dest.join(&file.relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::copy(&file.path, &target).with_context(|| {
                format!("copying {} to {}", file.path.display(), target.display())
            })?;
            outputs.push(target);
        }
    }

    Ok(outputs)
}
