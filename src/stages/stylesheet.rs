// src/stages/stylesheet.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use grass::{Options, OutputStyle};
use tracing::debug;

use crate::dag::task_info::StageConfig;
use crate::stages::{destination, expand_sources};

/// Compile each matched SCSS entry to `<dest>/<stem>.css`.
///
/// Files starting with `_` are partials and only reachable through `@use` /
/// `@import`, so they are not compiled on their own.
pub fn run(root: &Path, stage: &StageConfig) -> Result<Vec<PathBuf>> {
    let dest = destination(root, stage)?;
    let style = if stage.minify {
        OutputStyle::Compressed
    } else {
        OutputStyle::Expanded
    };
    let opts = Options::default().style(style);

    let mut outputs = Vec::new();
    for pattern in &stage.sources {
        for file in expand_sources(root, pattern)? {
            let is_partial = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            if is_partial {
                continue;
            }

            let css = grass::from_path(&file.path, &opts)
                .map_err(|e| anyhow!("{}: {e}", file.path.display()))?;

            let stem = file
                .path
                .file_stem()
                .ok_or_else(|| anyhow!("{} has no file name", file.path.display()))?;
            let target = dest.join(format!("{}.css", stem.to_string_lossy()));

            fs::create_dir_all(&dest).with_context(|| format!("creating {}", dest.display()))?;
            fs::write(&target, css).with_context(|| format!("writing {}", target.display()))?;
            debug!(source = %file.path.display(), target = %target.display(), "compiled stylesheet");
            outputs.push(target);
        }
    }
    Ok(outputs)
}
