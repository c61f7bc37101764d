// src/stages/clean.rs

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::dag::task_info::StageConfig;
use crate::stages::destination;

/// Remove a stage's destination.
///
/// With `shallow`, only regular files directly inside the destination are
/// removed, except those whose file name is listed in `keep`; directories
/// are left alone. A missing destination is not an error.
pub fn run(root: &Path, stage: &StageConfig, shallow: bool, keep: &[String]) -> Result<Vec<PathBuf>> {
    guard_destination(stage)?;
    let dest = destination(root, stage)?;

    if !dest.exists() {
        debug!(dest = %dest.display(), "nothing to clean");
        return Ok(Vec::new());
    }

    if !shallow {
        fs::remove_dir_all(&dest).with_context(|| format!("removing {}", dest.display()))?;
        return Ok(vec![dest]);
    }

    let mut removed = Vec::new();
    let entries = fs::read_dir(&dest).with_context(|| format!("reading {}", dest.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if keep.iter().any(|k| name.to_str() == Some(k.as_str())) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("removing {}", path.display()));
            }
        }
    }
    removed.sort();
    Ok(removed)
}

/// Refuse destinations that would clean the project root or escape it.
fn guard_destination(stage: &StageConfig) -> Result<()> {
    let Some(dest) = stage.destination.as_ref() else {
        return Ok(());
    };

    let mut depth = 0usize;
    for component in dest.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => bail!("refusing to clean '{}': must be a path inside the project", dest.display()),
        }
    }
    if depth == 0 {
        bail!("refusing to clean the project root");
    }
    Ok(())
}
