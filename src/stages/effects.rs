// src/stages/effects.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::dag::task_info::SideEffect;
use crate::stages::livereload::LiveReloadHandle;
use crate::watch::path_utils::relative_str;

/// Tracing target of completion notifications, so they can be filtered
/// separately (`ASSETDAG_LOG=info,assetdag::notify=off`).
pub const NOTIFY_TARGET: &str = "assetdag::notify";

/// Run a task's side effects, in order, after its stage succeeded.
pub fn apply(
    task: &str,
    effects: &[SideEffect],
    outputs: &[PathBuf],
    elapsed: Duration,
    live_reload: Option<&LiveReloadHandle>,
    root: &Path,
) {
    for effect in effects {
        match effect {
            SideEffect::Notify { title } => {
                info!(
                    target: NOTIFY_TARGET,
                    task,
                    title = %title,
                    "Took {:.2} seconds",
                    elapsed.as_secs_f64()
                );
            }
            SideEffect::LiveReload => match live_reload {
                Some(handle) => {
                    if outputs.is_empty() {
                        handle.reload("/");
                    }
                    for path in outputs {
                        let rel = relative_str(root, path)
                            .unwrap_or_else(|| path.to_string_lossy().into_owned());
                        handle.reload(&rel);
                    }
                }
                None => debug!(task, "live reload requested but no server is running"),
            },
        }
    }
}
