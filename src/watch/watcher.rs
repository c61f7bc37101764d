// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::engine::RuntimeEvent;
use crate::watch::path_utils::relative_str;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and sends one
/// `RuntimeEvent::PathChanged` per changed path (relative to `root`).
///
/// Routing, exclusion and coalescing are the runtime's job; this only moves
/// events from notify's callback thread into the async world. A failure of
/// the watch backend itself is forwarded as `RuntimeEvent::WatchFailed`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver only disappears during shutdown.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;

    info!("file watcher started on {:?}", root);

    let async_root = root.clone();
    tokio::spawn(async move {
        while let Some(res) = event_rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watch backend reported an error");
                    let _ = runtime_tx
                        .send(RuntimeEvent::WatchFailed {
                            message: err.to_string(),
                        })
                        .await;
                    break;
                }
            };

            // Our own stages read sources; reads are not changes.
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            trace!(?event, "received notify event");

            for path in &event.paths {
                let Some(rel) = relative_str(&async_root, path) else {
                    debug!(?path, "event outside watch root; ignoring");
                    continue;
                };
                if rel.is_empty() {
                    continue;
                }
                if runtime_tx
                    .send(RuntimeEvent::PathChanged { path: rel })
                    .await
                    .is_err()
                {
                    debug!("runtime gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}
