// src/devloop/watcher.rs

use std::path::PathBuf;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{BuildpipeError, Result};
use crate::pipeline::source::build_globset;

/// Handle for the filesystem watcher.
///
/// Exists mainly so the underlying `RecommendedWatcher` is kept alive for as
/// long as needed. Dropping this handle stops file watching.
pub struct WatchHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish()
    }
}

/// Watch `root` recursively and forward paths matching `patterns` (relative
/// to `root`) into `changes_tx`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    patterns: &[String],
    changes_tx: mpsc::Sender<PathBuf>,
) -> Result<WatchHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let set = build_globset(patterns)?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                // Can't log via tracing from the notify thread reliably.
                eprintln!("buildpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(|e| BuildpipeError::Other(e.into()))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| BuildpipeError::Other(e.into()))?;

    info!(root = ?root, "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                continue;
            }
            for path in event.paths {
                let rel = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                if set.is_match(&rel_str) {
                    debug!(path = %rel_str, "watched file changed");
                    let _ = changes_tx.send(rel).await;
                }
            }
        }
        debug!("watch event loop finished");
    });

    Ok(WatchHandle { _inner: watcher })
}
