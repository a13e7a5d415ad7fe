//! File watcher for a configuration tree.
//!
//! Watches the configuration root recursively and classifies YAML changes as
//! root-document or module edits. The backup directory is ignored so that
//! taking a snapshot does not trigger a refresh of its own.
//!
//! Emits events through a tokio watch channel. Uses debouncing to coalesce
//! rapid file changes (editors often write a file several times per save).

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Event types emitted when files in the tree change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChangeEvent {
    /// A top-level YAML file changed (a root-document candidate).
    RootDocument(PathBuf),
    /// A YAML file inside a group directory changed.
    Module(PathBuf),
    /// Multiple files changed in quick succession.
    Batch(Vec<PathBuf>),
    /// Watcher encountered an error.
    Error(String),
}

impl TreeChangeEvent {
    /// Returns true if this event should trigger a re-resolve.
    pub fn requires_refresh(&self) -> bool {
        !matches!(self, TreeChangeEvent::Error(_))
    }

    /// Returns true if the set of candidate root documents may have changed.
    pub fn touches_root_documents(&self, paths: &WatchPaths) -> bool {
        match self {
            TreeChangeEvent::RootDocument(_) => true,
            TreeChangeEvent::Batch(batch) => batch
                .iter()
                .any(|p| matches!(classify_path(p, paths), Some(TreeChangeEvent::RootDocument(_)))),
            _ => false,
        }
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            TreeChangeEvent::RootDocument(p) | TreeChangeEvent::Module(p) => vec![p.as_path()],
            TreeChangeEvent::Batch(paths) => paths.iter().map(|p| p.as_path()).collect(),
            TreeChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Paths relevant to the watcher.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    /// Configuration root (watched recursively).
    pub config_root: PathBuf,
    /// Backup directory under the root (ignored).
    pub backup_dir: PathBuf,
}

/// Handle to control the tree watcher.
pub struct TreeWatcherHandle {
    /// Receiver for change events.
    pub events: watch::Receiver<Option<TreeChangeEvent>>,
    /// Handle to the watcher task (dropping this will stop the watcher).
    _task_handle: tokio::task::JoinHandle<()>,
}

impl TreeWatcherHandle {
    /// Wait for the next change event.
    pub async fn wait_for_change(&mut self) -> Option<TreeChangeEvent> {
        // Skip the initial None value
        loop {
            if self.events.changed().await.is_err() {
                return None; // Sender dropped
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<TreeChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Starts watching a configuration tree.
///
/// Must be called from within a tokio runtime.
pub fn start_tree_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<TreeWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    info!("Watching configuration root: {}", paths.config_root.display());
    debouncer
        .watcher()
        .watch(&paths.config_root, notify::RecursiveMode::Recursive)?;

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &paths);
    });

    Ok(TreeWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<TreeChangeEvent>>,
    paths: &WatchPaths,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                for event in classify_events(events, paths) {
                    debug!("Tree change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Tree watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(TreeChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Tree watcher channel closed, stopping");
                return;
            }
        }
    }
}

fn classify_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    paths: &WatchPaths,
) -> Vec<TreeChangeEvent> {
    let changed: Vec<PathBuf> = events
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .filter(|e| classify_path(&e.path, paths).is_some())
        .map(|e| e.path)
        .collect();

    if changed.len() > 1 {
        vec![TreeChangeEvent::Batch(changed)]
    } else {
        changed
            .first()
            .and_then(|p| classify_path(p, paths))
            .into_iter()
            .collect()
    }
}

/// Classify a single path, or `None` if it is irrelevant to composition.
fn classify_path(path: &Path, paths: &WatchPaths) -> Option<TreeChangeEvent> {
    if path.starts_with(&paths.backup_dir) {
        return None;
    }

    let extension = path.extension().and_then(|e| e.to_str());
    if !matches!(extension, Some("yaml") | Some("yml")) {
        return None;
    }

    let relative = path.strip_prefix(&paths.config_root).ok()?;
    if relative.components().count() == 1 {
        Some(TreeChangeEvent::RootDocument(path.to_path_buf()))
    } else {
        Some(TreeChangeEvent::Module(path.to_path_buf()))
    }
}
