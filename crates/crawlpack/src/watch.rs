//! File system change notification with trailing-edge debouncing.
//!
//! The source root is watched recursively. Dependencies that live outside it
//! (a `node_modules` higher up, say) are added one file at a time as the
//! bundler reports them.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::WatchError;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File was modified or renamed
    Modified(PathBuf),
    /// File was created
    Created(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Source of file change notifications.
///
/// Changes themselves are delivered through the channel handed out when the
/// notifier is created; this trait only lets the pipeline extend the set of
/// watched files.
pub trait ChangeNotifier: Send {
    /// Make sure changes to `path` are reported.
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;
}

/// `notify`-backed watcher.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
    aliases: Aliases,
}

impl NotifyWatcher {
    /// Watch `root` recursively.
    ///
    /// Changes are held back until `debounce` has passed without another
    /// event, then delivered once per path. Paths are reported under the
    /// spelling of `root` even when the platform watcher resolves symlinks.
    /// Must be called from within a tokio runtime.
    pub fn new(
        root: PathBuf,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>), WatchError> {
        if !root.exists() {
            return Err(WatchError::RootNotFound(root));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(100);
        let root_clone = root.clone();
        let aliases = Aliases::default();
        aliases.add(&root);
        let event_aliases = aliases.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watcher error");
                    return;
                }
            };
            for path in &event.paths {
                let path = event_aliases.resolve(path);
                if Self::should_ignore(&path, &root_clone) {
                    continue;
                }
                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path),
                    EventKind::Modify(_) => FileChange::Modified(path),
                    EventKind::Remove(_) => FileChange::Removed(path),
                    _ => continue,
                };
                let _ = raw_tx.send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tokio::spawn(debounce_changes(raw_rx, tx, debounce));
        debug!(root = %root.display(), "watching for changes");

        Ok((
            Self {
                watcher,
                root,
                aliases,
            },
            rx,
        ))
    }

    /// Hidden files and directories below the root are ignored. Paths
    /// outside the root only arrive for files watched explicitly.
    fn should_ignore(path: &Path, root: &Path) -> bool {
        let Ok(rel_path) = path.strip_prefix(root) else {
            return false;
        };
        rel_path.components().any(|component| match component {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        })
    }
}

impl ChangeNotifier for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        if path.starts_with(&self.root) {
            return Ok(());
        }
        match self.watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                self.aliases.add(path);
                trace!(path = %path.display(), "watching dependency outside source root");
                Ok(())
            }
            Err(err) if matches!(err.kind, notify::ErrorKind::PathNotFound) => {
                debug!(path = %path.display(), "dependency vanished before it could be watched");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Canonical locations paired with the spelling the pipeline watched them
/// under. Dependency matching compares paths exactly, so events must come
/// back the way the bundler reported them.
#[derive(Clone, Default)]
struct Aliases(Arc<RwLock<Vec<(PathBuf, PathBuf)>>>);

impl Aliases {
    fn add(&self, path: &Path) {
        match path.canonicalize() {
            Ok(canonical) if canonical != path => {
                trace!(path = %path.display(), canonical = %canonical.display(), "watching through alias");
                self.0.write().push((canonical, path.to_path_buf()));
            }
            Ok(_) => {}
            Err(err) => debug!(path = %path.display(), error = %err, "could not canonicalize watched path"),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.0
            .read()
            .iter()
            .find_map(|(canonical, alias)| rebase(path, canonical, alias))
            .unwrap_or_else(|| path.to_path_buf())
    }
}

/// Move `path` from under `from` to under `to`.
fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    let rest = path.strip_prefix(from).ok()?;
    if rest.as_os_str().is_empty() {
        Some(to.to_path_buf())
    } else {
        Some(to.join(rest))
    }
}

/// Collect raw changes and release them once `quiet` has passed without new
/// ones, keeping only the latest change per path.
async fn debounce_changes(
    mut raw: mpsc::UnboundedReceiver<FileChange>,
    out: mpsc::Sender<FileChange>,
    quiet: Duration,
) {
    let mut pending: FxHashMap<PathBuf, FileChange> = FxHashMap::default();
    let mut order: Vec<PathBuf> = Vec::new();

    loop {
        let next = if pending.is_empty() {
            raw.recv().await
        } else {
            match tokio::time::timeout(quiet, raw.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    for path in order.drain(..) {
                        if let Some(change) = pending.remove(&path) {
                            if out.send(change).await.is_err() {
                                return;
                            }
                        }
                    }
                    continue;
                }
            }
        };

        let Some(change) = next else {
            return;
        };
        let path = change.path().to_path_buf();
        if pending.insert(path.clone(), change).is_none() {
            order.push(path);
        }
    }
}
