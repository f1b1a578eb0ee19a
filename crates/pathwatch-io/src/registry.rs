//! Registry of live watch keys over the native watcher.
//!
//! An explicit arena: one valid registration per watched directory, removed
//! on unwatch, on observed deletion of the watched path, or at shutdown.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::WatchError;

/// Maps watched directories to live native watch registrations.
pub struct WatchKeyRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    /// Native watcher; `None` once the registry has shut down.
    watcher: Option<RecommendedWatcher>,
    watched: HashSet<PathBuf>,
}

impl WatchKeyRegistry {
    /// Create a registry whose native watcher feeds `sink`.
    pub(crate) fn new(
        sink: impl Fn(notify::Result<notify::Event>) + Send + 'static,
    ) -> Result<Self, WatchError> {
        let watcher = notify::recommended_watcher(move |result| sink(result))
            .map_err(|source| WatchError::Backend { source })?;
        Ok(Self {
            inner: Mutex::new(RegistryInner {
                watcher: Some(watcher),
                watched: HashSet::new(),
            }),
        })
    }

    /// Register `path` for create/delete/modify notifications about its
    /// immediate children.
    ///
    /// Fails when the path does not exist or is not a directory. Watching an
    /// already-watched path is a no-op.
    pub fn watch(&self, path: &Path) -> Result<(), WatchError> {
        let metadata = std::fs::metadata(path).map_err(|e| WatchError::io(path, e))?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let mut guard = self.inner.lock().expect("registry lock poisoned");
        let inner = &mut *guard;
        let Some(watcher) = inner.watcher.as_mut() else {
            return Err(WatchError::ShutDown);
        };
        if inner.watched.contains(path) {
            return Ok(());
        }
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Registration {
                path: path.to_path_buf(),
                source,
            })?;
        inner.watched.insert(path.to_path_buf());
        tracing::debug!(path = %path.display(), "watch registered");
        Ok(())
    }

    /// Watch `path` and every ancestor up to, but excluding,
    /// `ancestor_exclusive` (or up to the filesystem root when omitted).
    pub fn watch_up(&self, path: &Path, ancestor_exclusive: Option<&Path>) -> Result<(), WatchError> {
        validate_ancestor(path, ancestor_exclusive)?;
        let mut current = Some(path);
        while let Some(dir) = current {
            if ancestor_exclusive == Some(dir) {
                break;
            }
            self.watch(dir)?;
            current = dir.parent();
        }
        Ok(())
    }

    /// Remove the registration for `path`. Unwatching a non-watched path is
    /// a no-op.
    pub fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        let mut guard = self.inner.lock().expect("registry lock poisoned");
        let inner = &mut *guard;
        if inner.watcher.is_none() {
            return Err(WatchError::ShutDown);
        }
        if !inner.watched.remove(path) {
            return Ok(());
        }
        if let Some(watcher) = inner.watcher.as_mut() {
            // The native handle may already be dead (deleted directory); the
            // arena entry is gone either way.
            if let Err(error) = watcher.unwatch(path) {
                tracing::debug!(path = %path.display(), %error, "native unwatch failed");
            }
        }
        tracing::debug!(path = %path.display(), "watch removed");
        Ok(())
    }

    /// Unwatch `path` and every ancestor up to, but excluding,
    /// `ancestor_exclusive` (or up to the filesystem root when omitted).
    pub fn unwatch_up(
        &self,
        path: &Path,
        ancestor_exclusive: Option<&Path>,
    ) -> Result<(), WatchError> {
        validate_ancestor(path, ancestor_exclusive)?;
        let mut current = Some(path);
        while let Some(dir) = current {
            if ancestor_exclusive == Some(dir) {
                break;
            }
            self.unwatch(dir)?;
            current = dir.parent();
        }
        Ok(())
    }

    /// Whether a valid registration exists for exactly this path.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .watched
            .contains(path)
    }

    /// All currently registered paths.
    pub(crate) fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .watched
            .iter()
            .cloned()
            .collect()
    }

    /// Drop the registration for a path observed to be deleted.
    pub(crate) fn invalidate(&self, path: &Path) {
        let mut guard = self.inner.lock().expect("registry lock poisoned");
        let inner = &mut *guard;
        if inner.watched.remove(path) {
            if let Some(watcher) = inner.watcher.as_mut() {
                let _ = watcher.unwatch(path);
            }
            tracing::debug!(path = %path.display(), "watch invalidated by deletion");
        }
    }

    /// Drop the native watcher and clear the arena. Called from the worker
    /// during shutdown.
    pub(crate) fn shutdown(&self) {
        let mut guard = self.inner.lock().expect("registry lock poisoned");
        guard.watcher = None;
        guard.watched.clear();
        tracing::debug!("watch registry cleared");
    }
}

fn validate_ancestor(path: &Path, ancestor_exclusive: Option<&Path>) -> Result<(), WatchError> {
    if let Some(ancestor) = ancestor_exclusive {
        if !path.starts_with(ancestor) || path == ancestor {
            return Err(WatchError::NotAnAncestor {
                path: path.to_path_buf(),
                ancestor: ancestor.to_path_buf(),
            });
        }
    }
    Ok(())
}
