//! Error types for watch registration and the watch backend.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the watch API and the native notification backend.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The path to watch does not exist.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The path to watch is not a directory.
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// `watch_up`/`unwatch_up` was given an ancestor that is not one.
    #[error("{} is not an ancestor of {}", ancestor.display(), path.display())]
    NotAnAncestor { path: PathBuf, ancestor: PathBuf },

    /// The native watcher refused the registration.
    #[error("Failed to watch {}: {source}", path.display())]
    Registration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The native backend reported an error on its event stream.
    #[error("Watch backend error: {source}")]
    Backend {
        #[source]
        source: notify::Error,
    },

    /// I/O error while validating a path to watch.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {source}")]
    WorkerSpawn {
        #[source]
        source: std::io::Error,
    },

    /// The watcher has been shut down.
    #[error("Watcher shut down")]
    ShutDown,
}

impl WatchError {
    /// Create an I/O error with path context, classifying common kinds.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}
