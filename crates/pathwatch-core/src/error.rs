//! Error types for filesystem operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::charset::Charset;

/// Errors produced by queued filesystem operations and the snapshot builder.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path not found.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Target already exists.
    #[error("Already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// Refusing to delete a non-empty directory.
    #[error("Directory not empty: {}", path.display())]
    DirectoryNotEmpty { path: PathBuf },

    /// File content is not valid in the requested charset.
    #[error("Content of {} is not valid {charset}", path.display())]
    Encoding { path: PathBuf, charset: Charset },

    /// Generic I/O error.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scheduler has been shut down; no further work is accepted.
    #[error("Scheduler shut down")]
    SchedulerShutDown,
}

impl FsError {
    /// Create an I/O error with path context, classifying common kinds.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            std::io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error means the path did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_classifies_common_kinds() {
        let err = FsError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, FsError::NotFound { .. }));
        assert!(err.is_not_found());

        let err = FsError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(matches!(err, FsError::AlreadyExists { .. }));

        let err = FsError::io(
            "/test/path",
            std::io::Error::other("weird"),
        );
        assert!(matches!(err, FsError::Io { .. }));
    }
}
