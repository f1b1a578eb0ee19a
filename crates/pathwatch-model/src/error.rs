//! Model-consistency errors, reported and never thrown.

use std::path::PathBuf;

use thiserror::Error;

/// An inconsistency detected while reconciling the model.
///
/// These are delivered through [`Reporter::report_error`](crate::Reporter),
/// not returned: one inconsistent path never halts reconciliation of its
/// siblings or drops later notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The parent chain of the given path is missing from the model.
    #[error("Parent directory missing in model for {}", path.display())]
    ParentMissing { path: PathBuf },

    /// A top-level directory node would have been replaced by a file.
    #[error("Refusing to replace top-level directory {} with a file", path.display())]
    TopLevelReplacement { path: PathBuf },

    /// The given path is not inside the model's base directory.
    #[error("{} is outside the model base {}", path.display(), base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },
}
