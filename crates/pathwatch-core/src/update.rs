//! Typed model updates and the initiator tag.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Opaque tag identifying who caused a model mutation.
///
/// Consumers compare initiators for equality to tell their own operations
/// apart from externally observed changes; no other semantics are imposed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Initiator(CompactString);

impl Initiator {
    /// Create an initiator from an arbitrary tag.
    pub fn new(tag: impl Into<CompactString>) -> Self {
        Self(tag.into())
    }

    /// The conventional tag for externally observed filesystem changes.
    pub fn external() -> Self {
        Self(CompactString::const_new("external"))
    }

    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Initiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of change an [`Update`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// A node was added to the model.
    Creation,
    /// A node was removed from the model.
    Deletion,
    /// A file node's modification time advanced.
    Modification,
}

/// A single reported model mutation.
///
/// `initiator == None` marks a corrective mutation the synchronizer performed
/// to repair an inconsistency, as opposed to an observed or requested change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// The model's base directory.
    pub base_dir: PathBuf,

    /// Path of the affected node, relative to `base_dir`.
    pub relative_path: PathBuf,

    /// Who caused the mutation, if anyone did.
    pub initiator: Option<Initiator>,

    /// What happened.
    pub kind: UpdateKind,
}

impl Update {
    /// Create a new update.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        relative_path: impl Into<PathBuf>,
        initiator: Option<Initiator>,
        kind: UpdateKind,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            relative_path: relative_path.into(),
            initiator,
            kind,
        }
    }

    /// Absolute path of the affected node.
    pub fn path(&self) -> PathBuf {
        self.base_dir.join(&self.relative_path)
    }

    /// Whether this update was caused by the given initiator.
    pub fn caused_by(&self, initiator: &Initiator) -> bool {
        self.initiator.as_ref() == Some(initiator)
    }
}

impl std::fmt::Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            UpdateKind::Creation => "created",
            UpdateKind::Deletion => "deleted",
            UpdateKind::Modification => "modified",
        };
        match &self.initiator {
            Some(initiator) => write!(f, "{kind} {} ({initiator})", self.path().display()),
            None => write!(f, "{kind} {} (corrective)", self.path().display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_joins_base_and_relative() {
        let update = Update::new("/base", "a/b.txt", Some(Initiator::external()), UpdateKind::Creation);
        assert_eq!(update.path(), PathBuf::from("/base/a/b.txt"));
    }

    #[test]
    fn initiator_equality_only() {
        let a = Initiator::new("op-1");
        let b = Initiator::new("op-1");
        let c = Initiator::external();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let update = Update::new("/base", "f", Some(a.clone()), UpdateKind::Deletion);
        assert!(update.caused_by(&b));
        assert!(!update.caused_by(&c));
    }

    #[test]
    fn corrective_updates_have_no_initiator() {
        let update = Update::new("/base", "f", None, UpdateKind::Deletion);
        assert!(update.initiator.is_none());
        assert!(update.to_string().contains("corrective"));
    }
}
