//! Snapshot tree elements and the canonical sibling ordering.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A point-in-time view of one file or directory.
///
/// Directory elements carry their children recursively; children are always
/// held in the canonical order (subdirectories before files, case-insensitive
/// name compare within each group). Elements are immutable once built: the
/// snapshot builder produces them and the synchronizer consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathElement {
    /// Absolute path of this element.
    pub path: PathBuf,

    /// Whether this element is a directory.
    pub is_directory: bool,

    /// Last modification time (files only).
    pub last_modified: Option<SystemTime>,

    /// Child elements (directories only), in canonical order.
    pub children: Vec<PathElement>,
}

impl PathElement {
    /// Create a file element.
    pub fn file(path: impl Into<PathBuf>, last_modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            last_modified: Some(last_modified),
            children: Vec::new(),
        }
    }

    /// Create a directory element. Children are sorted into canonical order.
    pub fn directory(path: impl Into<PathBuf>, mut children: Vec<PathElement>) -> Self {
        sort_siblings(&mut children);
        Self {
            path: path.into(),
            is_directory: true,
            last_modified: None,
            children,
        }
    }

    /// The final path component, lossily converted.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Total number of elements in this subtree, including self.
    pub fn element_count(&self) -> usize {
        1 + self.children.iter().map(PathElement::element_count).sum::<usize>()
    }
}

/// Canonical ordering for directory entries.
///
/// Directories sort before files; within each group names compare
/// case-insensitively, with an exact comparison as the final tie-break so the
/// order is total and deterministic.
pub fn compare_entries(a_is_dir: bool, a_name: &str, b_is_dir: bool, b_name: &str) -> Ordering {
    b_is_dir
        .cmp(&a_is_dir)
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
        .then_with(|| a_name.cmp(b_name))
}

/// Sort a sibling group into canonical order.
pub fn sort_siblings(children: &mut [PathElement]) {
    children.sort_by(|a, b| compare_entries(a.is_directory, &a.name(), b.is_directory, &b.name()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_sort_before_files() {
        assert_eq!(
            compare_entries(true, "zzz", false, "aaa"),
            Ordering::Less
        );
        assert_eq!(
            compare_entries(false, "aaa", true, "zzz"),
            Ordering::Greater
        );
    }

    #[test]
    fn names_compare_case_insensitively() {
        // "dir_a_z" < "dir_b" once case is folded, despite 'D' < 'd' in ASCII.
        assert_eq!(
            compare_entries(true, "dir_a_z", true, "Dir_B"),
            Ordering::Less
        );
        assert_eq!(
            compare_entries(false, "README", false, "makefile"),
            Ordering::Greater
        );
    }

    #[test]
    fn directory_ctor_sorts_children() {
        let now = SystemTime::now();
        let dir = PathElement::directory(
            "/root",
            vec![
                PathElement::file("/root/b.txt", now),
                PathElement::directory("/root/sub", vec![]),
                PathElement::file("/root/A.txt", now),
            ],
        );
        let names: Vec<_> = dir.children.iter().map(PathElement::name).collect();
        assert_eq!(names, vec!["sub", "A.txt", "b.txt"]);
    }

    #[test]
    fn element_count_includes_subtree() {
        let now = SystemTime::now();
        let dir = PathElement::directory(
            "/root",
            vec![PathElement::directory(
                "/root/a",
                vec![PathElement::file("/root/a/f", now)],
            )],
        );
        assert_eq!(dir.element_count(), 3);
    }
}
