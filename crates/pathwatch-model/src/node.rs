//! Tree model nodes.
//!
//! Nodes are owned exclusively by the model and mutated only during
//! reconciliation; the canonical sibling order of snapshot children is
//! maintained on every insertion.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use pathwatch_core::compare_entries;

/// A file node: a path plus its last known modification time.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// A directory node with its reconciled children, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryItem {
    pub path: PathBuf,
    pub children: Vec<TreeNode>,
}

/// One node of the model tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    File(FileItem),
    Directory(DirectoryItem),
}

impl DirectoryItem {
    /// Create an empty directory node.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            children: Vec::new(),
        }
    }

    /// Index of the child with the given entry name.
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|c| c.name() == name)
    }

    /// Insert a child at its canonical sorted position; returns that
    /// position.
    pub fn insert_sorted(&mut self, node: TreeNode) -> usize {
        let index = self
            .children
            .iter()
            .position(|existing| {
                compare_entries(
                    node.is_directory(),
                    &node.name(),
                    existing.is_directory(),
                    &existing.name(),
                )
                .is_lt()
            })
            .unwrap_or(self.children.len());
        self.children.insert(index, node);
        index
    }
}

impl TreeNode {
    /// This node's absolute path.
    pub fn path(&self) -> &Path {
        match self {
            TreeNode::File(file) => &file.path,
            TreeNode::Directory(dir) => &dir.path,
        }
    }

    /// The final path component, lossily converted.
    pub fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().to_string_lossy().into_owned())
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, TreeNode::Directory(_))
    }

    /// Total number of nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        match self {
            TreeNode::File(_) => 1,
            TreeNode::Directory(dir) => {
                1 + dir.children.iter().map(TreeNode::node_count).sum::<usize>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> TreeNode {
        TreeNode::File(FileItem {
            path: path.into(),
            modified: SystemTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn insert_sorted_keeps_canonical_order() {
        let mut dir = DirectoryItem::new("/root");
        dir.insert_sorted(file("/root/b.txt"));
        dir.insert_sorted(TreeNode::Directory(DirectoryItem::new("/root/sub")));
        dir.insert_sorted(file("/root/A.txt"));

        let names: Vec<_> = dir.children.iter().map(TreeNode::name).collect();
        assert_eq!(names, vec!["sub", "A.txt", "b.txt"]);
    }

    #[test]
    fn child_index_finds_by_name() {
        let mut dir = DirectoryItem::new("/root");
        dir.insert_sorted(file("/root/a.txt"));
        assert_eq!(dir.child_index("a.txt"), Some(0));
        assert_eq!(dir.child_index("missing"), None);
    }
}
