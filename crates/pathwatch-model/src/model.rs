//! Snapshot reconciliation against the live model tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use pathwatch_core::{Initiator, PathElement};

use crate::error::ModelError;
use crate::node::{DirectoryItem, FileItem, TreeNode};
use crate::reporter::Reporter;

/// A live tree model of one base directory, kept consistent with snapshots.
///
/// The model owns a virtual root node for the base directory and is
/// single-writer: all mutation happens inside [`sync`](Self::sync) and
/// [`drop_subtree`](Self::drop_subtree), which must not be invoked
/// concurrently for the same instance. Every mutation is reported through
/// the [`Reporter`] before the call returns.
pub struct DirectoryModel {
    base_dir: PathBuf,
    root: DirectoryItem,
    reporter: Arc<dyn Reporter>,
}

struct SyncCtx<'a> {
    base_dir: &'a Path,
    reporter: &'a dyn Reporter,
}

impl<'a> SyncCtx<'a> {
    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.base_dir).unwrap_or(path)
    }

    fn creation(&self, path: &Path, initiator: Option<&Initiator>) {
        self.reporter
            .report_creation(self.base_dir, self.relative(path), initiator);
    }

    fn deletion(&self, path: &Path, initiator: Option<&Initiator>) {
        self.reporter
            .report_deletion(self.base_dir, self.relative(path), initiator);
    }

    fn modification(&self, path: &Path, initiator: Option<&Initiator>) {
        self.reporter
            .report_modification(self.base_dir, self.relative(path), initiator);
    }
}

impl DirectoryModel {
    /// Create an empty model rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        let base_dir = base_dir.into();
        let root = DirectoryItem::new(&base_dir);
        Self {
            base_dir,
            root,
            reporter,
        }
    }

    /// The model's base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether a node exists in the model for exactly this path.
    pub fn contains(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    /// Number of tracked nodes, not counting the virtual root.
    pub fn node_count(&self) -> usize {
        self.root.children.iter().map(TreeNode::node_count).sum()
    }

    /// Reconcile the subtree at the snapshot's path with the snapshot.
    ///
    /// Creations, deletions, and modifications are reported tagged with
    /// `initiator`; corrective mutations (repairing a file/directory kind
    /// mismatch) are reported with no initiator. Reconciling an unchanged
    /// snapshot twice with the same initiator reports nothing on the second
    /// pass. Deletions are always reported deepest-first.
    pub fn sync(&mut self, snapshot: &PathElement, initiator: Option<&Initiator>) {
        let ctx = SyncCtx {
            base_dir: &self.base_dir,
            reporter: self.reporter.as_ref(),
        };
        let Ok(relative) = snapshot.path.strip_prefix(&self.base_dir) else {
            ctx.reporter.report_error(ModelError::OutsideBase {
                path: snapshot.path.clone(),
                base: self.base_dir.clone(),
            });
            return;
        };

        let components = component_names(relative);
        if components.is_empty() {
            // The base directory itself; its node is the virtual root and is
            // never replaced.
            if !snapshot.is_directory {
                ctx.reporter.report_error(ModelError::TopLevelReplacement {
                    path: snapshot.path.clone(),
                });
                return;
            }
            sync_content(&ctx, &mut self.root, snapshot, initiator);
            return;
        }

        let Some(parent) = resolve_parent(&mut self.root, &components) else {
            ctx.reporter.report_error(ModelError::ParentMissing {
                path: snapshot.path.clone(),
            });
            return;
        };
        let top_level = components.len() == 1;
        sync_node(&ctx, parent, snapshot, initiator, top_level);
    }

    /// Remove the whole subtree at `path` from the model, reporting
    /// deepest-first deletions tagged with `initiator`.
    ///
    /// Used when a watched directory disappears out from under its watch
    /// key. Dropping a path the model does not track is a no-op.
    pub fn drop_subtree(&mut self, path: &Path, initiator: Option<&Initiator>) {
        let ctx = SyncCtx {
            base_dir: &self.base_dir,
            reporter: self.reporter.as_ref(),
        };
        let Ok(relative) = path.strip_prefix(&self.base_dir) else {
            ctx.reporter.report_error(ModelError::OutsideBase {
                path: path.to_path_buf(),
                base: self.base_dir.clone(),
            });
            return;
        };

        let components = component_names(relative);
        if components.is_empty() {
            // Empty the root but keep the virtual node itself.
            while let Some(child) = self.root.children.pop() {
                report_subtree_deleted(&ctx, &child, initiator);
            }
            return;
        }

        let Some(parent) = resolve_parent(&mut self.root, &components) else {
            tracing::debug!(path = %path.display(), "drop of untracked subtree ignored");
            return;
        };
        let name = components.last().map(String::as_str).unwrap_or_default();
        match parent.child_index(name) {
            Some(index) => {
                let removed = parent.children.remove(index);
                report_subtree_deleted(&ctx, &removed, initiator);
            }
            None => {
                tracing::debug!(path = %path.display(), "drop of untracked subtree ignored");
            }
        }
    }

    fn find(&self, path: &Path) -> Option<&TreeNode> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        let components = component_names(relative);
        let (last, chain) = components.split_last()?;
        let mut current = &self.root;
        for name in chain {
            match &current.children[current.child_index(name)?] {
                TreeNode::Directory(dir) => current = dir,
                TreeNode::File(_) => return None,
            }
        }
        current.child_index(last).map(|i| &current.children[i])
    }
}

fn component_names(relative: &Path) -> Vec<String> {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// Walk the parent chain of the last component; `None` when any link is
/// missing or is a file node.
fn resolve_parent<'a>(
    root: &'a mut DirectoryItem,
    components: &[String],
) -> Option<&'a mut DirectoryItem> {
    let mut current = root;
    for name in &components[..components.len() - 1] {
        let index = current.child_index(name)?;
        match &mut current.children[index] {
            TreeNode::Directory(dir) => current = dir,
            TreeNode::File(_) => return None,
        }
    }
    Some(current)
}

fn sync_node(
    ctx: &SyncCtx<'_>,
    parent: &mut DirectoryItem,
    snapshot: &PathElement,
    initiator: Option<&Initiator>,
    top_level: bool,
) {
    let name = snapshot.name();
    let Some(index) = parent.child_index(&name) else {
        create_node(ctx, parent, snapshot, initiator);
        return;
    };

    if parent.children[index].is_directory() != snapshot.is_directory {
        // Kind flip. A top-level directory is never replaced by a file; the
        // reverse replacement is allowed even at the top level.
        if top_level && !snapshot.is_directory {
            ctx.reporter.report_error(ModelError::TopLevelReplacement {
                path: snapshot.path.clone(),
            });
            return;
        }
        let removed = parent.children.remove(index);
        report_subtree_deleted(ctx, &removed, None);
        create_node(ctx, parent, snapshot, initiator);
        return;
    }

    match &mut parent.children[index] {
        TreeNode::Directory(dir) => sync_content(ctx, dir, snapshot, initiator),
        TreeNode::File(file) => {
            let modified = snapshot.last_modified.unwrap_or(SystemTime::UNIX_EPOCH);
            if modified > file.modified {
                file.modified = modified;
                ctx.modification(&snapshot.path, initiator);
            }
        }
    }
}

fn create_node(
    ctx: &SyncCtx<'_>,
    parent: &mut DirectoryItem,
    snapshot: &PathElement,
    initiator: Option<&Initiator>,
) {
    if snapshot.is_directory {
        let index = parent.insert_sorted(TreeNode::Directory(DirectoryItem::new(&snapshot.path)));
        ctx.creation(&snapshot.path, initiator);
        if let TreeNode::Directory(dir) = &mut parent.children[index] {
            sync_content(ctx, dir, snapshot, initiator);
        }
    } else {
        parent.insert_sorted(TreeNode::File(FileItem {
            path: snapshot.path.clone(),
            modified: snapshot.last_modified.unwrap_or(SystemTime::UNIX_EPOCH),
        }));
        ctx.creation(&snapshot.path, initiator);
    }
}

/// Reconcile a directory node's children with the snapshot's children.
fn sync_content(
    ctx: &SyncCtx<'_>,
    dir: &mut DirectoryItem,
    snapshot: &PathElement,
    initiator: Option<&Initiator>,
) {
    let keep: HashSet<String> = snapshot.children.iter().map(PathElement::name).collect();

    // Remove vanished children in reverse canonical order, so files go
    // before their sibling subdirectories and every subtree reports
    // deepest-first.
    let mut index = dir.children.len();
    while index > 0 {
        index -= 1;
        if !keep.contains(&dir.children[index].name()) {
            let removed = dir.children.remove(index);
            report_subtree_deleted(ctx, &removed, initiator);
        }
    }

    for child in &snapshot.children {
        sync_node(ctx, dir, child, initiator, false);
    }
}

fn report_subtree_deleted(ctx: &SyncCtx<'_>, node: &TreeNode, initiator: Option<&Initiator>) {
    if let TreeNode::Directory(dir) = node {
        for child in dir.children.iter().rev() {
            report_subtree_deleted(ctx, child, initiator);
        }
    }
    ctx.deletion(node.path(), initiator);
}
