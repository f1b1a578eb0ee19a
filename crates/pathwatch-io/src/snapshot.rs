//! Deterministic snapshot builder.

use std::fs;
use std::path::Path;

use pathwatch_core::{FsError, PathElement};

/// Build a recursively sorted snapshot of `root`.
///
/// A file root yields a leaf element; a directory root is listed, sorted
/// into canonical order, and recursed depth-first. A child disappearing
/// mid-traversal surfaces as the underlying I/O error. Symlinks are captured
/// as file leaves with the link's own modification time.
pub fn tree_snapshot(root: &Path) -> Result<PathElement, FsError> {
    let metadata = fs::symlink_metadata(root).map_err(|e| FsError::io(root, e))?;
    build_element(root, &metadata)
}

fn build_element(path: &Path, metadata: &fs::Metadata) -> Result<PathElement, FsError> {
    if metadata.is_dir() {
        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| FsError::io(path, e))? {
            let entry = entry.map_err(|e| FsError::io(path, e))?;
            let child_path = entry.path();
            let child_metadata =
                fs::symlink_metadata(&child_path).map_err(|e| FsError::io(&child_path, e))?;
            children.push(build_element(&child_path, &child_metadata)?);
        }
        Ok(PathElement::directory(path, children))
    } else {
        let modified = metadata.modified().map_err(|e| FsError::io(path, e))?;
        Ok(PathElement::file(path, modified))
    }
}
