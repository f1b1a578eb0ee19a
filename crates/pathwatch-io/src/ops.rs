//! Blocking filesystem operations, run exclusively on the worker thread.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use pathwatch_core::{Charset, FsError};

/// Create a single directory; parents must already exist.
pub(crate) fn create_directory(path: &Path) -> Result<(), FsError> {
    fs::create_dir(path).map_err(|e| FsError::io(path, e))
}

/// Create a directory and any missing parents. Existing directories are
/// accepted.
pub(crate) fn create_directories(path: &Path) -> Result<(), FsError> {
    fs::create_dir_all(path).map_err(|e| FsError::io(path, e))
}

/// Create an empty file; fails when the target already exists.
pub(crate) fn create_file(path: &Path) -> Result<(), FsError> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
        .map_err(|e| FsError::io(path, e))
}

/// Remove a file or an empty directory.
///
/// Returns whether the path existed; a missing path is `Ok(false)`, not an
/// error. Deleting a non-empty directory fails.
pub(crate) fn delete(path: &Path) -> Result<bool, FsError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(FsError::io(path, e)),
    };
    if metadata.is_dir() {
        fs::remove_dir(path).map_err(|e| FsError::io(path, e))?;
    } else {
        fs::remove_file(path).map_err(|e| FsError::io(path, e))?;
    }
    Ok(true)
}

/// Recursively remove a subtree, deepest entries first. A missing root is
/// treated as already deleted.
pub(crate) fn delete_tree(path: &Path) -> Result<(), FsError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(FsError::io(path, e)),
    };
    if metadata.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| FsError::io(path, e))? {
            let entry = entry.map_err(|e| FsError::io(path, e))?;
            delete_tree(&entry.path())?;
        }
        fs::remove_dir(path).map_err(|e| FsError::io(path, e))?;
    } else {
        fs::remove_file(path).map_err(|e| FsError::io(path, e))?;
    }
    Ok(())
}

/// Read a file's raw bytes.
pub(crate) fn read_binary_file(path: &Path) -> Result<Vec<u8>, FsError> {
    fs::read(path).map_err(|e| FsError::io(path, e))
}

/// Read a file and decode it in the given charset.
pub(crate) fn read_text_file(path: &Path, charset: Charset) -> Result<String, FsError> {
    let bytes = read_binary_file(path)?;
    charset.decode(&bytes).ok_or(FsError::Encoding {
        path: path.to_path_buf(),
        charset,
    })
}

/// Write raw bytes, truncating any existing content. Returns the resulting
/// modification time.
pub(crate) fn write_binary_file(path: &Path, bytes: &[u8]) -> Result<SystemTime, FsError> {
    fs::write(path, bytes).map_err(|e| FsError::io(path, e))?;
    modified_time(path)
}

/// Encode and write text content, truncating any existing content. Returns
/// the resulting modification time.
pub(crate) fn write_text_file(
    path: &Path,
    content: &str,
    charset: Charset,
) -> Result<SystemTime, FsError> {
    let bytes = charset.encode(content).ok_or(FsError::Encoding {
        path: path.to_path_buf(),
        charset,
    })?;
    write_binary_file(path, &bytes)
}

fn modified_time(path: &Path) -> Result<SystemTime, FsError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| FsError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn delete_reports_whether_path_existed() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");

        assert!(!delete(&file).unwrap());

        fs::write(&file, "x").unwrap();
        assert!(delete(&file).unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn delete_refuses_non_empty_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f.txt"), "x").unwrap();

        assert!(matches!(
            delete(&dir),
            Err(FsError::DirectoryNotEmpty { .. })
        ));
        assert!(dir.exists());
    }

    #[test]
    fn delete_tree_tolerates_missing_root() {
        let temp = TempDir::new().unwrap();
        delete_tree(&temp.path().join("missing")).unwrap();
    }

    #[test]
    fn delete_tree_removes_nested_subtree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("d");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/f1"), "x").unwrap();
        fs::write(root.join("a/b/f2"), "y").unwrap();

        delete_tree(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn create_file_fails_on_existing_target() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");
        create_file(&file).unwrap();

        assert!(matches!(
            create_file(&file),
            Err(FsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn create_directory_requires_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("missing/child");

        assert!(matches!(
            create_directory(&nested),
            Err(FsError::NotFound { .. })
        ));
        create_directories(&nested).unwrap();
        assert!(nested.is_dir());
        // Recursive variant accepts an existing target.
        create_directories(&nested).unwrap();
    }

    #[test]
    fn writes_truncate_and_replace() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");

        write_text_file(&file, "a much longer original content", Charset::Utf8).unwrap();
        write_text_file(&file, "short", Charset::Utf8).unwrap();
        assert_eq!(read_text_file(&file, Charset::Utf8).unwrap(), "short");
    }

    #[test]
    fn text_round_trip_in_each_charset() {
        let temp = TempDir::new().unwrap();
        for charset in [Charset::Utf8, Charset::Utf16Le, Charset::Utf16Be, Charset::Latin1] {
            let file = temp.path().join("f.txt");
            write_text_file(&file, "hello", charset).unwrap();
            assert_eq!(read_text_file(&file, charset).unwrap(), "hello");
        }
    }

    #[test]
    fn invalid_encoding_is_reported() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");
        fs::write(&file, [0xff, 0xfe, 0xfd]).unwrap();

        assert!(matches!(
            read_text_file(&file, Charset::Utf8),
            Err(FsError::Encoding { .. })
        ));
    }
}
