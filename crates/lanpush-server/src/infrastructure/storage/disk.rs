//! Writes received files into the download directory.

use std::fs;
use std::path::{Path, PathBuf};

use lanpush_core::SafeFileName;
use tracing::debug;

use crate::application::file_ingestor::{FileStore, PersistenceError};

/// A [`FileStore`] rooted at one directory.
///
/// The directory is created on the first write if it does not exist.  A file
/// with the same name is overwritten.
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the download directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for DiskFileStore {
    fn persist(&self, name: &SafeFileName, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.root).map_err(|source| PersistenceError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        // `SafeFileName` is a single normal component, so the join cannot
        // leave `root`.
        let path = self.root.join(name.as_str());
        fs::write(&path, bytes).map_err(|source| PersistenceError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> SafeFileName {
        SafeFileName::parse(s).unwrap()
    }

    #[test]
    fn test_persist_writes_exact_bytes() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());
        let bytes: Vec<u8> = (0..=255).collect();

        // Act
        let path = store.persist(&name("all-bytes.bin"), &bytes).unwrap();

        // Assert
        assert_eq!(path, dir.path().join("all-bytes.bin"));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_persist_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("downloads");
        let store = DiskFileStore::new(&root);

        store.persist(&name("a.txt"), b"a").unwrap();

        assert!(root.join("a.txt").is_file());
    }

    #[test]
    fn test_persist_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());
        store.persist(&name("a.txt"), b"first version").unwrap();

        store.persist(&name("a.txt"), b"second").unwrap();

        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"second");
    }

    #[test]
    fn test_persist_into_a_file_path_fails() {
        // Arrange: the "directory" is actually a regular file
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let store = DiskFileStore::new(&blocker);

        // Act
        let err = store.persist(&name("a.txt"), b"a").unwrap_err();

        // Assert
        assert!(matches!(
            err,
            PersistenceError::CreateDir { .. } | PersistenceError::Write { .. }
        ));
    }
}
