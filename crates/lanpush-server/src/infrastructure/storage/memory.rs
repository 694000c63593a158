//! In-memory file store for unit testing.
//!
//! Records every persisted file in a `Mutex<HashMap<..>>` so tests can check
//! exactly what would have been written, without touching the disk.
//!
//! # `should_fail` flag
//!
//! Build with [`MemoryFileStore::failing`] to make every `persist` call
//! return a [`PersistenceError::Write`].  This exercises the no-ack,
//! no-callback path without needing a read-only filesystem.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use lanpush_core::SafeFileName;

use crate::application::file_ingestor::{FileStore, PersistenceError};

/// A [`FileStore`] that keeps files in memory.
#[derive(Default)]
pub struct MemoryFileStore {
    /// Stored files, keyed by filename.
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    /// When `true`, every `persist` call fails.
    pub should_fail: bool,
}

impl MemoryFileStore {
    /// Creates an empty store that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Returns a copy of the bytes stored under `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Returns the number of stored files.
    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileStore for MemoryFileStore {
    fn persist(&self, name: &SafeFileName, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
        let path = PathBuf::from(name.as_str());
        if self.should_fail {
            return Err(PersistenceError::Write {
                path,
                source: io::Error::other("mock failure"),
            });
        }
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.as_str().to_string(), bytes.to_vec());
        Ok(path)
    }
}
