//! FileIngestor: turns a `file` frame body into a file on disk.
//!
//! Steps, in order:
//!
//! 1. Validate the untrusted filename ([`SafeFileName`]).  A name such as
//!    `../../.bashrc` is rejected before anything is decoded.
//! 2. Decode the base64 body, enforcing the size limit.
//! 3. Persist through the [`FileStore`] seam.
//!
//! The decoded bytes are dropped as soon as the write returns; only the
//! [`StoredFile`] metadata leaves this module.

use std::path::PathBuf;
use std::sync::Arc;

use lanpush_core::{DecodeError, FilePayload, SafeFileName, StoredFile};
use thiserror::Error;
use tracing::debug;

/// A write to local storage failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The target directory could not be created.
    #[error("failed to create download directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any reason a `file` frame did not produce a stored file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Destination for received files.
///
/// The disk implementation lives in `infrastructure::storage`; tests use the
/// in-memory one.
pub trait FileStore: Send + Sync {
    /// Writes `bytes` under `name`, returning where it was stored.
    fn persist(&self, name: &SafeFileName, bytes: &[u8]) -> Result<PathBuf, PersistenceError>;
}

/// Decodes and stores file payloads.
pub struct FileIngestor {
    store: Arc<dyn FileStore>,
    max_file_bytes: usize,
}

impl FileIngestor {
    /// Creates an ingestor writing into `store`, refusing files larger than
    /// `max_file_bytes`.
    pub fn new(store: Arc<dyn FileStore>, max_file_bytes: usize) -> Self {
        Self {
            store,
            max_file_bytes,
        }
    }

    /// Validates, decodes, and persists one payload.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Decode`] for an unsafe filename, malformed base64, or
    ///   an oversized body.  Nothing is written.
    /// - [`IngestError::Persistence`] if the store fails.
    pub fn ingest(&self, payload: &FilePayload) -> Result<StoredFile, IngestError> {
        let name = SafeFileName::parse(&payload.name)?;
        let bytes = payload.decode(self.max_file_bytes)?;
        let path = self.store.persist(&name, &bytes)?;

        debug!("stored {} ({} bytes) at {}", name, bytes.len(), path.display());

        Ok(StoredFile {
            filename: name.as_str().to_string(),
            filetype: payload.mime_type.clone(),
            byte_length: bytes.len(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
