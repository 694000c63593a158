//! `file` event bodies and filename validation.
//!
//! The phone reads a file, base64-encodes it, and sends:
//!
//! ```json
//! {"name":"photo.jpg","type":"image/jpeg","data":"/9j/4AAQSkZJRgABAQ..."}
//! ```
//!
//! The `name` field is chosen by the remote peer and must never be used as a
//! path directly.  [`SafeFileName`] accepts only a single plain path component.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{json_type_name, DecodeError};

/// MIME type assumed when the phone does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Longest filename accepted, in bytes (the common filesystem limit).
pub const MAX_FILENAME_BYTES: usize = 255;

// ── Inbound payload ───────────────────────────────────────────────────────────

/// A decoded-but-not-yet-validated `file` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Filename as sent by the phone (untrusted).
    pub name: String,
    /// Declared MIME type, or [`DEFAULT_MIME_TYPE`].
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) file content.
    pub data: String,
}

impl FilePayload {
    /// Builds a payload from raw bytes, base64-encoding them.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Decodes a `file` body.
    ///
    /// Takes the body by value so the (potentially large) base64 string is
    /// moved rather than copied.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::NotAnObject`] if the body is not a JSON object.
    /// - [`DecodeError::MissingField`] if `name` is missing or not a string,
    ///   or `type`/`data` are present with a non-string type.
    pub fn from_body(body: Value) -> Result<Self, DecodeError> {
        let mut map = match body {
            Value::Object(map) => map,
            other => {
                return Err(DecodeError::NotAnObject {
                    found: json_type_name(&other),
                })
            }
        };

        let name = match map.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(DecodeError::MissingField("name")),
        };
        let mime_type = match map.remove("type") {
            None | Some(Value::Null) => DEFAULT_MIME_TYPE.to_string(),
            Some(Value::String(t)) if t.trim().is_empty() => DEFAULT_MIME_TYPE.to_string(),
            Some(Value::String(t)) => t,
            Some(_) => return Err(DecodeError::MissingField("type")),
        };
        let data = match map.remove("data") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(data)) => data,
            Some(_) => return Err(DecodeError::MissingField("data")),
        };

        Ok(Self {
            name,
            mime_type,
            data,
        })
    }

    /// Encodes the payload as a `file` body.
    pub fn to_body(&self) -> Value {
        json!({ "name": self.name, "type": self.mime_type, "data": self.data })
    }

    /// Decodes the base64 body, refusing anything larger than `limit` bytes.
    ///
    /// The size check runs on the encoded length first so an oversized body is
    /// rejected without allocating the decoded buffer.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::TooLarge`] if the decoded size exceeds `limit`.
    /// - [`DecodeError::InvalidBase64`] if the body is not valid base64.
    pub fn decode(&self, limit: usize) -> Result<Vec<u8>, DecodeError> {
        let estimated = self.data.len() / 4 * 3;
        // Padding can make the estimate overshoot by at most two bytes.
        if estimated.saturating_sub(2) > limit {
            return Err(DecodeError::TooLarge {
                size: estimated,
                limit,
            });
        }

        let bytes = BASE64
            .decode(self.data.as_bytes())
            .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;

        if bytes.len() > limit {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }
}

// ── Filename validation ───────────────────────────────────────────────────────

/// A filename that is safe to join onto a download directory.
///
/// Construction rejects anything that is not exactly one normal path
/// component on every supported platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeFileName(String);

impl SafeFileName {
    /// Validates an untrusted filename.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsafeFilename`] if `raw` is empty, `.` or `..`,
    /// longer than [`MAX_FILENAME_BYTES`], or contains a path separator, a
    /// drive/stream colon, or a control character.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let unsafe_name = || DecodeError::UnsafeFilename(raw.to_string());

        if raw.is_empty() || raw == "." || raw == ".." || raw.len() > MAX_FILENAME_BYTES {
            return Err(unsafe_name());
        }
        if raw
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
        {
            return Err(unsafe_name());
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SafeFileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Stored file metadata ──────────────────────────────────────────────────────

/// Metadata about a file that has been written to local storage.
///
/// This is what the `file` callback channel receives.  The decoded bytes are
/// not kept in memory after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Sanitized filename the content was stored under.
    pub filename: String,
    /// Declared MIME type.
    pub filetype: String,
    /// Number of bytes written.
    pub byte_length: usize,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
