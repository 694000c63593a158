//! # lanpush-core
//!
//! Shared library for LanPush containing the JSON wire protocol, the payload
//! types a phone pushes to the desktop, and the pairing credential that is
//! rendered into the QR code.
//!
//! This crate is used by both the desktop server and the push client.  It has
//! zero dependencies on sockets, async runtimes, or UI frameworks.
//!
//! # Architecture overview (for beginners)
//!
//! LanPush lets a phone send short text, clipboard content, and files to a
//! desktop on the same LAN.  The desktop shows a QR code; the phone scans it,
//! learns the desktop's address and a one-time token, and opens a WebSocket.
//!
//! - **`protocol`** – How frames travel over the WebSocket.  Every text frame
//!   is a JSON object `{"event": ..., "data": ...}`.  This module decodes the
//!   bodies of `message` and `file` events into typed Rust structs.
//!
//! - **`domain`** – Pure values with no I/O: the pairing token and the
//!   credential tuple (ip, port, token, name) encoded into the QR payload.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lanpush_core::MessageEnvelope` instead of the full module path.
pub use domain::credential::{AuthToken, CredentialError, PairingCredential};
pub use protocol::envelope::MessageEnvelope;
pub use protocol::error::DecodeError;
pub use protocol::file::{FilePayload, SafeFileName, StoredFile, DEFAULT_MIME_TYPE};
pub use protocol::frames::{EventName, OutboundFrame, WireFrame};
