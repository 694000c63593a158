//! The outer JSON frame shared by both directions.
//!
//! # Frame shape
//!
//! Every WebSocket text frame carries exactly one JSON object:
//!
//! ```json
//! {"event":"message","data":{"type":"clipboard","content":"hello"}}
//! ```
//!
//! Inbound frames are first decoded into a loosely typed [`WireFrame`] so an
//! unrecognised event name can be logged and dropped instead of failing the
//! whole frame.  The body is then decoded according to its [`EventName`].
//!
//! Outbound frames are few and fixed, so they use a strongly typed enum
//! ([`OutboundFrame`]) with serde's adjacently tagged representation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DecodeError;

/// Status string carried by a successful `file-ack`.
pub const ACK_STATUS_RECEIVED: &str = "received";

// ── Event names ───────────────────────────────────────────────────────────────

/// The inbound event names the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Connection attempt; produced by the WebSocket handshake.
    Connect,
    /// End of a connection, or a client-requested close.
    Disconnect,
    /// Base64 file upload.
    File,
    /// Text, clipboard, or other small structured payload.
    Message,
}

impl EventName {
    /// Looks up an event by its wire name.  Returns `None` for unknown names.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            "file" => Some(Self::File),
            "message" => Some(Self::Message),
            _ => None,
        }
    }

    /// Returns the wire name of this event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::File => "file",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Loosely typed frame ───────────────────────────────────────────────────────

/// A decoded frame whose body has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    /// Event name, e.g. `"message"`.
    pub event: String,
    /// Event body.  Absent bodies decode as `null`.
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    /// Builds a frame from an event name and a body.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decodes a WebSocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidJson`] if `text` is not a JSON object with
    /// a string `event` field.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }

    /// Returns the recognised event name, if any.
    pub fn event_name(&self) -> Option<EventName> {
        EventName::from_wire(&self.event)
    }

    /// Serializes the frame to compact JSON text.
    ///
    /// # Errors
    ///
    /// Propagates the serializer error; in practice this cannot fail for a
    /// string key and a `serde_json::Value` body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Desktop → phone frames ────────────────────────────────────────────────────

/// Frames the desktop sends back to the phone.
///
/// # Serde representation
///
/// ```json
/// {"event":"file-ack","data":{"status":"received","filename":"photo.jpg"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundFrame {
    /// Acknowledges a file that was written to disk.
    FileAck {
        /// Always [`ACK_STATUS_RECEIVED`] today.
        status: String,
        /// The (sanitized) name the file was stored under.
        filename: String,
    },
}

impl OutboundFrame {
    /// Builds the acknowledgment for a successfully stored file.
    pub fn file_received(filename: impl Into<String>) -> Self {
        Self::FileAck {
            status: ACK_STATUS_RECEIVED.to_string(),
            filename: filename.into(),
        }
    }

    /// Returns the wire event name of this frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::FileAck { .. } => "file-ack",
        }
    }

    /// Serializes the frame to compact JSON text.
    ///
    /// # Errors
    ///
    /// Propagates the serializer error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
