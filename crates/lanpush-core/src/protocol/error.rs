//! Decode errors for inbound frames.

use thiserror::Error;

/// Errors produced while decoding an inbound frame or its body.
///
/// Every variant is recoverable: the offending frame is dropped and logged,
/// the session stays open, and nothing is sent back to the phone.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A frame or a string-encoded body was not valid JSON.
    #[error("malformed JSON: {0}")]
    InvalidJson(String),

    /// The JSON parsed but was not an object where one was required.
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A required field was absent or had the wrong JSON type.
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    /// The base64 body of a file payload could not be decoded.
    #[error("malformed base64 body: {0}")]
    InvalidBase64(String),

    /// The decoded file would exceed the configured size limit.
    #[error("file body is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The filename is empty, a path, or otherwise unsafe to write.
    #[error("unsafe filename {0:?}")]
    UnsafeFilename(String),

    /// A transport-reserved event name arrived as a frame.
    #[error("event `{0}` is reserved for the transport")]
    ReservedEvent(String),
}

/// Returns the JSON type name of `value` for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
