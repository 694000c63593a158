//! `message` event bodies.
//!
//! The phone sends either a structured object or the same object encoded as
//! a JSON string (some socket libraries stringify bodies):
//!
//! ```json
//! {"type":"clipboard","content":"hello"}
//! "{\"type\":\"clipboard\",\"content\":\"hello\"}"
//! ```
//!
//! Both normalise to the same [`MessageEnvelope`].

use serde_json::{json, Map, Value};

use super::error::{json_type_name, DecodeError};

/// Kind used when the body omits `type`.
pub const KIND_TEXT: &str = "text";
/// Kind the phone uses for clipboard pushes.
pub const KIND_CLIPBOARD: &str = "clipboard";

/// A decoded `message` body.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    /// Payload kind, e.g. `"text"` or `"clipboard"`.
    pub kind: String,
    /// Payload content.  Usually a string, but any JSON value is accepted.
    pub content: Value,
}

impl MessageEnvelope {
    /// Builds an envelope from its parts.
    pub fn new(kind: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }

    /// Decodes a `message` body.
    ///
    /// String bodies are parsed as JSON first.  Missing `type` defaults to
    /// [`KIND_TEXT`]; missing `content` defaults to an empty string.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidJson`] if a string body is not valid JSON.
    /// - [`DecodeError::NotAnObject`] if the (decoded) body is not an object.
    /// - [`DecodeError::MissingField`] if `type` is present but not a string.
    pub fn from_body(body: &Value) -> Result<Self, DecodeError> {
        match body {
            Value::String(text) => {
                let parsed: Value = serde_json::from_str(text)
                    .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
                match parsed {
                    Value::Object(map) => Self::from_object(&map),
                    other => Err(DecodeError::NotAnObject {
                        found: json_type_name(&other),
                    }),
                }
            }
            Value::Object(map) => Self::from_object(map),
            other => Err(DecodeError::NotAnObject {
                found: json_type_name(other),
            }),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let kind = match map.get("type") {
            None | Some(Value::Null) => KIND_TEXT.to_string(),
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(DecodeError::MissingField("type")),
        };
        let content = map
            .get("content")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        Ok(Self { kind, content })
    }

    /// Encodes the envelope as a structured `message` body.
    pub fn to_body(&self) -> Value {
        json!({ "type": self.kind, "content": self.content })
    }

    /// Returns the content as a string slice when it is a JSON string.
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_str()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_body_is_parsed_as_json() {
        // Arrange
        let body = Value::String(r#"{"type":"clipboard","content":"hello"}"#.to_string());

        // Act
        let env = MessageEnvelope::from_body(&body).unwrap();

        // Assert
        assert_eq!(env.kind, "clipboard");
        assert_eq!(env.content_str(), Some("hello"));
    }

    #[test]
    fn test_object_body_is_used_directly() {
        let body = json!({"type": "clipboard", "content": "hello"});
        let env = MessageEnvelope::from_body(&body).unwrap();
        assert_eq!(env, MessageEnvelope::new("clipboard", "hello"));
    }

    #[test]
    fn test_missing_type_defaults_to_text() {
        let env = MessageEnvelope::from_body(&json!({"content": "hi"})).unwrap();
        assert_eq!(env.kind, KIND_TEXT);
    }

    #[test]
    fn test_null_type_defaults_to_text() {
        let env = MessageEnvelope::from_body(&json!({"type": null, "content": "hi"})).unwrap();
        assert_eq!(env.kind, KIND_TEXT);
    }

    #[test]
    fn test_missing_content_defaults_to_empty_string() {
        let env = MessageEnvelope::from_body(&json!({"type": "text"})).unwrap();
        assert_eq!(env.content, json!(""));
    }

    #[test]
    fn test_structured_content_is_preserved() {
        let body = json!({"type": "link", "content": {"url": "https://example.com"}});
        let env = MessageEnvelope::from_body(&body).unwrap();
        assert_eq!(env.content["url"], json!("https://example.com"));
        assert_eq!(env.content_str(), None);
    }

    #[test]
    fn test_malformed_json_string_is_decode_error() {
        let body = Value::String("{not json".to_string());
        let err = MessageEnvelope::from_body(&body).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn test_string_body_decoding_to_non_object_is_rejected() {
        let body = Value::String("42".to_string());
        let err = MessageEnvelope::from_body(&body).unwrap_err();
        assert_eq!(err, DecodeError::NotAnObject { found: "number" });
    }

    #[test]
    fn test_array_body_is_rejected() {
        let err = MessageEnvelope::from_body(&json!([1, 2])).unwrap_err();
        assert_eq!(err, DecodeError::NotAnObject { found: "array" });
    }

    #[test]
    fn test_non_string_type_is_rejected() {
        let err = MessageEnvelope::from_body(&json!({"type": 7, "content": "x"})).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("type"));
    }

    #[test]
    fn test_to_body_round_trips_through_from_body() {
        let env = MessageEnvelope::new(KIND_CLIPBOARD, "copied");
        let back = MessageEnvelope::from_body(&env.to_body()).unwrap();
        assert_eq!(back, env);
    }
}
