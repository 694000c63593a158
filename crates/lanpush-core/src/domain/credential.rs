//! Pairing token and credential.
//!
//! # Pairing flow (for beginners)
//!
//! ```text
//! Desktop                                   Phone
//! ───────                                   ─────
//! AuthToken::generate(6)  → "482913"
//! PairingCredential { ip, port, token, name }
//!   .to_payload()  → QR code                scan QR
//!                                           PairingCredential::from_payload(..)
//!                                           connect ws://ip:port/?token=482913
//! token matches → session authorized
//! ```
//!
//! The token is a short shared secret shown only on the desktop screen.  It is
//! generated fresh for every server start, so a phone that paired yesterday
//! must scan again today.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Fewest digits a generated token may have (the historical 4-digit PIN).
pub const MIN_TOKEN_DIGITS: u32 = 4;
/// Most digits a generated token may have.
pub const MAX_TOKEN_DIGITS: u32 = 12;
/// Default token width.
pub const DEFAULT_TOKEN_DIGITS: u32 = 6;

/// Errors produced when decoding a scanned pairing payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The payload was not the expected JSON object.
    #[error("malformed pairing payload: {0}")]
    Malformed(String),

    /// A required field was missing or empty.
    #[error("pairing payload is missing `{0}`")]
    MissingField(&'static str),

    /// The `ip` field was not an IPv4 address.
    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    /// The `port` field was not a valid port number.
    #[error("invalid port {0}")]
    InvalidPort(String),

    /// The token contained characters other than ASCII letters and digits.
    #[error("pairing token must be ASCII alphanumeric")]
    InvalidToken,
}

// ── Token ─────────────────────────────────────────────────────────────────────

/// The shared secret a phone must present to open a session.
///
/// `Debug` output is redacted so the token never lands in a log line by
/// accident; use [`AuthToken::as_str`] where it must be shown.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Generates a random numeric token with `digits` digits.
    ///
    /// `digits` is clamped to [`MIN_TOKEN_DIGITS`]..=[`MAX_TOKEN_DIGITS`].
    /// The first digit is never zero, so the token always has exactly the
    /// requested width (4 digits gives 1000..=9999).
    pub fn generate(digits: u32) -> Self {
        let digits = digits.clamp(MIN_TOKEN_DIGITS, MAX_TOKEN_DIGITS);
        let low = 10u64.pow(digits - 1);
        let high = 10u64.pow(digits);
        let mut rng = rand::rng();
        Self(rng.random_range(low..high).to_string())
    }

    /// Wraps an existing token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares `candidate` against this token in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<{} chars>)", self.0.len())
    }
}

// ── Credential ────────────────────────────────────────────────────────────────

/// Everything a phone needs to open an authorized session.
///
/// Immutable after generation; shared read-only between the router (token
/// checks) and whatever renders the QR code (the payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCredential {
    /// One-time token checked on every connection attempt.
    pub token: AuthToken,
    /// LAN address the phone should connect to.
    pub ip: Ipv4Addr,
    /// WebSocket listener port.
    pub port: u16,
    /// Human-readable desktop name shown on the phone.
    pub name: String,
}

/// Wire shape of the QR payload.  Field order is the serialized order.
#[derive(Serialize)]
struct PayloadOut<'a> {
    ip: String,
    port: u16,
    #[serde(rename = "authToken")]
    auth_token: &'a str,
    name: &'a str,
}

/// Lenient decoding shape: `port` may be a number or a numeric string.
#[derive(Deserialize)]
struct PayloadIn {
    ip: Option<String>,
    port: Option<Value>,
    #[serde(rename = "authToken")]
    auth_token: Option<String>,
    name: Option<String>,
}

impl PairingCredential {
    /// Returns the socket address the phone connects to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }

    /// Encodes the credential as the compact JSON payload rendered into the
    /// QR code: `{"ip":..,"port":..,"authToken":..,"name":..}`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Malformed`] if serialization fails.
    pub fn to_payload(&self) -> Result<String, CredentialError> {
        let out = PayloadOut {
            ip: self.ip.to_string(),
            port: self.port,
            auth_token: self.token.as_str(),
            name: &self.name,
        };
        serde_json::to_string(&out).map_err(|e| CredentialError::Malformed(e.to_string()))
    }

    /// Decodes a scanned payload.
    ///
    /// All four fields are required and must be non-empty (after trimming).
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] describing the first problem found.
    pub fn from_payload(text: &str) -> Result<Self, CredentialError> {
        let raw: PayloadIn =
            serde_json::from_str(text).map_err(|e| CredentialError::Malformed(e.to_string()))?;

        let name = non_empty(raw.name, "name")?;
        let ip_text = non_empty(raw.ip, "ip")?;
        let token = non_empty(raw.auth_token, "authToken")?;

        let ip: Ipv4Addr = ip_text
            .parse()
            .map_err(|_| CredentialError::InvalidAddress(ip_text.clone()))?;

        let port = match raw.port {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| CredentialError::InvalidPort(n.to_string()))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| CredentialError::InvalidPort(s.clone()))?,
            _ => return Err(CredentialError::MissingField("port")),
        };
        if port == 0 {
            return Err(CredentialError::InvalidPort("0".to_string()));
        }

        if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CredentialError::InvalidToken);
        }

        Ok(Self {
            token: AuthToken::new(token),
            ip,
            port,
            name,
        })
    }

    /// Returns the WebSocket URL, including the `token` query parameter.
    pub fn connect_url(&self) -> String {
        format!("ws://{}:{}/?token={}", self.ip, self.port, self.token.as_str())
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, CredentialError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CredentialError::MissingField(field)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PairingCredential {
        PairingCredential {
            token: AuthToken::new("4829"),
            ip: Ipv4Addr::new(192, 168, 1, 20),
            port: 5000,
            name: "Desktop".to_string(),
        }
    }

    #[test]
    fn test_generate_respects_digit_count() {
        for digits in [4, 6, 9, 12] {
            let token = AuthToken::generate(digits);
            assert_eq!(token.as_str().len(), digits as usize);
            assert!(token.as_str().chars().all(|c| c.is_ascii_digit()));
            assert_ne!(token.as_str().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_generate_clamps_out_of_range_widths() {
        assert_eq!(AuthToken::generate(1).as_str().len(), MIN_TOKEN_DIGITS as usize);
        assert_eq!(AuthToken::generate(40).as_str().len(), MAX_TOKEN_DIGITS as usize);
    }

    #[test]
    fn test_four_digit_tokens_stay_in_reference_range() {
        for _ in 0..200 {
            let n: u32 = AuthToken::generate(4).as_str().parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_generated_tokens_are_not_fixed() {
        // 12-digit tokens: a repeat across 20 draws would mean a fixed seed.
        let first = AuthToken::generate(12);
        let distinct = (0..20).any(|_| AuthToken::generate(12) != first);
        assert!(distinct);
    }

    #[test]
    fn test_matches_compares_exactly() {
        let token = AuthToken::new("1234");
        assert!(token.matches("1234"));
        assert!(!token.matches("1235"));
        assert!(!token.matches("123"));
        assert!(!token.matches("12345"));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_debug_does_not_reveal_token() {
        let rendered = format!("{:?}", AuthToken::new("987654"));
        assert!(!rendered.contains("987654"));
    }

    #[test]
    fn test_payload_is_minified_with_exactly_four_fields() {
        // Arrange
        let cred = sample();

        // Act
        let payload = cred.to_payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();

        // Assert
        assert!(!payload.contains(' '));
        assert!(!payload.contains('\n'));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["ip"], "192.168.1.20");
        assert_eq!(obj["port"], 5000);
        assert_eq!(obj["authToken"], "4829");
        assert_eq!(obj["name"], "Desktop");
    }

    #[test]
    fn test_payload_field_order_matches_wire_format() {
        let payload = sample().to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"ip":"192.168.1.20","port":5000,"authToken":"4829","name":"Desktop"}"#
        );
    }

    #[test]
    fn test_from_payload_round_trips() {
        let cred = sample();
        let back = PairingCredential::from_payload(&cred.to_payload().unwrap()).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn test_from_payload_accepts_string_port_and_trims() {
        let text = r#"{"ip":" 10.0.0.2 ","port":"5000","authToken":" 1111 ","name":" Office "}"#;
        let cred = PairingCredential::from_payload(text).unwrap();
        assert_eq!(cred.ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(cred.port, 5000);
        assert_eq!(cred.token.as_str(), "1111");
        assert_eq!(cred.name, "Office");
    }

    #[test]
    fn test_from_payload_requires_every_field() {
        let err = PairingCredential::from_payload(r#"{"ip":"10.0.0.2","port":5000,"name":"x"}"#)
            .unwrap_err();
        assert_eq!(err, CredentialError::MissingField("authToken"));

        let err =
            PairingCredential::from_payload(r#"{"ip":"10.0.0.2","authToken":"1","name":"x"}"#)
                .unwrap_err();
        assert_eq!(err, CredentialError::MissingField("port"));
    }

    #[test]
    fn test_from_payload_rejects_empty_name() {
        let err = PairingCredential::from_payload(
            r#"{"ip":"10.0.0.2","port":5000,"authToken":"1","name":"  "}"#,
        )
        .unwrap_err();
        assert_eq!(err, CredentialError::MissingField("name"));
    }

    #[test]
    fn test_from_payload_rejects_bad_address_and_port() {
        let err = PairingCredential::from_payload(
            r#"{"ip":"desktop.local","port":5000,"authToken":"1","name":"x"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidAddress(_)));

        let err = PairingCredential::from_payload(
            r#"{"ip":"10.0.0.2","port":70000,"authToken":"1","name":"x"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidPort(_)));
    }

    #[test]
    fn test_from_payload_rejects_token_needing_escaping() {
        let err = PairingCredential::from_payload(
            r#"{"ip":"10.0.0.2","port":5000,"authToken":"12&x=3","name":"x"}"#,
        )
        .unwrap_err();
        assert_eq!(err, CredentialError::InvalidToken);
    }

    #[test]
    fn test_connect_url_carries_token_query() {
        assert_eq!(sample().connect_url(), "ws://192.168.1.20:5000/?token=4829");
    }
}
