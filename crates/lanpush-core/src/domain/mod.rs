//! Domain layer: pure pairing values with no I/O.

pub mod credential;

pub use credential::{AuthToken, CredentialError, PairingCredential};
