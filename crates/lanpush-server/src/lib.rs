//! lanpush-server library crate.
//!
//! The desktop half of LanPush: it shows a pairing credential, accepts one
//! authorized WebSocket session from a phone, and hands decoded text and
//! files to whatever presentation layer registered for them.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Phone (JSON over WebSocket)
//!         ↕
//! [lanpush-server]
//!   ├── domain/           Pure types: ServerConfig, SessionId
//!   ├── application/      Session registry, event router, file ingestor,
//!   │                     callback bus, credential generator
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop + per-session tasks (tokio-tungstenite)
//!         ├── server/     PairingServer start/stop lifecycle
//!         ├── network/    LAN address discovery
//!         ├── storage/    Download directory + TOML config file
//!         └── client/     PushClient (the phone side, for CLI and tests)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `lanpush-core`; it reaches the
//!   outside world only through small traits (`FileStore`, `AddressProbe`).
//!   Its one async dependency is a `tokio::sync::watch` channel that tells
//!   session tasks when they have been superseded.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: configuration and identity types (no I/O).
pub mod domain;

/// Application layer: pairing, routing, and delivery logic.
pub mod application;

/// Infrastructure layer: WebSocket server, storage, and network probes.
pub mod infrastructure;
