//! Infrastructure layer for the desktop receiver.
//!
//! Contains the OS-facing adapters: the WebSocket listener and its
//! lifecycle, the LAN address probe, the download directory, the TOML config
//! file, and the push client.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`, and
//! `lanpush_core`, but MUST NOT be imported by them (tests excepted).

pub mod client;
pub mod network;
pub mod server;
pub mod storage;
pub mod ws_server;
