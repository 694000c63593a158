//! Domain layer for lanpush-server.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes.
//!
//! - Configuration structures
//! - Session identity

pub mod config;
pub mod session;

pub use config::ServerConfig;
pub use session::SessionId;
