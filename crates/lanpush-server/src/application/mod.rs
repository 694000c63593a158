//! Application layer: pairing, routing, and delivery.
//!
//! Nothing here touches a socket.  The WebSocket server in
//! `infrastructure::ws_server` turns network events into
//! [`event_router::InboundFrame`]s and sends back whatever
//! [`event_router::RouteOutcome::Reply`] it is given.

pub mod callback_bus;
pub mod credentials;
pub mod event_router;
pub mod file_ingestor;
pub mod session_registry;

use thiserror::Error;

pub use callback_bus::{CallbackBus, Channel, ChannelEvent, ConfigurationError};
pub use credentials::{AddressProbe, CredentialGenerator};
pub use event_router::{DropReason, EventRouter, InboundEvent, InboundFrame, RouteOutcome};
pub use file_ingestor::{FileIngestor, FileStore, IngestError, PersistenceError};
pub use session_registry::{Authorization, SessionRegistry};

/// A connection attempt was refused.
///
/// Surfaced to the phone as a failed WebSocket handshake (HTTP 401); never
/// fatal to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The connection URI carried no `token` query parameter.
    #[error("connection refused: no pairing token in request")]
    MissingToken,

    /// The presented token does not match the current pairing token.
    #[error("connection refused: invalid pairing token")]
    InvalidToken,
}
