//! EventRouter: the single entry point for inbound frames.
//!
//! The transport turns every network event into an [`InboundFrame`]:
//!
//! | Event        | Produced by                               | Router action                     |
//! |--------------|-------------------------------------------|-----------------------------------|
//! | `connect`    | the WebSocket handshake (`?token=...`)    | [`SessionRegistry::authorize`]    |
//! | `disconnect` | socket closed, or a `disconnect` frame    | [`SessionRegistry::clear`]        |
//! | `file`       | text frame                                | [`FileIngestor`], then `file-ack` |
//! | `message`    | text frame                                | [`CallbackBus`] channel `message` |
//!
//! `file` and `message` frames from a session that is not the authorized one
//! are dropped.  Every per-frame failure becomes a [`RouteOutcome::Dropped`];
//! nothing here ends the session except `disconnect`.
//!
//! # Ordering
//!
//! [`EventRouter::dispatch`] is synchronous.  The transport awaits each
//! dispatch before reading the session's next frame, so frames from one
//! session are handled one at a time in arrival order.

use std::sync::Arc;

use lanpush_core::{DecodeError, EventName, FilePayload, MessageEnvelope, OutboundFrame, WireFrame};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::callback_bus::{CallbackBus, ChannelEvent};
use super::file_ingestor::{FileIngestor, IngestError, PersistenceError};
use super::session_registry::{Authorization, SessionRegistry};
use super::AuthorizationError;
use crate::domain::SessionId;

// ── Inbound frames ────────────────────────────────────────────────────────────

/// What arrived, with its body still untyped.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A handshake carrying the `token` query parameter, if any.
    Connect { token: Option<String> },
    /// The session ended or asked to end.
    Disconnect,
    /// Body of a `file` frame.
    File(Value),
    /// Body of a `message` frame.
    Message(Value),
    /// A frame with an event name outside the recognised set.
    Unknown(String),
}

/// One event from one session.  Lives for a single dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub session_id: SessionId,
    pub event: InboundEvent,
}

impl InboundFrame {
    /// Builds the `connect` frame for a handshake whose request URI had
    /// `query` as its query string.
    pub fn connect(session_id: SessionId, query: Option<&str>) -> Self {
        Self {
            session_id,
            event: InboundEvent::Connect {
                token: query.and_then(token_from_query),
            },
        }
    }

    /// Builds the `disconnect` frame for a closed session.
    pub fn disconnect(session_id: SessionId) -> Self {
        Self {
            session_id,
            event: InboundEvent::Disconnect,
        }
    }

    /// Decodes a WebSocket text frame.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidJson`] if `text` is not a `{"event", "data"}`
    ///   object.
    /// - [`DecodeError::ReservedEvent`] for `connect`, which only the
    ///   handshake may produce.
    pub fn from_wire(session_id: SessionId, text: &str) -> Result<Self, DecodeError> {
        let frame = WireFrame::parse(text)?;
        let event = match frame.event_name() {
            Some(EventName::Connect) => return Err(DecodeError::ReservedEvent(frame.event)),
            Some(EventName::Disconnect) => InboundEvent::Disconnect,
            Some(EventName::File) => InboundEvent::File(frame.data),
            Some(EventName::Message) => InboundEvent::Message(frame.data),
            None => InboundEvent::Unknown(frame.event),
        };
        Ok(Self { session_id, event })
    }
}

/// Extracts the `token` parameter from a URI query string.
fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Why a frame was not delivered.
#[derive(Debug)]
pub enum DropReason {
    /// The frame came from a session that is not the authorized one.
    Unauthorized,
    /// The handshake was refused.
    Refused(AuthorizationError),
    /// The body could not be decoded.
    Decode(DecodeError),
    /// The file was decoded but could not be written.
    Persistence(PersistenceError),
    /// The event name is not one the router handles.
    UnknownEvent(String),
}

/// Result of dispatching one frame.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Delivered; send this frame back to the originating session.
    Reply(OutboundFrame),
    /// Delivered; nothing to send back.
    Delivered,
    /// Not delivered.  Already logged.
    Dropped(DropReason),
    /// The session is over; the transport should close the socket.
    Closed,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Routes inbound frames to the registry, the ingestor, and the bus.
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    ingestor: FileIngestor,
    bus: Arc<CallbackBus>,
}

impl EventRouter {
    pub fn new(registry: Arc<SessionRegistry>, ingestor: FileIngestor, bus: Arc<CallbackBus>) -> Self {
        Self {
            registry,
            ingestor,
            bus,
        }
    }

    /// Returns the session registry this router consults.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Checks a handshake's query string and authorizes the session.
    ///
    /// Called from the handshake callback, before the upgrade completes, so a
    /// refused session never gets to send a frame.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::MissingToken`] if `query` has no `token`.
    /// - [`AuthorizationError::InvalidToken`] if it does not match.
    pub fn authorize_connect(
        &self,
        session_id: SessionId,
        query: Option<&str>,
    ) -> Result<Authorization, AuthorizationError> {
        match query.and_then(token_from_query) {
            Some(token) => self.authorize_token(session_id, &token),
            None => {
                warn!("session {session_id} connected without a pairing token");
                Err(AuthorizationError::MissingToken)
            }
        }
    }

    /// Decodes a WebSocket text frame and dispatches it.
    ///
    /// A frame that cannot be decoded is dropped like any other bad body.
    pub fn dispatch_text(&self, session_id: SessionId, text: &str) -> RouteOutcome {
        match InboundFrame::from_wire(session_id, text) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => {
                warn!("dropping undecodable frame from session {session_id}: {e}");
                RouteOutcome::Dropped(DropReason::Decode(e))
            }
        }
    }

    /// Handles one frame.
    pub fn dispatch(&self, frame: InboundFrame) -> RouteOutcome {
        let sid = frame.session_id;
        match frame.event {
            InboundEvent::Connect { token } => {
                let result = match token {
                    Some(token) => self.authorize_token(sid, &token),
                    None => Err(AuthorizationError::MissingToken),
                };
                match result {
                    Ok(_) => RouteOutcome::Delivered,
                    Err(e) => RouteOutcome::Dropped(DropReason::Refused(e)),
                }
            }

            InboundEvent::Disconnect => {
                if self.registry.clear(sid) {
                    info!("session {sid} disconnected");
                } else {
                    debug!("session {sid} closed (was not the authorized session)");
                }
                RouteOutcome::Closed
            }

            InboundEvent::File(body) => {
                if !self.registry.is_authorized(sid) {
                    warn!("dropping file frame from unauthorized session {sid}");
                    return RouteOutcome::Dropped(DropReason::Unauthorized);
                }
                self.handle_file(sid, body)
            }

            InboundEvent::Message(body) => {
                if !self.registry.is_authorized(sid) {
                    warn!("dropping message frame from unauthorized session {sid}");
                    return RouteOutcome::Dropped(DropReason::Unauthorized);
                }
                self.handle_message(sid, &body)
            }

            InboundEvent::Unknown(name) => {
                warn!("dropping frame with unknown event {name:?} from session {sid}");
                RouteOutcome::Dropped(DropReason::UnknownEvent(name))
            }
        }
    }

    fn authorize_token(
        &self,
        sid: SessionId,
        token: &str,
    ) -> Result<Authorization, AuthorizationError> {
        let outcome = self.registry.authorize(token, sid);
        match outcome {
            Authorization::Granted => info!("session {sid} authorized"),
            Authorization::Superseded { previous } => {
                info!("session {sid} authorized, superseding {previous}")
            }
            Authorization::Refused => {
                warn!("session {sid} presented an invalid pairing token");
                return Err(AuthorizationError::InvalidToken);
            }
        }
        Ok(outcome)
    }

    fn handle_file(&self, sid: SessionId, body: Value) -> RouteOutcome {
        let payload = match FilePayload::from_body(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("dropping file frame from session {sid}: {e}");
                return RouteOutcome::Dropped(DropReason::Decode(e));
            }
        };

        match self.ingestor.ingest(&payload) {
            Ok(stored) => {
                info!("received file {} ({} bytes)", stored.filename, stored.byte_length);
                let ack = OutboundFrame::file_received(stored.filename.clone());
                self.bus.dispatch(ChannelEvent::File(stored));
                RouteOutcome::Reply(ack)
            }
            Err(IngestError::Decode(e)) => {
                warn!("dropping file frame from session {sid}: {e}");
                RouteOutcome::Dropped(DropReason::Decode(e))
            }
            Err(IngestError::Persistence(e)) => {
                error!("could not store file from session {sid}: {e}");
                RouteOutcome::Dropped(DropReason::Persistence(e))
            }
        }
    }

    fn handle_message(&self, sid: SessionId, body: &Value) -> RouteOutcome {
        let envelope = match MessageEnvelope::from_body(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping message frame from session {sid}: {e}");
                return RouteOutcome::Dropped(DropReason::Decode(e));
            }
        };

        debug!("session {sid} sent a {} message", envelope.kind);
        let delivered = self.bus.dispatch(ChannelEvent::Message {
            kind: envelope.kind,
            content: envelope.content,
        });
        if !delivered {
            debug!("no message handler registered; message discarded");
        }
        RouteOutcome::Delivered
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::file_ingestor::FileStore;
    use crate::infrastructure::storage::memory::MemoryFileStore;
    use lanpush_core::{AuthToken, StoredFile};
    use serde_json::json;
    use std::sync::Mutex;

    const TOKEN: &str = "482913";

    struct Fixture {
        router: EventRouter,
        store: Arc<MemoryFileStore>,
        messages: Arc<Mutex<Vec<(String, Value)>>>,
        files: Arc<Mutex<Vec<StoredFile>>>,
    }

    fn fixture_with_store(store: MemoryFileStore) -> Fixture {
        let store = Arc::new(store);
        let bus = Arc::new(CallbackBus::new());

        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        bus.on_message(move |kind, content| {
            sink.lock().unwrap().push((kind.to_string(), content.clone()));
        });

        let files = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&files);
        bus.on_file(move |stored| sink.lock().unwrap().push(stored.clone()));

        let registry = Arc::new(SessionRegistry::new(AuthToken::new(TOKEN)));
        let ingestor = FileIngestor::new(Arc::clone(&store) as Arc<dyn FileStore>, 1024);
        Fixture {
            router: EventRouter::new(registry, ingestor, bus),
            store,
            messages,
            files,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(MemoryFileStore::new())
    }

    fn connected(fx: &Fixture) -> SessionId {
        let sid = SessionId::new();
        let query = format!("token={TOKEN}");
        assert!(matches!(
            fx.router.dispatch(InboundFrame::connect(sid, Some(&query))),
            RouteOutcome::Delivered
        ));
        sid
    }

    fn frame(sid: SessionId, event: InboundEvent) -> InboundFrame {
        InboundFrame {
            session_id: sid,
            event,
        }
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    #[test]
    fn test_from_wire_maps_known_events() {
        let sid = SessionId::new();
        let f = InboundFrame::from_wire(sid, r#"{"event":"message","data":{"content":"x"}}"#).unwrap();
        assert_eq!(f.event, InboundEvent::Message(json!({"content": "x"})));

        let f = InboundFrame::from_wire(sid, r#"{"event":"disconnect"}"#).unwrap();
        assert_eq!(f.event, InboundEvent::Disconnect);
    }

    #[test]
    fn test_from_wire_rejects_connect_frames() {
        let err = InboundFrame::from_wire(SessionId::new(), r#"{"event":"connect","data":null}"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::ReservedEvent("connect".to_string()));
    }

    #[test]
    fn test_from_wire_keeps_unknown_event_name() {
        let f = InboundFrame::from_wire(SessionId::new(), r#"{"event":"ping","data":1}"#).unwrap();
        assert_eq!(f.event, InboundEvent::Unknown("ping".to_string()));
    }

    #[test]
    fn test_connect_frame_extracts_percent_encoded_token() {
        let f = InboundFrame::connect(SessionId::new(), Some("foo=1&token=48%2091"));
        assert_eq!(
            f.event,
            InboundEvent::Connect {
                token: Some("48 91".to_string())
            }
        );
    }

    // ── Authorization ─────────────────────────────────────────────────────────

    #[test]
    fn test_authorize_connect_without_token_is_refused() {
        let fx = fixture();
        let err = fx.router.authorize_connect(SessionId::new(), Some("other=1")).unwrap_err();
        assert_eq!(err, AuthorizationError::MissingToken);
        assert_eq!(
            fx.router.authorize_connect(SessionId::new(), None).unwrap_err(),
            AuthorizationError::MissingToken
        );
    }

    #[test]
    fn test_authorize_connect_with_wrong_token_is_refused() {
        let fx = fixture();
        let err = fx
            .router
            .authorize_connect(SessionId::new(), Some("token=000000"))
            .unwrap_err();
        assert_eq!(err, AuthorizationError::InvalidToken);
        assert_eq!(fx.router.registry().current(), None);
    }

    #[test]
    fn test_second_connect_supersedes_first() {
        // Arrange
        let fx = fixture();
        let first = connected(&fx);

        // Act
        let second = SessionId::new();
        let outcome = fx
            .router
            .authorize_connect(second, Some(&format!("token={TOKEN}")))
            .unwrap();

        // Assert
        assert_eq!(outcome, Authorization::Superseded { previous: first });
        assert!(!fx.router.registry().is_authorized(first));
        assert!(fx.router.registry().is_authorized(second));
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    #[test]
    fn test_string_message_body_dispatches_kind_and_content() {
        // Arrange
        let fx = fixture();
        let sid = connected(&fx);
        let body = json!(r#"{"type":"clipboard","content":"hello"}"#);

        // Act
        let outcome = fx.router.dispatch(frame(sid, InboundEvent::Message(body)));

        // Assert
        assert!(matches!(outcome, RouteOutcome::Delivered));
        assert_eq!(
            fx.messages.lock().unwrap().as_slice(),
            &[("clipboard".to_string(), json!("hello"))]
        );
    }

    #[test]
    fn test_object_message_body_defaults_kind_to_text() {
        let fx = fixture();
        let sid = connected(&fx);

        fx.router
            .dispatch(frame(sid, InboundEvent::Message(json!({"content": {"a": 1}}))));

        assert_eq!(
            fx.messages.lock().unwrap().as_slice(),
            &[("text".to_string(), json!({"a": 1}))]
        );
    }

    #[test]
    fn test_malformed_json_message_is_dropped_without_dispatch() {
        let fx = fixture();
        let sid = connected(&fx);

        let outcome = fx
            .router
            .dispatch(frame(sid, InboundEvent::Message(json!("{not json"))));

        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(DropReason::Decode(DecodeError::InvalidJson(_)))
        ));
        assert!(fx.messages.lock().unwrap().is_empty());
        // The session survives the bad frame.
        assert!(fx.router.registry().is_authorized(sid));
    }

    #[test]
    fn test_message_from_unauthorized_session_is_dropped() {
        let fx = fixture();
        let outcome = fx.router.dispatch(frame(
            SessionId::new(),
            InboundEvent::Message(json!({"content": "x"})),
        ));
        assert!(matches!(outcome, RouteOutcome::Dropped(DropReason::Unauthorized)));
        assert!(fx.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_message_from_superseded_session_is_dropped() {
        let fx = fixture();
        let first = connected(&fx);
        let _second = connected(&fx);

        let outcome = fx
            .router
            .dispatch(frame(first, InboundEvent::Message(json!({"content": "late"}))));

        assert!(matches!(outcome, RouteOutcome::Dropped(DropReason::Unauthorized)));
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_file_is_stored_acked_and_published() {
        // Arrange
        let fx = fixture();
        let sid = connected(&fx);
        let body = FilePayload::from_bytes("photo.jpg", "image/jpeg", &[0xff, 0xd8, 0x00]).to_body();

        // Act
        let outcome = fx.router.dispatch(frame(sid, InboundEvent::File(body)));

        // Assert
        match outcome {
            RouteOutcome::Reply(ack) => assert_eq!(ack, OutboundFrame::file_received("photo.jpg")),
            other => panic!("expected a file-ack reply, got {other:?}"),
        }
        assert_eq!(fx.store.get("photo.jpg").unwrap(), vec![0xff, 0xd8, 0x00]);
        let files = fx.files.lock().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filetype, "image/jpeg");
        assert_eq!(files[0].byte_length, 3);
    }

    #[test]
    fn test_file_before_connect_is_dropped_without_ack() {
        let fx = fixture();
        let body = FilePayload::from_bytes("a.txt", "text/plain", b"a").to_body();

        let outcome = fx
            .router
            .dispatch(frame(SessionId::new(), InboundEvent::File(body)));

        assert!(matches!(outcome, RouteOutcome::Dropped(DropReason::Unauthorized)));
        assert_eq!(fx.store.len(), 0);
        assert!(fx.files.lock().unwrap().is_empty());
    }

    #[test]
    fn test_file_with_traversal_name_is_dropped() {
        let fx = fixture();
        let sid = connected(&fx);
        let body = FilePayload::from_bytes("../../.bashrc", "text/plain", b"x").to_body();

        let outcome = fx.router.dispatch(frame(sid, InboundEvent::File(body)));

        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(DropReason::Decode(DecodeError::UnsafeFilename(_)))
        ));
        assert_eq!(fx.store.len(), 0);
    }

    #[test]
    fn test_file_write_failure_sends_no_ack_and_no_callback() {
        // Arrange
        let fx = fixture_with_store(MemoryFileStore::failing());
        let sid = connected(&fx);
        let body = FilePayload::from_bytes("a.txt", "text/plain", b"a").to_body();

        // Act
        let outcome = fx.router.dispatch(frame(sid, InboundEvent::File(body)));

        // Assert
        assert!(matches!(outcome, RouteOutcome::Dropped(DropReason::Persistence(_))));
        assert!(fx.files.lock().unwrap().is_empty());
        assert!(fx.router.registry().is_authorized(sid));
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn test_disconnect_clears_authorized_session() {
        let fx = fixture();
        let sid = connected(&fx);

        let outcome = fx.router.dispatch(InboundFrame::disconnect(sid));

        assert!(matches!(outcome, RouteOutcome::Closed));
        assert_eq!(fx.router.registry().current(), None);
    }

    #[test]
    fn test_disconnect_of_stale_session_keeps_current() {
        let fx = fixture();
        let first = connected(&fx);
        let second = connected(&fx);

        fx.router.dispatch(InboundFrame::disconnect(first));

        assert_eq!(fx.router.registry().current(), Some(second));
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let fx = fixture();
        let sid = connected(&fx);

        let outcome = fx
            .router
            .dispatch(frame(sid, InboundEvent::Unknown("typing".to_string())));

        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(DropReason::UnknownEvent(name)) if name == "typing"
        ));
    }

    #[test]
    fn test_dispatch_text_routes_and_drops_garbage() {
        // Arrange
        let fx = fixture();
        let sid = connected(&fx);

        // Act
        let good = fx
            .router
            .dispatch_text(sid, r#"{"event":"message","data":{"type":"text","content":"hi"}}"#);
        let bad = fx.router.dispatch_text(sid, "definitely not json");
        let reserved = fx.router.dispatch_text(sid, r#"{"event":"connect","data":{}}"#);

        // Assert
        assert!(matches!(good, RouteOutcome::Delivered));
        assert!(matches!(
            bad,
            RouteOutcome::Dropped(DropReason::Decode(DecodeError::InvalidJson(_)))
        ));
        assert!(matches!(
            reserved,
            RouteOutcome::Dropped(DropReason::Decode(DecodeError::ReservedEvent(_)))
        ));
        assert_eq!(fx.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disconnect_frame_from_client_closes_session() {
        let fx = fixture();
        let sid = connected(&fx);

        let outcome = fx.router.dispatch_text(sid, r#"{"event":"disconnect"}"#);

        assert!(matches!(outcome, RouteOutcome::Closed));
        assert_eq!(fx.router.registry().current(), None);
    }

    #[test]
    fn test_connect_frame_with_wrong_token_is_refused() {
        let fx = fixture();
        let outcome = fx
            .router
            .dispatch(InboundFrame::connect(SessionId::new(), Some("token=1")));
        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(DropReason::Refused(AuthorizationError::InvalidToken))
        ));
    }
}
