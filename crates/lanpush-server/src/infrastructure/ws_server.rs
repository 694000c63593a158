//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Accepting incoming TCP connections from phones.
//! 2. Authorizing each connection *during* the WebSocket upgrade: the
//!    `token` query parameter is checked in the handshake callback and a
//!    mismatch is answered with `401 Unauthorized`, so a refused phone never
//!    gets an open socket.
//! 3. Running one read loop per session that hands every text frame to the
//!    [`EventRouter`] and sends back any reply (the `file-ack`).
//! 4. Pinging the phone every `ping_interval` and closing sessions that have
//!    been silent for `idle_timeout`.  A connection that never completes the
//!    upgrade is dropped after the same `idle_timeout`.
//! 5. Closing a session with reason `superseded` as soon as another phone
//!    takes over the pairing.
//! 6. Stopping when the `running` flag is cleared.
//!
//! # Ordering
//!
//! The read loop awaits the router before reading the next frame, so frames
//! from one session are dispatched strictly in arrival order.  The router
//! runs on the blocking pool (`spawn_blocking`) because a `file` frame ends
//! in a synchronous disk write.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{
    accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{frame::coding::CloseCode, CloseFrame, WebSocketConfig},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::{AuthorizationError, EventRouter, InboundFrame, RouteOutcome};
use crate::domain::{ServerConfig, SessionId};

/// Close reason sent to a session displaced by a newer one.
pub const CLOSE_REASON_SUPERSEDED: &str = "superseded";
/// Close reason sent to a session that stopped answering pings.
pub const CLOSE_REASON_IDLE: &str = "idle timeout";

/// How long teardown waits for the phone to answer our Close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a session task needs, shared across all sessions.
pub struct SessionContext {
    pub router: EventRouter,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl SessionContext {
    /// Builds a context from the router and the transport settings in `config`.
    pub fn new(router: EventRouter, config: &ServerConfig) -> Self {
        Self {
            router,
            ping_interval: config.ping_interval,
            idle_timeout: config.idle_timeout,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the accept loop on `listener` until `running` is set to `false`.
///
/// Each accepted connection is handed off to its own Tokio task.  When the
/// loop stops, session tasks still running are aborted.
///
/// # Errors
///
/// Currently infallible once the listener is bound; the `Result` keeps the
/// signature stable for the caller's `JoinHandle`.
pub async fn run_server(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let mut sessions = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the loop notices the `running` flag even when no
        // phone is connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                sessions.spawn(async move {
                    handle_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }

        // Reap finished sessions so the set does not grow without bound.
        while sessions.try_join_next().is_some() {}
    }

    sessions.shutdown().await;
    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each session task: runs [`run_session`] and logs the outcome.
async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<SessionContext>) {
    match run_session(stream, peer_addr, ctx).await {
        Ok(end) => debug!("connection {peer_addr} finished: {end:?}"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Why a session's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The phone closed the socket or the stream ended.
    PeerClosed,
    /// The phone sent a `disconnect` frame.
    ClientDisconnect,
    /// Another phone authorized with the token.
    Superseded,
    /// Nothing arrived for `idle_timeout`.
    Idle,
    /// The socket failed.
    TransportError,
}

impl SessionEnd {
    /// Returns the Close frame to send, if the server initiates the close.
    pub fn close_frame(self) -> Option<CloseFrame<'static>> {
        let (code, reason) = match self {
            Self::PeerClosed | Self::TransportError => return None,
            Self::ClientDisconnect => (CloseCode::Normal, ""),
            Self::Superseded => (CloseCode::Policy, CLOSE_REASON_SUPERSEDED),
            Self::Idle => (CloseCode::Away, CLOSE_REASON_IDLE),
        };
        Some(CloseFrame {
            code,
            reason: reason.into(),
        })
    }
}

/// Runs one connection from handshake to close.
///
/// # Errors
///
/// Returns an error if the handshake fails or is refused.  Everything after
/// the handshake ends in a [`SessionEnd`].
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<SessionContext>,
) -> anyhow::Result<SessionEnd> {
    let sid = SessionId::new();

    // ── Step 1: handshake + authorization ─────────────────────────────────────
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(ctx.max_frame_bytes);
    ws_config.max_frame_size = Some(ctx.max_frame_bytes);

    let callback = |request: &Request, response: Response| {
        ctx.router
            .authorize_connect(sid, request.uri().query())
            .map(|_| response)
            .map_err(|e| refusal(&e))
    };

    let handshake = accept_hdr_async_with_config(stream, callback, Some(ws_config));
    let ws_stream = match timeout(ctx.idle_timeout, handshake).await {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            // The callback may have authorized `sid` before the upgrade failed.
            ctx.router.registry().clear(sid);
            return Err(e).with_context(|| format!("WebSocket handshake with {peer_addr} failed"));
        }
        Err(_) => {
            ctx.router.registry().clear(sid);
            anyhow::bail!(
                "WebSocket handshake with {peer_addr} not completed within {:?}",
                ctx.idle_timeout
            );
        }
    };

    info!("session {sid} established with {peer_addr}");

    // ── Step 2: read loop ─────────────────────────────────────────────────────
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut changes = ctx.router.registry().subscribe();

    let mut ticker = interval(ctx.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // The first tick resolves immediately.

    let mut last_seen = Instant::now();

    let end = loop {
        // Covers a takeover that happened before we subscribed as well.
        if *changes.borrow_and_update() != Some(sid) {
            info!("session {sid} superseded by a newer connection");
            break SessionEnd::Superseded;
        }

        tokio::select! {
            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                        break SessionEnd::PeerClosed;
                    }
                    Some(Err(e)) => {
                        warn!("session {sid}: WebSocket error: {e}");
                        break SessionEnd::TransportError;
                    }
                };
                last_seen = Instant::now();

                match msg {
                    WsMessage::Text(text) => {
                        match route(&ctx, sid, text).await {
                            RouteOutcome::Reply(reply) => {
                                let json = match reply.to_json() {
                                    Ok(json) => json,
                                    Err(e) => {
                                        error!("session {sid}: could not encode {}: {e}", reply.event_name());
                                        continue;
                                    }
                                };
                                if let Err(e) = ws_tx.send(WsMessage::Text(json)).await {
                                    debug!("session {sid}: reply failed: {e}");
                                    break SessionEnd::TransportError;
                                }
                            }
                            RouteOutcome::Closed => break SessionEnd::ClientDisconnect,
                            RouteOutcome::Delivered | RouteOutcome::Dropped(_) => {}
                        }
                    }
                    WsMessage::Binary(data) => {
                        warn!("session {sid}: unexpected binary frame ({} bytes, ignored)", data.len());
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                    WsMessage::Close(_) => break SessionEnd::PeerClosed,
                }
            }

            _ = ticker.tick() => {
                if last_seen.elapsed() >= ctx.idle_timeout {
                    info!("session {sid} idle for {:?}; closing", ctx.idle_timeout);
                    break SessionEnd::Idle;
                }
                if let Err(e) = ws_tx.send(WsMessage::Ping(Vec::new())).await {
                    debug!("session {sid}: ping failed: {e}");
                    break SessionEnd::TransportError;
                }
            }

            changed = changes.changed() => {
                if changed.is_err() {
                    // Registry dropped: the server is going away.
                    break SessionEnd::PeerClosed;
                }
                // Re-checked at the top of the loop.
            }
        }
    };

    // ── Step 3: teardown ──────────────────────────────────────────────────────
    if let Some(frame) = end.close_frame() {
        match ws_tx.send(WsMessage::Close(Some(frame))).await {
            // Keep the socket open until the phone answers, so it reads the
            // reason instead of a reset.
            Ok(()) => {
                if timeout(CLOSE_HANDSHAKE_TIMEOUT, await_close_reply(&mut ws_rx))
                    .await
                    .is_err()
                {
                    debug!("session {sid}: no close reply within {CLOSE_HANDSHAKE_TIMEOUT:?}");
                }
            }
            Err(e) => debug!("session {sid}: close frame not sent: {e}"),
        }
    }
    let _ = ws_tx.close().await;

    ctx.router.dispatch(InboundFrame::disconnect(sid));
    Ok(end)
}

/// Reads and discards frames until the peer's Close reply or the end of the stream.
async fn await_close_reply<S>(ws_rx: &mut S)
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Dispatches one text frame on the blocking pool and waits for the outcome.
async fn route(ctx: &Arc<SessionContext>, sid: SessionId, text: String) -> RouteOutcome {
    let ctx = Arc::clone(ctx);
    match tokio::task::spawn_blocking(move || ctx.router.dispatch_text(sid, &text)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // A panicking callback loses its frame, not the session.
            error!("session {sid}: frame handler panicked: {e}");
            RouteOutcome::Delivered
        }
    }
}

/// Builds the HTTP response that refuses a handshake.
fn refusal(err: &AuthorizationError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────
