//! PushClient: the phone side of the protocol.
//!
//! Used by `lanpush send` and by the end-to-end tests.  It speaks exactly
//! what the mobile app speaks: connect with `?token=...`, then push `message`
//! and `file` frames.
//!
//! ```no_run
//! # async fn demo() -> Result<(), lanpush_server::infrastructure::client::ClientError> {
//! use lanpush_core::PairingCredential;
//! use lanpush_server::infrastructure::client::PushClient;
//!
//! let cred = PairingCredential::from_payload(
//!     r#"{"ip":"192.168.1.20","port":5000,"authToken":"482913","name":"Desktop"}"#,
//! ).expect("valid payload");
//! let mut client = PushClient::connect(&cred).await?;
//! client.send_text("hello from the CLI").await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lanpush_core::protocol::envelope::{KIND_CLIPBOARD, KIND_TEXT};
use lanpush_core::{
    EventName, FilePayload, MessageEnvelope, OutboundFrame, PairingCredential, WireFrame,
    DEFAULT_MIME_TYPE,
};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        error::ProtocolError, http::StatusCode, Error as WsError, Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

/// How long [`PushClient::send_file`] waits for the `file-ack` by default.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by [`PushClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The desktop answered the handshake with 401.
    #[error("the desktop refused the pairing token")]
    Refused,

    /// The connection could not be opened.
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The path has no final component to use as the filename.
    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    /// A frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The socket failed after it was opened.
    #[error("WebSocket error: {0}")]
    Transport(#[from] WsError),

    /// The desktop closed the session; carries the close reason, if any.
    #[error("the desktop closed the session ({})", .0.as_deref().unwrap_or("no reason"))]
    Closed(Option<String>),

    /// No `file-ack` arrived in time.
    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),
}

/// A connected push client.
pub struct PushClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ack_timeout: Duration,
}

impl PushClient {
    /// Opens a session using a scanned credential.
    ///
    /// # Errors
    ///
    /// [`ClientError::Refused`] if the token is wrong, otherwise
    /// [`ClientError::Connect`].
    pub async fn connect(credential: &PairingCredential) -> Result<Self, ClientError> {
        Self::connect_url(&credential.connect_url()).await
    }

    /// Opens a session at `url` (`ws://host:port/?token=...`).
    ///
    /// # Errors
    ///
    /// Same as [`PushClient::connect`].
    pub async fn connect_url(url: &str) -> Result<Self, ClientError> {
        match connect_async(url).await {
            Ok((ws, _response)) => {
                debug!("connected to {url}");
                Ok(Self {
                    ws,
                    ack_timeout: DEFAULT_ACK_TIMEOUT,
                })
            }
            Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                Err(ClientError::Refused)
            }
            Err(source) => Err(ClientError::Connect {
                url: url.to_string(),
                source,
            }),
        }
    }

    /// Sets how long [`PushClient::send_file`] waits for the acknowledgment.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Sends a plain text message.
    pub async fn send_text(&mut self, text: &str) -> Result<(), ClientError> {
        self.send_message(KIND_TEXT, Value::from(text)).await
    }

    /// Sends text the desktop should treat as clipboard content.
    pub async fn send_clipboard(&mut self, text: &str) -> Result<(), ClientError> {
        self.send_message(KIND_CLIPBOARD, Value::from(text)).await
    }

    /// Sends a `message` frame of any kind.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] if the socket is gone.
    pub async fn send_message(&mut self, kind: &str, content: Value) -> Result<(), ClientError> {
        let envelope = MessageEnvelope::new(kind, content);
        self.send_frame(&WireFrame::new(EventName::Message.as_str(), envelope.to_body()))
            .await
    }

    /// Reads `path` and sends it as a `file` frame, waiting for the
    /// acknowledgment.
    ///
    /// Returns the filename the desktop stored it under.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ReadFile`] / [`ClientError::NoFileName`] for local problems.
    /// - [`ClientError::AckTimeout`] if the desktop never acknowledges (for
    ///   example because it rejected the filename or could not write it).
    /// - [`ClientError::Closed`] if the session ends first.
    pub async fn send_file(
        &mut self,
        path: &Path,
        mime_type: Option<&str>,
    ) -> Result<String, ClientError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::NoFileName(path.to_path_buf()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        self.send_file_bytes(&name, mime_type.unwrap_or(DEFAULT_MIME_TYPE), &bytes)
            .await
    }

    /// Sends in-memory bytes as a `file` frame and waits for the acknowledgment.
    ///
    /// # Errors
    ///
    /// Same as [`PushClient::send_file`], minus the local read errors.
    pub async fn send_file_bytes(
        &mut self,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String, ClientError> {
        let payload = FilePayload::from_bytes(name, mime_type, bytes);
        self.send_frame(&WireFrame::new(EventName::File.as_str(), payload.to_body()))
            .await?;

        match timeout(self.ack_timeout, self.next_ack()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::AckTimeout(self.ack_timeout)),
        }
    }

    /// Sends a raw frame.  Exposed for tests that need malformed input.
    pub async fn send_frame(&mut self, frame: &WireFrame) -> Result<(), ClientError> {
        self.ws.send(WsMessage::Text(frame.to_json()?)).await?;
        Ok(())
    }

    /// Waits until the desktop closes the session, returning its close reason.
    ///
    /// Frames other than Close are discarded.  A socket torn down without a
    /// Close frame counts as closed with no reason.
    pub async fn wait_closed(&mut self) -> Result<Option<String>, ClientError> {
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(WsMessage::Close(frame)) => return Ok(frame.map(|f| f.reason.into_owned())),
                Ok(_) => {}
                Err(e) if peer_gone(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Asks the desktop to end the session and closes the socket.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.send_frame(&WireFrame::new(EventName::Disconnect.as_str(), Value::Null))
            .await?;
        match self.ws.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn next_ack(&mut self) -> Result<String, ClientError> {
        while let Some(msg) = self.ws.next().await {
            match msg? {
                WsMessage::Text(text) => match serde_json::from_str::<OutboundFrame>(&text) {
                    Ok(OutboundFrame::FileAck { filename, .. }) => return Ok(filename),
                    Err(e) => debug!("ignoring unexpected frame: {e}"),
                },
                WsMessage::Close(frame) => {
                    return Err(ClientError::Closed(frame.map(|f| f.reason.into_owned())))
                }
                _ => {}
            }
        }
        Err(ClientError::Closed(None))
    }
}

/// Returns `true` for errors that only mean the desktop has already hung up.
fn peer_gone(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_after_close_counts_as_closed() {
        let err = WsError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(peer_gone(&err));
    }

    #[test]
    fn test_reset_without_close_counts_as_closed() {
        assert!(peer_gone(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(peer_gone(&WsError::ConnectionClosed));
    }

    #[test]
    fn test_other_errors_are_reported() {
        let err = WsError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!peer_gone(&err));
        assert!(!peer_gone(&WsError::Utf8));
    }
}
