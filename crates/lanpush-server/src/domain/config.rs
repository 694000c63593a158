//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built from (lowest to highest precedence) these defaults, the TOML
//! config file, `LANPUSH_*` environment variables, and CLI flags.  The
//! infrastructure layer does the merging; this struct only holds the result.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use lanpush_core::domain::credential::DEFAULT_TOKEN_DIGITS;

/// Default WebSocket listener port.
pub const DEFAULT_PORT: u16 = 5000;
/// Default name shown on the phone after scanning.
pub const DEFAULT_DISPLAY_NAME: &str = "Desktop";
/// Largest decoded file accepted by default (50 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 50 * 1024 * 1024;
/// Largest WebSocket message accepted by default.
///
/// Base64 inflates content by 4/3, so this leaves room for a maximum-size
/// file plus its JSON framing.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 72 * 1024 * 1024;

/// All runtime configuration for the pairing server.
///
/// Build once at startup and share behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use lanpush_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 5000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// `0.0.0.0` accepts connections from the LAN.  Port `0` asks the OS for
    /// a free port; the bound port is then reported by the server handle.
    pub bind_addr: SocketAddr,

    /// Desktop name embedded in the pairing payload.
    pub display_name: String,

    /// Width of the generated pairing token.
    pub token_digits: u32,

    /// Directory received files are written into.
    pub download_dir: PathBuf,

    /// Largest decoded file accepted, in bytes.
    pub max_file_bytes: usize,

    /// Largest single WebSocket message accepted, in bytes.
    pub max_frame_bytes: usize,

    /// How often the server pings an idle phone.
    pub ping_interval: Duration,

    /// A session with no inbound traffic for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    /// | Field           | Default             |
    /// |-----------------|---------------------|
    /// | bind_addr       | `0.0.0.0:5000`      |
    /// | display_name    | `Desktop`           |
    /// | token_digits    | 6                   |
    /// | download_dir    | `.`                 |
    /// | max_file_bytes  | 50 MiB              |
    /// | max_frame_bytes | 72 MiB              |
    /// | ping_interval   | 25 seconds          |
    /// | idle_timeout    | 300 seconds         |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            token_digits: DEFAULT_TOKEN_DIGITS,
            download_dir: PathBuf::from("."),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            ping_interval: Duration::from_secs(25),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
