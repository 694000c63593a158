//! TOML configuration file for the desktop receiver.
//!
//! The file lives in the platform-appropriate directory:
//! - Windows:  `%APPDATA%\LanPush\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/lanpush/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/LanPush/config.toml`
//!
//! `lanpush serve --config <path>` reads another file instead.  A missing
//! file is not an error: every field has a serde default, so first runs
//! work with no file at all.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 5000
//! name = "Study PC"
//! token_digits = 6
//!
//! [transfer]
//! download_dir = "/home/me/Downloads/lanpush"
//! max_file_bytes = 52428800
//!
//! [transport]
//! max_frame_bytes = 75497472
//! ping_interval_secs = 25
//! idle_timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lanpush_core::domain::credential::DEFAULT_TOKEN_DIGITS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    ServerConfig, DEFAULT_DISPLAY_NAME, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_PORT,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `server.bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub transfer: TransferSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listener and pairing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind to.  `"0.0.0.0"` accepts LAN connections.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// WebSocket listener port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Desktop name shown on the phone.
    #[serde(default = "default_name")]
    pub name: String,
    /// Width of the pairing token (4..=12).
    #[serde(default = "default_token_digits")]
    pub token_digits: u32,
}

/// Received-file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferSection {
    /// Directory received files are written into.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Largest decoded file accepted, in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

/// WebSocket limits and liveness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSection {
    /// Largest single WebSocket message, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"lanpush_server=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}
fn default_token_digits() -> u32 {
    DEFAULT_TOKEN_DIGITS
}
fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_max_file_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_ping_interval_secs() -> u64 {
    25
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            name: default_name(),
            token_digits: default_token_digits(),
        }
    }
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            ping_interval_secs: default_ping_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Converts the file settings into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `server.bind_address`
    /// is not an IP address.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;

        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            display_name: self.server.name.clone(),
            token_digits: self.server.token_digits,
            download_dir: self.transfer.download_dir.clone(),
            max_file_bytes: self.transfer.max_file_bytes,
            max_frame_bytes: self.transport.max_frame_bytes,
            ping_interval: Duration::from_secs(self.transport.ping_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(self.transport.idle_timeout_secs.max(1)),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the platform config file, or defaults if it does not exist (or no
/// platform directory can be determined).
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<FileConfig, ConfigError> {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(ConfigError::NoPlatformConfigDir) => Ok(FileConfig::default()),
        Err(e) => Err(e),
    }
}

/// Loads `path`, returning [`FileConfig::default()`] if it does not exist.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory, including the `LanPush` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LanPush"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lanpush"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("LanPush"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
