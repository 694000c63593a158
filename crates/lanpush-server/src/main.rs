//! LanPush desktop receiver: entry point.
//!
//! `lanpush serve` prints a pairing payload (the text a QR code would carry),
//! waits for a phone to connect with the token, and prints every pushed
//! message and received file.  `lanpush send` is a push client that plays
//! the phone's role from another terminal or machine.
//!
//! # Usage
//!
//! ```text
//! lanpush serve [--config <PATH>] [--port <PORT>] [--bind <IP>] [--name <NAME>]
//!               [--download-dir <DIR>] [--token-digits <N>]
//!
//! lanpush send --pairing '<payload json>' text "hello"
//! lanpush send --host 192.168.1.20 --token 482913 clipboard "copied text"
//! lanpush send --pairing '<payload json>' file ./photo.jpg --type image/jpeg
//! ```
//!
//! # Environment variable overrides
//!
//! Settings are merged as CLI flag > environment variable > config file >
//! built-in default.
//!
//! | Variable                 | Description                          |
//! |--------------------------|--------------------------------------|
//! | `LANPUSH_CONFIG`         | Config file path                     |
//! | `LANPUSH_PORT`           | Listener port                        |
//! | `LANPUSH_BIND`           | Listener IP address                  |
//! | `LANPUSH_NAME`           | Desktop name shown on the phone      |
//! | `LANPUSH_DOWNLOAD_DIR`   | Where received files are written     |
//! | `LANPUSH_TOKEN_DIGITS`   | Pairing token width (4..=12)         |
//! | `LANPUSH_PAIRING`        | Payload used by `lanpush send`       |
//! | `RUST_LOG`               | `tracing` filter (overrides config)  |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use lanpush_core::{AuthToken, PairingCredential};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lanpush_server::application::{CallbackBus, ChannelEvent};
use lanpush_server::domain::config::{DEFAULT_DISPLAY_NAME, DEFAULT_PORT};
use lanpush_server::domain::ServerConfig;
use lanpush_server::infrastructure::client::PushClient;
use lanpush_server::infrastructure::server::PairingServer;
use lanpush_server::infrastructure::storage::config::{load_config, load_config_from, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LanPush: receive text, clipboard content, and files from a paired phone.
#[derive(Debug, Parser)]
#[command(name = "lanpush", about = "Push text and files from a phone to this desktop over the LAN", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the desktop receiver.
    Serve(ServeArgs),
    /// Push a payload to a running receiver.
    Send(SendArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Config file to read instead of the platform default.
    #[arg(long, env = "LANPUSH_CONFIG")]
    config: Option<PathBuf>,

    /// Listener port.  `0` picks a free port.
    #[arg(long, env = "LANPUSH_PORT")]
    port: Option<u16>,

    /// IP address to bind to.  `0.0.0.0` accepts LAN connections.
    #[arg(long, env = "LANPUSH_BIND")]
    bind: Option<String>,

    /// Desktop name shown on the phone after scanning.
    #[arg(long, env = "LANPUSH_NAME")]
    name: Option<String>,

    /// Directory received files are written into.
    #[arg(long, env = "LANPUSH_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Width of the pairing token.
    #[arg(long, env = "LANPUSH_TOKEN_DIGITS", value_parser = clap::value_parser!(u32).range(4..=12))]
    token_digits: Option<u32>,
}

impl ServeArgs {
    /// Merges these flags over the config file into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address (from either source) is not an
    /// IP address.
    fn into_server_config(self, file: &FileConfig) -> anyhow::Result<ServerConfig> {
        let mut config = file
            .to_server_config()
            .context("invalid [server] section in config file")?;

        if let Some(bind) = self.bind {
            let ip: IpAddr = bind
                .trim()
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(name) = self.name {
            config.display_name = name;
        }
        if let Some(dir) = self.download_dir {
            config.download_dir = dir;
        }
        if let Some(digits) = self.token_digits {
            config.token_digits = digits;
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Pairing payload as shown by `lanpush serve`.
    #[arg(long, env = "LANPUSH_PAIRING", conflicts_with_all = ["host", "token"])]
    pairing: Option<String>,

    /// Receiver IPv4 address (instead of --pairing).
    #[arg(long, requires = "token")]
    host: Option<Ipv4Addr>,

    /// Receiver port, used with --host.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pairing token, used with --host.
    #[arg(long)]
    token: Option<String>,

    /// Seconds to wait for a file acknowledgment.
    #[arg(long, default_value_t = 30)]
    ack_timeout: u64,

    #[command(subcommand)]
    payload: Payload,
}

#[derive(Debug, Subcommand)]
enum Payload {
    /// Send a text message.
    Text { text: String },
    /// Send text for the desktop clipboard.
    Clipboard { text: String },
    /// Send a file.
    File {
        path: PathBuf,
        /// MIME type to declare (default application/octet-stream).
        #[arg(long = "type")]
        mime_type: Option<String>,
    },
}

impl SendArgs {
    /// Resolves the credential from `--pairing` or `--host/--port/--token`.
    fn credential(&self) -> anyhow::Result<PairingCredential> {
        if let Some(payload) = &self.pairing {
            return PairingCredential::from_payload(payload).context("invalid pairing payload");
        }
        match (self.host, &self.token) {
            (Some(ip), Some(token)) => Ok(PairingCredential {
                token: AuthToken::new(token.trim()),
                ip,
                port: self.port,
                name: DEFAULT_DISPLAY_NAME.to_string(),
            }),
            _ => bail!("either --pairing or --host with --token is required"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Send(args) => send(args).await,
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback` (the config file's
/// `[logging] level`) is used.
fn init_tracing(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let file = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .context("failed to load configuration")?;

    init_tracing(&file.logging.level);
    let config = args.into_server_config(&file)?;

    // Console presentation layer: print everything the phone pushes.
    let bus = Arc::new(CallbackBus::new());
    bus.register("message", |event| {
        if let ChannelEvent::Message { kind, content } = event {
            match content.as_str() {
                Some(text) => println!("[{kind}] {text}"),
                None => println!("[{kind}] {content}"),
            }
        }
    })?;
    bus.register("file", |event| {
        if let ChannelEvent::File(stored) = event {
            println!(
                "[file] {} ({}, {} bytes)",
                stored.filename, stored.filetype, stored.byte_length
            );
        }
    })?;

    info!(
        "LanPush receiver starting: bind={}, downloads={}",
        config.bind_addr,
        config.download_dir.display()
    );

    let handle = PairingServer::new(config, bus).start().await?;
    let credential = handle.credential();
    let payload = credential
        .to_payload()
        .context("failed to encode pairing payload")?;

    println!("Scan or paste this pairing payload on the phone:");
    println!("{payload}");
    println!("Token: {}   Address: {}", credential.token.as_str(), credential.socket_addr());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, initiating graceful shutdown");

    handle.shutdown().await
}

async fn send(args: SendArgs) -> anyhow::Result<()> {
    init_tracing("warn");
    let credential = args.credential()?;
    let target = SocketAddr::from((credential.ip, credential.port));

    let mut client = PushClient::connect(&credential)
        .await
        .with_context(|| format!("failed to connect to {target}"))?
        .with_ack_timeout(Duration::from_secs(args.ack_timeout));

    match &args.payload {
        Payload::Text { text } => client.send_text(text).await?,
        Payload::Clipboard { text } => client.send_clipboard(text).await?,
        Payload::File { path, mime_type } => {
            let stored = client
                .send_file(path, mime_type.as_deref())
                .await
                .with_context(|| format!("failed to send {}", path.display()))?;
            println!("{target} stored {stored}");
        }
    }

    client.close().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
