//! PairingServer: wires the layers together and manages the listener task.
//!
//! # Lifecycle
//!
//! ```text
//! PairingServer::new()   token + LAN address generated (credential fixed)
//!        │
//!        ▼ start()
//! ServerHandle           listener bound, accept loop running on a tokio task
//!        │
//!        ▼ stop() / shutdown().await
//! stopped                accept loop exits within ~200 ms, sessions aborted
//! ```
//!
//! The credential is generated once, at construction.  Restarting the
//! process yields a new token; the phone must scan again.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use lanpush_core::PairingCredential;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::{
    AddressProbe, CallbackBus, CredentialGenerator, EventRouter, FileIngestor, FileStore,
    SessionRegistry,
};
use crate::domain::{ServerConfig, SessionId};
use crate::infrastructure::network::lan_address::UdpRouteProbe;
use crate::infrastructure::storage::disk::DiskFileStore;
use crate::infrastructure::ws_server::{run_server, SessionContext};

/// A configured, not yet listening, pairing server.
pub struct PairingServer {
    config: ServerConfig,
    credential: PairingCredential,
    bus: Arc<CallbackBus>,
    store: Arc<dyn FileStore>,
}

impl PairingServer {
    /// Creates a server that writes into `config.download_dir` and discovers
    /// its LAN address through the routing table (unless `config.bind_addr`
    /// names a specific IPv4 address, which is then advertised as is).
    pub fn new(config: ServerConfig, bus: Arc<CallbackBus>) -> Self {
        let store = Arc::new(DiskFileStore::new(config.download_dir.clone()));
        Self::with_parts(config, bus, Arc::new(UdpRouteProbe::default()), store)
    }

    /// Creates a server with explicit address probe and file store.
    pub fn with_parts(
        config: ServerConfig,
        bus: Arc<CallbackBus>,
        probe: Arc<dyn AddressProbe>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        let generator = CredentialGenerator::new(probe, config.token_digits);
        let credential = generator.generate_for(config.bind_addr, config.display_name.clone());
        Self {
            config,
            credential,
            bus,
            store,
        }
    }

    /// Returns the credential to show the user.
    ///
    /// Before [`PairingServer::start`] the port is the configured one; with
    /// port `0` use [`ServerHandle::credential`] instead.
    pub fn credential(&self) -> &PairingCredential {
        &self.credential
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound (port in use,
    /// permission denied).
    pub async fn start(self) -> anyhow::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("failed to bind listener on {}", self.config.bind_addr))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound listener address")?;

        let mut credential = self.credential;
        credential.port = local_addr.port();

        let registry = Arc::new(SessionRegistry::new(credential.token.clone()));
        let ingestor = FileIngestor::new(self.store, self.config.max_file_bytes);
        let router = EventRouter::new(Arc::clone(&registry), ingestor, self.bus);
        let ctx = Arc::new(SessionContext::new(router, &self.config));

        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_server(listener, ctx, Arc::clone(&running)));

        info!(
            "pairing server listening on {local_addr} (advertised as {})",
            credential.socket_addr()
        );

        Ok(ServerHandle {
            local_addr,
            credential,
            registry,
            running,
            task,
        })
    }
}

/// A running pairing server.
///
/// Dropping the handle does not stop the server; call [`ServerHandle::stop`]
/// or [`ServerHandle::shutdown`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    credential: PairingCredential,
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl ServerHandle {
    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the pairing credential, with the actually bound port.
    pub fn credential(&self) -> &PairingCredential {
        &self.credential
    }

    /// Returns the currently authorized session, if any.
    pub fn current_session(&self) -> Option<SessionId> {
        self.registry.current()
    }

    /// Signals the accept loop to stop without waiting for it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Stops the server and waits for the accept loop to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop task panicked or failed.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.stop();
        self.task.await.context("accept loop task panicked")??;
        info!("pairing server stopped");
        Ok(())
    }
}
