//! Outbound LAN address discovery.
//!
//! # How it works (for beginners)
//!
//! `connect` on a UDP socket sends nothing.  It only asks the OS routing
//! table which local interface would carry traffic to the target, and binds
//! the socket to that interface's address.  Reading `local_addr()` afterwards
//! yields the address the phone should use, without any datagram leaving the
//! machine.
//!
//! On a host with no route (airplane mode, no default gateway) `connect`
//! fails and the caller falls back to loopback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::application::AddressProbe;

/// Well-known external address used only to select a route.
pub const DEFAULT_ROUTE_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// [`AddressProbe`] backed by a connected (but never used) UDP socket.
#[derive(Debug, Clone, Copy)]
pub struct UdpRouteProbe {
    target: SocketAddr,
}

impl UdpRouteProbe {
    /// Creates a probe routing toward `target`.
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Default for UdpRouteProbe {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_TARGET)
    }
}

impl AddressProbe for UdpRouteProbe {
    fn outbound_ipv4(&self) -> Option<Ipv4Addr> {
        outbound_ipv4_toward(self.target)
    }
}

/// Returns the local IPv4 address the OS would use to reach `target`.
///
/// Returns `None` if there is no route or the chosen address is not IPv4.
pub fn outbound_ipv4_toward(target: SocketAddr) -> Option<Ipv4Addr> {
    let socket = match UdpSocket::bind(("0.0.0.0", 0)) {
        Ok(socket) => socket,
        Err(e) => {
            debug!("could not bind probe socket: {e}");
            return None;
        }
    };
    if let Err(e) = socket.connect(target) {
        debug!("no route toward {target}: {e}");
        return None;
    }
    match socket.local_addr() {
        Ok(SocketAddr::V4(addr)) => Some(*addr.ip()),
        Ok(other) => {
            debug!("probe chose a non-IPv4 address {other}");
            None
        }
        Err(e) => {
            debug!("could not read probe address: {e}");
            None
        }
    }
}
