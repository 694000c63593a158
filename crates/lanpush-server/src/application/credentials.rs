//! CredentialGenerator: the token and address shown in the pairing QR code.
//!
//! Runs once when the server is constructed.  The LAN address comes from an
//! [`AddressProbe`]; the UDP-route probe lives in
//! `infrastructure::network::lan_address`.  Discovery never fails: anything
//! that is not a usable IPv4 address degrades to `127.0.0.1`.
//!
//! A listener bound to one specific IPv4 address is only reachable there, so
//! that address is advertised instead of the probed one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use lanpush_core::{AuthToken, PairingCredential};
use tracing::{debug, warn};

/// Finds the address other machines on the LAN can reach this host at.
pub trait AddressProbe: Send + Sync {
    /// Returns the outbound IPv4 address, or `None` if there is no route.
    fn outbound_ipv4(&self) -> Option<Ipv4Addr>;
}

/// Produces pairing credentials.
pub struct CredentialGenerator {
    probe: Arc<dyn AddressProbe>,
    token_digits: u32,
}

impl CredentialGenerator {
    /// Creates a generator drawing `token_digits`-wide tokens.
    pub fn new(probe: Arc<dyn AddressProbe>, token_digits: u32) -> Self {
        Self {
            probe,
            token_digits,
        }
    }

    /// Draws a fresh token and discovers the LAN address.
    ///
    /// Each call draws an independent token.
    pub fn generate(&self, port: u16, name: impl Into<String>) -> PairingCredential {
        self.generate_for(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), name)
    }

    /// Draws a fresh token for a listener bound to `bind_addr`.
    pub fn generate_for(&self, bind_addr: SocketAddr, name: impl Into<String>) -> PairingCredential {
        let ip = self.advertised_address(bind_addr.ip());
        debug!("pairing address is {ip}:{}", bind_addr.port());
        PairingCredential {
            token: AuthToken::generate(self.token_digits),
            ip,
            port: bind_addr.port(),
            name: name.into(),
        }
    }

    /// Returns `bind_ip` when it is a specific IPv4 address, otherwise the
    /// probed LAN address.
    pub fn advertised_address(&self, bind_ip: IpAddr) -> Ipv4Addr {
        match bind_ip {
            IpAddr::V4(ip) if !ip.is_unspecified() => ip,
            _ => self.lan_address(),
        }
    }

    /// Returns the probed address, or loopback if it is unusable.
    pub fn lan_address(&self) -> Ipv4Addr {
        match self.probe.outbound_ipv4() {
            Some(ip) if !ip.is_unspecified() => ip,
            _ => {
                warn!("no LAN route found; pairing on 127.0.0.1 (same machine only)");
                Ipv4Addr::LOCALHOST
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct FixedProbe(Option<Ipv4Addr>);

    impl AddressProbe for FixedProbe {
        fn outbound_ipv4(&self) -> Option<Ipv4Addr> {
            self.0
        }
    }

    fn generator(ip: Option<Ipv4Addr>) -> CredentialGenerator {
        CredentialGenerator::new(Arc::new(FixedProbe(ip)), 6)
    }

    #[test]
    fn test_generate_uses_probed_address() {
        let cred = generator(Some(Ipv4Addr::new(192, 168, 1, 20))).generate(5000, "Desk");
        assert_eq!(cred.ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(cred.port, 5000);
        assert_eq!(cred.name, "Desk");
    }

    #[test]
    fn test_no_route_falls_back_to_loopback() {
        assert_eq!(generator(None).lan_address(), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_unspecified_address_falls_back_to_loopback() {
        assert_eq!(
            generator(Some(Ipv4Addr::UNSPECIFIED)).lan_address(),
            Ipv4Addr::LOCALHOST
        );
    }

    #[test]
    fn test_specific_bind_address_is_advertised() {
        // Arrange: the probe finds a LAN address the listener is not bound to.
        let gen = generator(Some(Ipv4Addr::new(192, 168, 1, 20)));
        let bind = SocketAddr::from(([127, 0, 0, 1], 5000));

        // Act
        let cred = gen.generate_for(bind, "Desk");

        // Assert
        assert_eq!(cred.ip, Ipv4Addr::LOCALHOST);
        assert_eq!(cred.port, 5000);
    }

    #[test]
    fn test_wildcard_bind_advertises_probed_address() {
        let gen = generator(Some(Ipv4Addr::new(192, 168, 1, 20)));

        assert_eq!(
            gen.advertised_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            Ipv4Addr::new(192, 168, 1, 20)
        );
        assert_eq!(
            gen.advertised_address("::".parse().unwrap()),
            Ipv4Addr::new(192, 168, 1, 20)
        );
    }

    #[test]
    fn test_token_has_configured_width() {
        let gen = CredentialGenerator::new(Arc::new(FixedProbe(None)), 4);
        let token = gen.generate(5000, "Desk").token;
        assert_eq!(token.as_str().len(), 4);
        let value: u32 = token.as_str().parse().unwrap();
        assert!((1000..=9999).contains(&value));
    }

    #[test]
    fn test_consecutive_generators_draw_independent_tokens() {
        // Arrange: a 12-digit space makes an accidental collision negligible.
        let a = CredentialGenerator::new(Arc::new(FixedProbe(None)), 12);
        let b = CredentialGenerator::new(Arc::new(FixedProbe(None)), 12);

        // Act
        let tokens: Vec<String> = (0..4)
            .flat_map(|_| [a.generate(1, "x").token, b.generate(1, "x").token])
            .map(|t| t.as_str().to_string())
            .collect();

        // Assert
        let mut unique = tokens.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), tokens.len());
    }

    #[test]
    fn test_payload_is_minified_json_with_four_fields() {
        // Arrange
        let cred = generator(Some(Ipv4Addr::new(10, 0, 0, 5))).generate(5000, "Desktop");

        // Act
        let payload = cred.to_payload().unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();

        // Assert
        assert!(!payload.contains(' '));
        assert!(!payload.contains('\n'));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["ip"], "10.0.0.5");
        assert_eq!(obj["port"], 5000);
        assert_eq!(obj["authToken"], cred.token.as_str());
        assert_eq!(obj["name"], "Desktop");
    }
}
