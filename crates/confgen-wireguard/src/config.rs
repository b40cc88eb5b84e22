//! WireGuard Configuration
//!
//! Provides configuration structures for the local interface and its peers.

use crate::keys::KeyMaterial;
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Network endpoint (IP + port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// IP address
    pub addr: IpAddr,
    /// UDP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Convert to SocketAddr
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(Self::from)
    }
}

impl std::fmt::Display for Endpoint {
    /// `addr:port`, with IPv6 addresses bracketed
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_socket_addr())
    }
}

/// WireGuard peer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Peer's public key
    pub public_key: KeyMaterial,
    /// Peer's endpoint, `None` when unknown
    pub endpoint: Option<Endpoint>,
    /// Allowed IPs (what traffic to route through this peer)
    pub allowed_ips: Arc<[IpNet]>,
    /// Persistent keepalive interval in seconds, 0 disables it
    pub persistent_keepalive: u16,
}

impl PeerConfig {
    /// Create a new peer configuration
    pub fn new(
        public_key: KeyMaterial,
        endpoint: Option<Endpoint>,
        allowed_ips: Arc<[IpNet]>,
        persistent_keepalive: u16,
    ) -> Self {
        Self {
            public_key,
            endpoint,
            allowed_ips,
            persistent_keepalive,
        }
    }
}

/// Complete WireGuard configuration for one tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Our private key
    pub private_key: KeyMaterial,
    /// Addresses assigned to the local interface
    pub interface_addresses: Arc<[IpNet]>,
    /// DNS servers to use inside the tunnel
    pub dns: Arc<[IpAddr]>,
    /// Remote peers, in output order
    pub peers: Vec<PeerConfig>,
}

impl Configuration {
    /// Create a new configuration
    pub fn new(
        private_key: KeyMaterial,
        interface_addresses: Arc<[IpNet]>,
        dns: Arc<[IpAddr]>,
        peers: Vec<PeerConfig>,
    ) -> Self {
        Self {
            private_key,
            interface_addresses,
            dns,
            peers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_endpoint_display() {
        let v4 = Endpoint::new(IpAddr::V4(Ipv4Addr::new(62, 3, 36, 228)), 51820);
        assert_eq!(v4.to_string(), "62.3.36.228:51820");

        let v6 = Endpoint::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 51820);
        assert_eq!(v6.to_string(), "[::1]:51820");
    }

    #[test]
    fn test_endpoint_parse() {
        let ep: Endpoint = "[2a03:1b20::1]:51820".parse().unwrap();
        assert_eq!(ep.port, 51820);
        assert!(ep.addr.is_ipv6());

        assert!("62.3.36.228".parse::<Endpoint>().is_err());
    }
}
