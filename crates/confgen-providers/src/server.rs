//! Provider-neutral server record

use confgen_wireguard::{Endpoint, KeyMaterial};

/// A WireGuard server: its public key and where to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub public_key: KeyMaterial,
    pub endpoint: Endpoint,
}

impl Server {
    pub fn new(public_key: KeyMaterial, endpoint: Endpoint) -> Self {
        Self {
            public_key,
            endpoint,
        }
    }
}
