//! Mullvad
//!
//! Mullvad publishes its relays with the WireGuard public key as a plain
//! field. There is no endpoint that hands out a private key: users generate
//! one and register its public half with their account, so the key is
//! supplied up front.

use crate::error::{FetchError, ProviderError};
use crate::fetch::get_json;
use crate::server::Server;
use confgen_net::{CancellationToken, GetRequest, HttpClient};
use confgen_wireguard::{DEFAULT_PORT, Endpoint, KeyMaterial};
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// WireGuard relay list
pub const DEFAULT_SERVER_LIST_URL: &str = "https://api.mullvad.net/www/relays/wireguard/";

/// A private key supplied by the user
#[derive(Clone)]
pub struct StaticKey {
    key: KeyMaterial,
    public_key: KeyMaterial,
}

impl StaticKey {
    /// Accepts only a well-formed 32-byte base64 key
    pub fn new(key: impl Into<KeyMaterial>) -> Result<Self, ProviderError> {
        let key = key.into();
        let public_key = key.public_key().map_err(|e| ProviderError::InvalidSetting {
            setting: "mullvad private key",
            reason: e.to_string(),
        })?;

        Ok(Self { key, public_key })
    }

    /// The public key to register with Mullvad
    pub fn public_key(&self) -> &KeyMaterial {
        &self.public_key
    }

    /// Returns the key; no I/O
    pub async fn fetch(&self) -> Result<KeyMaterial, FetchError> {
        Ok(self.key.clone())
    }
}

impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKey")
            .field("public_key", &self.public_key.as_str())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RawRelay {
    hostname: Option<String>,
    ipv4_addr_in: Option<String>,
    ipv6_addr_in: Option<String>,
    pubkey: Option<String>,
}

impl RawRelay {
    fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or_default()
    }

    fn ipv4(&self) -> &str {
        self.ipv4_addr_in.as_deref().unwrap_or_default()
    }

    fn ipv6(&self) -> &str {
        self.ipv6_addr_in.as_deref().unwrap_or_default()
    }

    fn pubkey(&self) -> &str {
        self.pubkey.as_deref().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), String> {
        if self.ipv4().is_empty() && self.ipv6().is_empty() {
            return Err("ipv4_addr_in or ipv6_addr_in is required".to_string());
        }
        Ok(())
    }

    fn parse_addr(&self, field: &str, value: &str) -> Result<Option<IpAddr>, FetchError> {
        if value.is_empty() {
            return Ok(None);
        }
        value.parse().map(Some).map_err(|_| {
            FetchError::Decode(format!(
                "relay {:?}: {field} {value:?} is not a valid IP address",
                self.hostname()
            ))
        })
    }

    /// IPv4 endpoint, or IPv6 for relays without one
    fn to_server(&self) -> Result<Server, FetchError> {
        let v4 = self.parse_addr("ipv4_addr_in", self.ipv4())?;
        let v6 = self.parse_addr("ipv6_addr_in", self.ipv6())?;

        let addr = v4.or(v6).ok_or_else(|| {
            FetchError::Decode(format!("relay {:?} has no address", self.hostname()))
        })?;

        Ok(Server::new(
            KeyMaterial::new(self.pubkey()),
            Endpoint::new(addr, DEFAULT_PORT),
        ))
    }
}

/// Lists Mullvad WireGuard relays
#[derive(Debug)]
pub struct ServerListFetcher {
    client: Arc<HttpClient>,
    url: String,
}

impl ServerListFetcher {
    pub fn new(client: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch, validate, filter and map the relay list
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Server>, FetchError> {
        let request = GetRequest::new(&self.url)?.json();

        debug!("Fetching Mullvad relay list from {}", request.url());

        let raw: Vec<RawRelay> = get_json(&self.client, request, cancel).await?;

        for (i, relay) in raw.iter().enumerate() {
            relay
                .validate()
                .map_err(|reason| FetchError::Validation(format!("relay {i}: {reason}")))?;
        }

        let servers = raw
            .iter()
            .filter(|relay| !relay.pubkey().is_empty())
            .map(RawRelay::to_server)
            .collect::<Result<Vec<_>, _>>()?;

        info!("Mullvad returned {} relays, {} with a WireGuard key", raw.len(), servers.len());

        Ok(servers)
    }
}
