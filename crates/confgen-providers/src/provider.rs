//! Provider selection
//!
//! Every provider offers the same two capabilities: a private key and a list
//! of servers. [`ProviderKind`] is the closed set of supported providers,
//! [`ProviderClient`] the matching set of configured fetchers.

use crate::error::{FetchError, ProviderError};
use crate::server::Server;
use crate::{mullvad, nordvpn};
use confgen_net::{CancellationToken, HttpClient};
use confgen_wireguard::KeyMaterial;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// The capability pair a provider must offer to generate configurations
pub trait Provider {
    /// Fetch the private key for the local interface
    fn fetch_key(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<KeyMaterial, FetchError>> + Send;

    /// Fetch the WireGuard-capable servers, in provider order
    fn list_servers(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Server>, FetchError>> + Send;
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    NordVpn,
    Mullvad,
}

impl ProviderKind {
    /// Get all supported providers
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::NordVpn, ProviderKind::Mullvad]
    }

    /// Slug used on the command line and in output file names
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderKind::NordVpn => "nordvpn",
            ProviderKind::Mullvad => "mullvad",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nordvpn" => Ok(ProviderKind::NordVpn),
            "mullvad" => Ok(ProviderKind::Mullvad),
            _ => Err(ProviderError::Unknown(s.to_string())),
        }
    }
}

/// Endpoints and credentials for every provider
///
/// Only the fields of the selected provider are consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub nord_server_list_url: String,
    pub nord_credentials_url: String,
    pub nord_token: Option<String>,
    pub mullvad_server_list_url: String,
    pub mullvad_private_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            nord_server_list_url: nordvpn::DEFAULT_SERVER_LIST_URL.to_string(),
            nord_credentials_url: nordvpn::DEFAULT_CREDENTIALS_URL.to_string(),
            nord_token: None,
            mullvad_server_list_url: mullvad::DEFAULT_SERVER_LIST_URL.to_string(),
            mullvad_private_key: None,
        }
    }
}

fn required<'a>(
    value: &'a Option<String>,
    provider: ProviderKind,
    setting: &'static str,
) -> Result<&'a str, ProviderError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ProviderError::MissingSetting { provider, setting })
}

/// A configured provider
#[derive(Debug)]
pub enum ProviderClient {
    NordVpn {
        key: nordvpn::PrivateKeyFetcher,
        servers: nordvpn::ServerListFetcher,
    },
    Mullvad {
        key: mullvad::StaticKey,
        servers: mullvad::ServerListFetcher,
    },
}

impl ProviderClient {
    /// Build the fetchers for `kind`
    ///
    /// Fails if a setting the provider needs is missing or malformed.
    pub fn from_settings(
        kind: ProviderKind,
        settings: &ProviderSettings,
        client: Arc<HttpClient>,
    ) -> Result<Self, ProviderError> {
        match kind {
            ProviderKind::NordVpn => {
                let token = required(&settings.nord_token, kind, "nord token")?;
                Ok(ProviderClient::NordVpn {
                    key: nordvpn::PrivateKeyFetcher::new(
                        client.clone(),
                        token,
                        settings.nord_credentials_url.as_str(),
                    ),
                    servers: nordvpn::ServerListFetcher::new(
                        client,
                        settings.nord_server_list_url.as_str(),
                    ),
                })
            }
            ProviderKind::Mullvad => {
                let private_key = required(&settings.mullvad_private_key, kind, "mullvad private key")?;
                let key = mullvad::StaticKey::new(private_key)?;
                info!("Mullvad public key to register: {}", key.public_key());

                Ok(ProviderClient::Mullvad {
                    key,
                    servers: mullvad::ServerListFetcher::new(
                        client,
                        settings.mullvad_server_list_url.as_str(),
                    ),
                })
            }
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderClient::NordVpn { .. } => ProviderKind::NordVpn,
            ProviderClient::Mullvad { .. } => ProviderKind::Mullvad,
        }
    }
}

impl Provider for ProviderClient {
    async fn fetch_key(&self, cancel: &CancellationToken) -> Result<KeyMaterial, FetchError> {
        match self {
            ProviderClient::NordVpn { key, .. } => key.fetch(cancel).await,
            ProviderClient::Mullvad { key, .. } => key.fetch().await,
        }
    }

    async fn list_servers(&self, cancel: &CancellationToken) -> Result<Vec<Server>, FetchError> {
        match self {
            ProviderClient::NordVpn { servers, .. } => servers.list(cancel).await,
            ProviderClient::Mullvad { servers, .. } => servers.list(cancel).await,
        }
    }
}
