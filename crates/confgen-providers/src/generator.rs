//! Configuration Generator
//!
//! Combines one provider key with every server the provider lists: one
//! [`Configuration`] per server, each with exactly one peer.

use crate::error::GenerateError;
use crate::provider::Provider;
use confgen_net::CancellationToken;
use confgen_wireguard::{Configuration, IpNet, PeerConfig};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

/// Generates one configuration per provider server
#[derive(Debug)]
pub struct ConfigGenerator<P> {
    provider: P,
}

impl<P: Provider> ConfigGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Fetch the key and server list, then build the configurations
    ///
    /// Both fetches run concurrently. The first failure wins and the other
    /// fetch is dropped mid-flight; no partial result is returned. The
    /// interface addresses, DNS servers and allowed IPs are shared between
    /// all returned configurations.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        interface_addresses: &[IpNet],
        allowed_ips: &[IpNet],
        persistent_keepalive: u16,
        dns: &[IpAddr],
    ) -> Result<Vec<Configuration>, GenerateError> {
        let (private_key, servers) = tokio::try_join!(
            async {
                self.provider
                    .fetch_key(cancel)
                    .await
                    .map_err(GenerateError::PrivateKey)
            },
            async {
                self.provider
                    .list_servers(cancel)
                    .await
                    .map_err(GenerateError::ServerList)
            },
        )?;

        let interface_addresses: Arc<[IpNet]> = Arc::from(interface_addresses);
        let allowed_ips: Arc<[IpNet]> = Arc::from(allowed_ips);
        let dns: Arc<[IpAddr]> = Arc::from(dns);

        let configs: Vec<Configuration> = servers
            .into_iter()
            .map(|server| {
                let peer = PeerConfig::new(
                    server.public_key,
                    Some(server.endpoint),
                    allowed_ips.clone(),
                    persistent_keepalive,
                );

                Configuration::new(
                    private_key.clone(),
                    interface_addresses.clone(),
                    dns.clone(),
                    vec![peer],
                )
            })
            .collect();

        info!("Generated {} configurations", configs.len());

        Ok(configs)
    }
}
