//! wireguard-config-generator
//!
//! Fetches a private key and server list from a VPN provider and writes one
//! WireGuard configuration per server.

mod output;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use confgen_net::{CancellationToken, HttpClient, HttpClientConfig};
use confgen_providers::{ConfigGenerator, ProviderClient};
use settings::{Cli, Settings};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli)?;

    info!("Generating {} configurations for {}", settings.format.extension(), settings.provider);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling requests");
                cancel.cancel();
            }
        }
    });

    let client = Arc::new(HttpClient::new(HttpClientConfig {
        timeout: settings.timeout,
        ..HttpClientConfig::default()
    }));

    let provider = ProviderClient::from_settings(settings.provider, &settings.providers, client)
        .context("configuring provider")?;
    let generator = ConfigGenerator::new(provider);

    let configs = generator
        .list(
            &cancel,
            &settings.interface_addresses,
            &settings.allowed_ips,
            settings.persistent_keepalive,
            &settings.dns,
        )
        .await
        .context("generating configurations")?;

    if configs.is_empty() {
        warn!("{} returned no WireGuard servers", settings.provider);
    }

    let written = output::write_all(&settings.output_dir, settings.provider, settings.format, &configs).await?;

    info!("Wrote {} files to {}", written.len(), settings.output_dir.display());
    Ok(())
}
