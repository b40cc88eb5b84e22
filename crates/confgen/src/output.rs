//! Writing generated configurations to disk

use crate::settings::OutputFormat;
use anyhow::{Context, Result};
use confgen_providers::ProviderKind;
use confgen_wireguard::Configuration;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name for the configuration at `index`, e.g. `nordvpn_0.conf`
pub fn file_name(provider: ProviderKind, index: usize, format: OutputFormat) -> String {
    format!("{}_{}.{}", provider.slug(), index, format.extension())
}

/// Render every configuration and write it under `dir`
///
/// The directory is created if missing. Every configuration is rendered
/// before the first file is written, so a render failure leaves no files.
pub async fn write_all(
    dir: &Path,
    provider: ProviderKind,
    format: OutputFormat,
    configs: &[Configuration],
) -> Result<Vec<PathBuf>> {
    let rendered = configs
        .iter()
        .enumerate()
        .map(|(i, config)| {
            format
                .render(config)
                .with_context(|| format!("rendering configuration {i}"))
        })
        .collect::<Result<Vec<_>>>()?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(rendered.len());
    for (i, content) in rendered.into_iter().enumerate() {
        let path = dir.join(file_name(provider, i, format));
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
