//! Command-line, environment and file settings
//!
//! Precedence, lowest first: built-in defaults, the TOML file named by
//! `--config`, `WIREGUARD_CONFIG_GENERATOR_*` environment variables, flags.
//! Clap folds the last two together; the file and defaults are merged here.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use confgen_providers::{ProviderKind, ProviderSettings, nordvpn, mullvad};
use confgen_wireguard::{Configuration, IpNet, RenderError, parse_addresses, parse_keepalive, parse_prefixes};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LIST_DELIMITER: &str = ",";

/// Generate WireGuard configurations from VPN provider APIs
#[derive(Parser, Debug, Default)]
#[command(name = "wireguard-config-generator", version, about)]
pub struct Cli {
    /// TOML settings file
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provider to fetch servers from [default: nordvpn]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// NordVPN server list URL
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_NORD_SERVER_LIST_URL")]
    pub nord_server_list_url: Option<String>,

    /// NordVPN credentials URL
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_NORD_CREDENTIALS_URL")]
    pub nord_credentials_url: Option<String>,

    /// NordVPN API token
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_NORD_TOKEN", hide_env_values = true)]
    pub nord_token: Option<String>,

    /// Mullvad relay list URL
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_MULLVAD_SERVER_LIST_URL")]
    pub mullvad_server_list_url: Option<String>,

    /// Mullvad private key (base64), registered with your account
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_MULLVAD_PRIVATE_KEY", hide_env_values = true)]
    pub mullvad_private_key: Option<String>,

    /// Comma separated interface addresses, provider dependent
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_INTERFACE_ADDRESSES")]
    pub interface_addresses: Option<String>,

    /// Comma separated DNS servers [default: 1.1.1.1]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_DNS")]
    pub dns: Option<String>,

    /// Comma separated allowed IPs for the peer [default: 0.0.0.0/0]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_ALLOWED_IPS")]
    pub allowed_ips: Option<String>,

    /// Persistent keepalive in seconds, 0 disables [default: 25]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_PERSISTENT_KEEPALIVE", value_parser = parse_keepalive)]
    pub persistent_keepalive: Option<u16>,

    /// Directory to write configuration files to
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format [default: conf]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_FORMAT")]
    pub format: Option<OutputFormat>,

    /// HTTP request timeout in seconds [default: 30]
    #[arg(long, env = "WIREGUARD_CONFIG_GENERATOR_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// wg-quick INI text
    #[default]
    Conf,
    /// Userspace control protocol stream
    Uapi,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Conf => "conf",
            OutputFormat::Uapi => "uapi",
        }
    }

    pub fn render(&self, config: &Configuration) -> Result<String, RenderError> {
        match self {
            OutputFormat::Conf => Ok(config.to_ini()),
            OutputFormat::Uapi => config.to_uapi(),
        }
    }
}

/// Settings file contents; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub provider: Option<ProviderKind>,
    pub nord_server_list_url: Option<String>,
    pub nord_credentials_url: Option<String>,
    pub nord_token: Option<String>,
    pub mullvad_server_list_url: Option<String>,
    pub mullvad_private_key: Option<String>,
    pub interface_addresses: Option<String>,
    pub dns: Option<String>,
    pub allowed_ips: Option<String>,
    pub persistent_keepalive: Option<u16>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub timeout_secs: Option<u64>,
}

impl FileSettings {
    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in settings file {}", path.display()))
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing settings")
    }
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderKind,
    pub providers: ProviderSettings,
    pub interface_addresses: Vec<IpNet>,
    pub dns: Vec<IpAddr>,
    pub allowed_ips: Vec<IpNet>,
    pub persistent_keepalive: u16,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub timeout: Duration,
}

impl Settings {
    /// Resolve settings, reading the `--config` file if one was given
    pub fn load(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileSettings::from_toml_file(path)?,
            None => FileSettings::default(),
        };
        Self::merge(cli, file)
    }

    /// Layer `cli` over `file` over the defaults and parse list values
    pub fn merge(cli: Cli, file: FileSettings) -> Result<Self> {
        let provider = cli.provider.or(file.provider).unwrap_or(ProviderKind::NordVpn);

        let providers = ProviderSettings {
            nord_server_list_url: cli
                .nord_server_list_url
                .or(file.nord_server_list_url)
                .unwrap_or_else(|| nordvpn::DEFAULT_SERVER_LIST_URL.to_string()),
            nord_credentials_url: cli
                .nord_credentials_url
                .or(file.nord_credentials_url)
                .unwrap_or_else(|| nordvpn::DEFAULT_CREDENTIALS_URL.to_string()),
            nord_token: cli.nord_token.or(file.nord_token),
            mullvad_server_list_url: cli
                .mullvad_server_list_url
                .or(file.mullvad_server_list_url)
                .unwrap_or_else(|| mullvad::DEFAULT_SERVER_LIST_URL.to_string()),
            mullvad_private_key: cli.mullvad_private_key.or(file.mullvad_private_key),
        };

        let interface_addresses = cli
            .interface_addresses
            .or(file.interface_addresses)
            .ok_or_else(|| anyhow!("interface addresses are required (--interface-addresses)"))?;
        let interface_addresses = parse_prefixes(&interface_addresses, LIST_DELIMITER)
            .context("parsing interface addresses")?;

        let dns = cli.dns.or(file.dns).unwrap_or_else(|| "1.1.1.1".to_string());
        let dns = parse_addresses(&dns, LIST_DELIMITER).context("parsing DNS servers")?;

        let allowed_ips = cli
            .allowed_ips
            .or(file.allowed_ips)
            .unwrap_or_else(|| "0.0.0.0/0".to_string());
        let allowed_ips =
            parse_prefixes(&allowed_ips, LIST_DELIMITER).context("parsing allowed IPs")?;

        let output_dir = cli
            .output_dir
            .or(file.output_dir)
            .ok_or_else(|| anyhow!("output directory is required (--output-dir)"))?;

        let timeout_secs = cli.timeout_secs.or(file.timeout_secs).unwrap_or(30);
        if timeout_secs == 0 {
            return Err(anyhow!("timeout must be at least one second"));
        }

        Ok(Self {
            provider,
            providers,
            interface_addresses,
            dns,
            allowed_ips,
            persistent_keepalive: cli.persistent_keepalive.or(file.persistent_keepalive).unwrap_or(25),
            output_dir,
            format: cli.format.or(file.format).unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
