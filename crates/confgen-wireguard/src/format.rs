//! Configuration Serialisers
//!
//! Two renderings of the same [`Configuration`]:
//!
//! - **INI**: the `wg-quick` style `.conf` file people edit by hand
//! - **UAPI**: the key=value stream understood by a running WireGuard device
//!   (`wg set` / the cross-platform userspace API)
//!
//! ```text
//! [Interface]                       private_key=<hex>
//! PrivateKey = <base64>             listen_port=0
//! Address = 10.5.0.2/32             public_key=<hex>
//! DNS = 1.1.1.1                     endpoint=62.3.36.228:51820
//!                                   replace_allowed_ips=true
//! [Peer]                            allowed_ip=0.0.0.0/0
//! PublicKey = <base64>              persistent_keepalive_interval=25
//! AllowedIPs = 0.0.0.0/0
//! Endpoint = 62.3.36.228:51820
//! PersistentKeepalive = 25
//! ```

use crate::config::{Configuration, Endpoint, PeerConfig};
use crate::keys::{KeyError, KeyMaterial};
use crate::parse::{ParseError, parse_addresses, parse_keepalive, parse_prefixes};
use std::fmt::{self, Display};
use std::sync::Arc;

/// Errors rendering the control protocol format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("invalid {which}: {source}")]
    InvalidKey {
        /// Which key failed, e.g. `private_key` or `public_key for peer 0`
        which: String,
        #[source]
        source: KeyError,
    },
}

/// Errors reading an INI configuration back
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IniError {
    #[error("line {line}: expected `key = value`")]
    Malformed { line: usize },

    #[error("line {line}: unknown section [{name}]")]
    UnknownSection { line: usize, name: String },

    #[error("line {line}: unknown key {key:?} in [{section}]")]
    UnknownKey {
        line: usize,
        section: &'static str,
        key: String,
    },

    #[error("line {line}: key outside of any section")]
    NoSection { line: usize },

    #[error("line {line}: {source}")]
    Value {
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error("missing [Interface] section")]
    MissingInterface,

    #[error("missing {key} in [{section}]")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
}

/// Comma separated list, empty for an empty slice
struct List<'a, T>(&'a [T]);

impl<T: Display> Display for List<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

/// INI rendering of a configuration
struct Ini<'a>(&'a Configuration);

impl Display for Ini<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        writeln!(f, "[Interface]")?;
        writeln!(f, "PrivateKey = {}", config.private_key)?;
        writeln!(f, "Address = {}", List(&config.interface_addresses[..]))?;
        writeln!(f, "DNS = {}", List(&config.dns[..]))?;

        for peer in &config.peers {
            writeln!(f)?;
            writeln!(f, "[Peer]")?;
            writeln!(f, "PublicKey = {}", peer.public_key)?;
            writeln!(f, "AllowedIPs = {}", List(&peer.allowed_ips[..]))?;
            if let Some(endpoint) = peer.endpoint {
                writeln!(f, "Endpoint = {endpoint}")?;
            }
            writeln!(f, "PersistentKeepalive = {}", peer.persistent_keepalive)?;
        }

        Ok(())
    }
}

/// UAPI rendering; keys are decoded before construction
struct Uapi<'a> {
    config: &'a Configuration,
    private_hex: String,
    public_hex: Vec<String>,
}

impl Display for Uapi<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "private_key={}", self.private_hex)?;
        writeln!(f, "listen_port=0")?;

        for (peer, public_hex) in self.config.peers.iter().zip(&self.public_hex) {
            writeln!(f, "public_key={public_hex}")?;
            if let Some(endpoint) = peer.endpoint {
                writeln!(f, "endpoint={endpoint}")?;
            }
            writeln!(f, "replace_allowed_ips=true")?;
            for prefix in peer.allowed_ips.iter() {
                writeln!(f, "allowed_ip={prefix}")?;
            }
            if peer.persistent_keepalive > 0 {
                writeln!(f, "persistent_keepalive_interval={}", peer.persistent_keepalive)?;
            }
        }

        // An empty line ends the operation
        writeln!(f)
    }
}

fn key_to_hex(key: &KeyMaterial, which: impl FnOnce() -> String) -> Result<String, RenderError> {
    key.to_hex().map_err(|source| RenderError::InvalidKey {
        which: which(),
        source,
    })
}

/// An empty INI value is an empty list
fn parse_list<T>(
    value: &str,
    parse: fn(&str, &str) -> Result<Vec<T>, ParseError>,
) -> Result<Vec<T>, ParseError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    parse(value, ",")
}

impl Configuration {
    /// Render as an INI `.conf` file
    pub fn to_ini(&self) -> String {
        Ini(self).to_string()
    }

    /// Render as a UAPI `set` operation body
    ///
    /// Keys are validated before anything is written, so a bad key never
    /// produces a partial line.
    pub fn to_uapi(&self) -> Result<String, RenderError> {
        let private_hex = key_to_hex(&self.private_key, || "private_key".to_string())?;
        let public_hex = self
            .peers
            .iter()
            .enumerate()
            .map(|(i, peer)| key_to_hex(&peer.public_key, || format!("public_key for peer {i}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Uapi {
            config: self,
            private_hex,
            public_hex,
        }
        .to_string())
    }

    /// Read back a configuration written by [`Configuration::to_ini`]
    ///
    /// Blank lines and `#` comments are skipped. Keys are matched
    /// case-insensitively, as wg-quick does.
    pub fn from_ini(input: &str) -> Result<Configuration, IniError> {
        let mut interface: Option<InterfaceBuilder> = None;
        let mut peers: Vec<PeerBuilder> = Vec::new();
        let mut section = Section::None;

        for (idx, raw) in input.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if let Some(name) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                section = match name.trim().to_ascii_lowercase().as_str() {
                    "interface" => {
                        interface.get_or_insert_with(InterfaceBuilder::default);
                        Section::Interface
                    }
                    "peer" => {
                        peers.push(PeerBuilder::default());
                        Section::Peer
                    }
                    _ => {
                        return Err(IniError::UnknownSection {
                            line,
                            name: name.to_string(),
                        });
                    }
                };
                continue;
            }

            let (key, value) = text.split_once('=').ok_or(IniError::Malformed { line })?;
            let key = key.trim();
            let value = value.trim();
            let value_err = |source: ParseError| IniError::Value { line, source };

            match section {
                Section::None => return Err(IniError::NoSection { line }),
                Section::Interface => {
                    let iface = interface.get_or_insert_with(InterfaceBuilder::default);
                    match key.to_ascii_lowercase().as_str() {
                        "privatekey" => iface.private_key = Some(KeyMaterial::new(value)),
                        "address" => iface.addresses = parse_list(value, parse_prefixes).map_err(value_err)?,
                        "dns" => iface.dns = parse_list(value, parse_addresses).map_err(value_err)?,
                        _ => {
                            return Err(IniError::UnknownKey {
                                line,
                                section: "Interface",
                                key: key.to_string(),
                            });
                        }
                    }
                }
                Section::Peer => {
                    let Some(peer) = peers.last_mut() else {
                        return Err(IniError::NoSection { line });
                    };
                    match key.to_ascii_lowercase().as_str() {
                        "publickey" => peer.public_key = Some(KeyMaterial::new(value)),
                        "allowedips" => {
                            peer.allowed_ips = parse_list(value, parse_prefixes).map_err(value_err)?
                        }
                        "endpoint" => {
                            let endpoint = value.parse::<Endpoint>().map_err(|e| {
                                value_err(ParseError {
                                    segment: value.to_string(),
                                    index: 0,
                                    reason: e.to_string(),
                                })
                            })?;
                            peer.endpoint = Some(endpoint);
                        }
                        "persistentkeepalive" => {
                            peer.persistent_keepalive = parse_keepalive(value).map_err(value_err)?
                        }
                        _ => {
                            return Err(IniError::UnknownKey {
                                line,
                                section: "Peer",
                                key: key.to_string(),
                            });
                        }
                    }
                }
            }
        }

        let iface = interface.ok_or(IniError::MissingInterface)?;
        let private_key = iface.private_key.ok_or(IniError::MissingKey {
            section: "Interface",
            key: "PrivateKey",
        })?;

        let peers = peers
            .into_iter()
            .map(|p| {
                let public_key = p.public_key.ok_or(IniError::MissingKey {
                    section: "Peer",
                    key: "PublicKey",
                })?;
                Ok(PeerConfig::new(
                    public_key,
                    p.endpoint,
                    Arc::from(p.allowed_ips),
                    p.persistent_keepalive,
                ))
            })
            .collect::<Result<Vec<_>, IniError>>()?;

        Ok(Configuration::new(
            private_key,
            Arc::from(iface.addresses),
            Arc::from(iface.dns),
            peers,
        ))
    }
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Interface,
    Peer,
}

#[derive(Default)]
struct InterfaceBuilder {
    private_key: Option<KeyMaterial>,
    addresses: Vec<ipnet::IpNet>,
    dns: Vec<std::net::IpAddr>,
}

#[derive(Default)]
struct PeerBuilder {
    public_key: Option<KeyMaterial>,
    endpoint: Option<Endpoint>,
    allowed_ips: Vec<ipnet::IpNet>,
    persistent_keepalive: u16,
}
