//! confgen WireGuard - Configuration Model and Serialisers
//!
//! Pure data and text handling for generated WireGuard configurations.
//! Nothing in this crate performs I/O.
//!
//! # Pipeline
//!
//! ```text
//! "10.5.0.2/32, ..."  ──parse──▶  Vec<IpNet> ─┐
//!                                             ├─▶ Configuration ──▶ to_ini()  ──▶ .conf
//! provider key + servers ─────────────────────┘                 └─▶ to_uapi() ──▶ wg set
//! ```

mod config;
mod format;
mod keys;
mod parse;

pub use config::{Configuration, Endpoint, PeerConfig};
pub use format::{IniError, RenderError};
pub use keys::{KEY_LEN, KeyError, KeyMaterial};
pub use parse::{ParseError, parse_addresses, parse_keepalive, parse_prefixes, parse_separated};

/// Re-exported so downstream crates name prefixes with the same type
pub use ipnet::IpNet;

/// Default WireGuard UDP port used by the supported providers
pub const DEFAULT_PORT: u16 = 51820;
