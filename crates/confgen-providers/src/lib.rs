//! confgen-providers: VPN provider fetchers
//!
//! Fetches private keys and server lists from supported VPN providers and
//! turns them into WireGuard configurations.
//!
//! Features:
//! - NordVPN key and server list over its public API
//! - Mullvad relay list with a user-supplied key
//! - Concurrent key and server fetches with cancellation

mod error;
mod fetch;
mod generator;
pub mod mullvad;
pub mod nordvpn;
mod provider;
mod server;

pub use error::{FetchError, GenerateError, ProviderError};
pub use generator::ConfigGenerator;
pub use provider::{Provider, ProviderClient, ProviderKind, ProviderSettings};
pub use server::Server;
