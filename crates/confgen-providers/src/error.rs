//! Provider and generator errors

use crate::provider::ProviderKind;
use confgen_net::HttpError;
use thiserror::Error;

/// Failure of a single provider fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[source] HttpError),

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected status code {status}")]
    UnexpectedStatus { status: u16 },

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("invalid response: {0}")]
    Validation(String),
}

impl From<HttpError> for FetchError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Cancelled => FetchError::Cancelled,
            other => FetchError::Network(other),
        }
    }
}

/// Failure of a whole generation call, tagged with the failing component
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("fetching private key: {0}")]
    PrivateKey(#[source] FetchError),

    #[error("fetching server list: {0}")]
    ServerList(#[source] FetchError),
}

impl GenerateError {
    /// The underlying fetch failure
    pub fn fetch_error(&self) -> &FetchError {
        match self {
            GenerateError::PrivateKey(e) | GenerateError::ServerList(e) => e,
        }
    }
}

/// Provider selection and settings errors, raised before any network activity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    Unknown(String),

    #[error("{provider} requires {setting}")]
    MissingSetting {
        provider: ProviderKind,
        setting: &'static str,
    },

    #[error("invalid {setting}: {reason}")]
    InvalidSetting {
        setting: &'static str,
        reason: String,
    },
}
