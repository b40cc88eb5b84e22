//! WireGuard Key Material
//!
//! Providers hand out keys as base64 strings. The text format writes them
//! verbatim, the control protocol needs the raw 32 bytes as lowercase hex.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::fmt;
use std::sync::Arc;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// Length of a Curve25519 key in bytes
pub const KEY_LEN: usize = 32;

/// Base64 key material as received from a provider
///
/// The string is not validated on construction: the INI format writes it
/// as-is, and only the control protocol requires a well-formed key. Clones
/// share the same allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyMaterial {
    encoded: Arc<str>,
}

impl KeyMaterial {
    /// Wrap a base64 key string
    pub fn new(encoded: impl Into<Arc<str>>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }

    /// The key exactly as the provider sent it
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Decode to the raw key bytes
    pub fn to_bytes(&self) -> Result<[u8; KEY_LEN], KeyError> {
        let bytes = BASE64
            .decode(self.encoded.as_bytes())
            .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;

        bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))
    }

    /// Lowercase hex encoding of the raw key, as the control protocol expects
    pub fn to_hex(&self) -> Result<String, KeyError> {
        self.to_bytes().map(hex::encode)
    }

    /// Derive the public half, treating this value as a private key
    pub fn public_key(&self) -> Result<KeyMaterial, KeyError> {
        let secret = StaticSecret::from(self.to_bytes()?);
        let public = X25519Public::from(&secret);
        Ok(KeyMaterial::new(BASE64.encode(public.as_bytes())))
    }

    /// Returns true if the instances share the same backing storage
    pub fn ptr_eq(&self, other: &KeyMaterial) -> bool {
        Arc::ptr_eq(&self.encoded, &other.encoded)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([redacted])")
    }
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl From<&str> for KeyMaterial {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for KeyMaterial {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Key parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    #[error("invalid key length {0} (expected 32)")]
    InvalidLength(usize),
}
