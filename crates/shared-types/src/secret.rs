//! # Secret
//!
//! Preimage of a hash-time-lock. Zeroized on drop and never printed.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A lock secret (32 bytes).
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    inner: [u8; 32],
}

impl Secret {
    /// Length in bytes.
    pub const LEN: usize = 32;

    /// Create a secret from bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { inner: bytes }
    }

    /// Copy from a slice, rejecting any other length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, ValidationError> {
        let inner = <[u8; 32]>::try_from(slice).map_err(|_| ValidationError::InvalidLength {
            kind: "secret",
            expected: Self::LEN,
            actual: slice.len(),
        })?;
        Ok(Self { inner })
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = hex::decode(raw).map_err(|e| ValidationError::InvalidHex {
            kind: "secret",
            reason: e.to_string(),
        })?;
        let secret = Self::from_slice(&bytes);
        bytes.zeroize();
        secret
    }

    /// Get the secret bytes.
    ///
    /// Avoid keeping references to the returned slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.inner
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.inner)))
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
