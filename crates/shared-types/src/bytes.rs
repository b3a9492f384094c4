//! # Fixed-Size Byte Identifiers
//!
//! Addresses, hashes and signatures. Each type wraps an array of the exact
//! length and rejects anything else at construction.

use crate::errors::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            /// Wrap an array of the exact length.
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// All-zero value.
            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Copy from a slice, rejecting any other length.
            pub fn from_slice(slice: &[u8]) -> Result<Self, ValidationError> {
                let bytes = <[u8; $len]>::try_from(slice).map_err(|_| {
                    ValidationError::InvalidLength {
                        kind: $kind,
                        expected: $len,
                        actual: slice.len(),
                    }
                })?;
                Ok(Self(bytes))
            }

            /// Parse from hex, with or without the `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(raw).map_err(|e| ValidationError::InvalidHex {
                    kind: $kind,
                    reason: e.to_string(),
                })?;
                Self::from_slice(&bytes)
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// True when every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account address.
    Address,
    20,
    "address"
);

fixed_bytes!(
    /// Hash of a transfer's secret; identifies a lock without revealing it.
    SecretHash,
    32,
    "secrethash"
);

fixed_bytes!(
    /// Commitment over all pending locks of a channel end.
    Locksroot,
    32,
    "locksroot"
);

fixed_bytes!(
    /// Hash over transferred amount, locked amount and locksroot.
    BalanceHash,
    32,
    "balance hash"
);

fixed_bytes!(
    /// Hash of the message carrying a balance proof.
    MessageHash,
    32,
    "message hash"
);

fixed_bytes!(
    /// Recoverable secp256k1 signature (r || s || v).
    Signature,
    65,
    "signature"
);
