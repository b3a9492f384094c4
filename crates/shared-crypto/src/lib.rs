//! # Shared Crypto - Hashing and Signing
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Secrethash, lockhash, locksroot, balance hash |
//! | `ecdsa` | secp256k1 | Balance proof signing and signer recovery |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2)
//! - **Recovery**: signer address recovered from a 65-byte `r || s || v`
//!   signature, so a balance proof's sender is checked, not trusted

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{address_from_verifying_key, recover_address, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_concat, Hash};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
