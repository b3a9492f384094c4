//! # Hash-Time-Lock
//!
//! One HTLC and the locksroot commitment over a channel end's pending locks.

use crate::codec::Record;
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256, keccak256_concat};
use shared_types::{
    u256_to_be_bytes, u64_to_be_bytes32, BlockExpiration, LockedAmount, Locksroot, SecretHash,
    ValidationError, EMPTY_LOCKSROOT, EMPTY_SECRETHASH,
};

/// Hash Time-Locked transfer of `amount`, claimable with the preimage of
/// `secrethash` before block `expiration`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTimeLock {
    /// Amount locked.
    pub amount: LockedAmount,
    /// Block at which the lock expires.
    pub expiration: BlockExpiration,
    /// Hash of the secret.
    pub secrethash: SecretHash,
}

impl HashTimeLock {
    /// Create a new lock.
    pub fn new(amount: LockedAmount, expiration: BlockExpiration, secrethash: SecretHash) -> Self {
        Self {
            amount,
            expiration,
            secrethash,
        }
    }

    /// `amount (32 BE) || expiration (32 BE) || secrethash`.
    pub fn encoded(&self) -> [u8; 96] {
        let mut out = [0u8; 96];
        out[..32].copy_from_slice(&u256_to_be_bytes(&self.amount));
        out[32..64].copy_from_slice(&u64_to_be_bytes32(self.expiration));
        out[64..].copy_from_slice(self.secrethash.as_bytes());
        out
    }

    /// Leaf of the locksroot commitment.
    pub fn lockhash(&self) -> [u8; 32] {
        keccak256(&self.encoded())
    }

    /// True once `block_number` reached the expiration.
    pub fn is_expired(&self, block_number: u64) -> bool {
        block_number >= self.expiration
    }
}

impl Record for HashTimeLock {
    const TYPE_TAG: &'static str = "HashTimeLock";

    fn validate(&self) -> Result<(), ValidationError> {
        if self.secrethash == EMPTY_SECRETHASH {
            return Err(ValidationError::MissingSecretHash);
        }
        Ok(())
    }
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    if a <= b {
        keccak256_concat(&[a.as_slice(), b.as_slice()])
    } else {
        keccak256_concat(&[b.as_slice(), a.as_slice()])
    }
}

/// Merkle root over lock hashes.
///
/// No leaves give [`EMPTY_LOCKSROOT`] and a single leaf is its own root.
/// Parents hash the ordered pair of their children; an odd node is carried
/// up unchanged.
pub fn compute_locksroot(lockhashes: &[[u8; 32]]) -> Locksroot {
    if lockhashes.is_empty() {
        return EMPTY_LOCKSROOT;
    }

    let mut layer: Vec<[u8; 32]> = lockhashes.to_vec();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => hash_pair(a, b),
                _ => pair[0],
            })
            .collect();
    }

    Locksroot::new(layer[0])
}
