//! # Identifiers
//!
//! Scalar identifiers, address aliases and the canonical channel identifier.

use crate::amounts::U256;
use crate::bytes::{Address, Locksroot, SecretHash};
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Chain the token network lives on.
pub type ChainId = u64;

/// Identifier of a payment, chosen by the initiator.
pub type PaymentId = u64;

/// Identifier of a protocol message.
pub type MessageId = u64;

/// Balance proof sequence number.
pub type Nonce = u64;

/// Block height.
pub type BlockNumber = u64;

/// Block height at which a lock expires.
pub type BlockExpiration = u64;

/// Number of blocks.
pub type BlockTimeout = u64;

/// Channel identifier within a token network.
pub type ChannelId = U256;

/// Token contract address.
pub type TokenAddress = Address;

/// Token network contract address.
pub type TokenNetworkAddress = Address;

/// Payment network (token network registry) address.
pub type PaymentNetworkAddress = Address;

/// Address of a payment's initiator.
pub type InitiatorAddress = Address;

/// Address of a payment's target.
pub type TargetAddress = Address;

/// Locksroot of a channel end without pending locks.
pub const EMPTY_LOCKSROOT: Locksroot = Locksroot::zero();

/// Placeholder secrethash meaning "not set".
pub const EMPTY_SECRETHASH: SecretHash = SecretHash::zero();

/// Increment a nonce, failing on overflow.
pub fn next_nonce(nonce: Nonce) -> Result<Nonce, ValidationError> {
    nonce
        .checked_add(1)
        .ok_or(ValidationError::ArithmeticOverflow { context: "nonce" })
}

/// Globally unique channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    /// Chain identifier.
    pub chain_identifier: ChainId,
    /// Token network contract.
    pub token_network_address: TokenNetworkAddress,
    /// Channel within the token network.
    pub channel_identifier: ChannelId,
}

impl CanonicalIdentifier {
    /// Create a new canonical identifier.
    pub fn new(
        chain_identifier: ChainId,
        token_network_address: TokenNetworkAddress,
        channel_identifier: ChannelId,
    ) -> Self {
        Self {
            chain_identifier,
            token_network_address,
            channel_identifier,
        }
    }
}
