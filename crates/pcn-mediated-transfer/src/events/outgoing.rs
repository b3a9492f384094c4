//! Effects produced by the role reducers.
//!
//! Reducers only construct these; sending messages and submitting
//! transactions is left to the [`crate::ports::EffectDispatcher`].

use crate::codec::tagged;
use crate::domain::{BalanceProof, BalanceProofUnsignedState, LockedTransferUnsignedState, RouteState};
use serde::{Deserialize, Serialize};
use shared_crypto::keccak256_concat;
use shared_types::{
    u64_to_be_bytes32, Address, BlockExpiration, CanonicalIdentifier, ChannelId, InitiatorAddress,
    MessageHash, MessageId, PaymentAmount, PaymentId, PaymentNetworkAddress, Secret, SecretHash,
    TargetAddress, TokenAddress, TokenNetworkAddress,
};

const CMD_UNLOCK: u8 = 4;
const CMD_LOCK_EXPIRED: u8 = 13;

/// An effect to dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum Event {
    /// Send a locked transfer to the next hop.
    SendLockedTransfer {
        /// Next hop
        recipient: Address,
        /// Message identifier
        message_identifier: MessageId,
        /// Transfer to sign and send
        #[serde(with = "tagged")]
        transfer: LockedTransferUnsignedState,
    },

    /// Ask the initiator for the secret.
    SendSecretRequest {
        /// Initiator
        recipient: Address,
        /// Message identifier
        message_identifier: MessageId,
        /// Payment identifier
        payment_identifier: PaymentId,
        /// Amount received
        amount: PaymentAmount,
        /// Received lock's expiration
        expiration: BlockExpiration,
        /// Requested secret's hash
        secrethash: SecretHash,
    },

    /// Reveal the secret to a peer.
    SendSecretReveal {
        /// Peer
        recipient: Address,
        /// Message identifier
        message_identifier: MessageId,
        /// The secret
        secret: Secret,
    },

    /// Unlock the payee's lock with a new balance proof.
    SendBalanceProof {
        /// Payee
        recipient: Address,
        /// Message identifier
        message_identifier: MessageId,
        /// Payment identifier
        payment_identifier: PaymentId,
        /// Token
        token_address: TokenAddress,
        /// The secret
        secret: Secret,
        /// Unlocked lock's secrethash
        secrethash: SecretHash,
        /// Balance proof to sign and send
        #[serde(with = "tagged")]
        balance_proof: BalanceProofUnsignedState,
    },

    /// Remove an expired lock from the payee's view.
    SendLockExpired {
        /// Payee
        recipient: Address,
        /// Message identifier
        message_identifier: MessageId,
        /// Balance proof without the lock
        #[serde(with = "tagged")]
        balance_proof: BalanceProofUnsignedState,
        /// Expired lock's secrethash
        secrethash: SecretHash,
    },

    /// Register the secret on-chain.
    ContractSendSecretReveal {
        /// Lock expiration the registration must beat
        expiration: BlockExpiration,
        /// The secret
        secret: Secret,
    },

    /// Unlock the partner's locks on-chain.
    ContractSendChannelBatchUnlock {
        /// Channel
        canonical_identifier: CanonicalIdentifier,
        /// Partner whose locks are unlocked
        participant: Address,
    },

    /// The initiator's payment completed.
    PaymentSentSuccess {
        /// Payment network
        payment_network_identifier: PaymentNetworkAddress,
        /// Token network
        token_network_identifier: TokenNetworkAddress,
        /// Payment identifier
        identifier: PaymentId,
        /// Amount paid
        amount: PaymentAmount,
        /// Target
        target: TargetAddress,
        /// The secret
        secret: Secret,
    },

    /// The initiator's payment failed.
    PaymentSentFailed {
        /// Payment network
        payment_network_identifier: PaymentNetworkAddress,
        /// Token network
        token_network_identifier: TokenNetworkAddress,
        /// Payment identifier
        identifier: PaymentId,
        /// Target
        target: TargetAddress,
        /// Reason
        reason: String,
    },

    /// The target received the payment.
    PaymentReceivedSuccess {
        /// Token network
        token_network_identifier: TokenNetworkAddress,
        /// Payment identifier
        identifier: PaymentId,
        /// Amount received
        amount: PaymentAmount,
        /// Initiator
        initiator: InitiatorAddress,
    },

    /// A lock we sent was unlocked for the payee.
    UnlockSuccess {
        /// Payment identifier
        identifier: PaymentId,
        /// Lock's secrethash
        secrethash: SecretHash,
    },

    /// A lock we sent could not be unlocked.
    UnlockFailed {
        /// Payment identifier
        identifier: PaymentId,
        /// Lock's secrethash
        secrethash: SecretHash,
        /// Reason
        reason: String,
    },

    /// A lock we received was unlocked for us.
    UnlockClaimSuccess {
        /// Payment identifier
        identifier: PaymentId,
        /// Lock's secrethash
        secrethash: SecretHash,
    },

    /// A lock we received could not be claimed.
    UnlockClaimFailed {
        /// Payment identifier
        identifier: PaymentId,
        /// Lock's secrethash
        secrethash: SecretHash,
        /// Reason
        reason: String,
    },

    /// A route was given up for this transfer.
    RouteFailed {
        /// Transfer secrethash
        secrethash: SecretHash,
        /// Failed route
        #[serde(with = "tagged")]
        route: RouteState,
    },
}

impl Event {
    /// Peer of a send effect.
    pub fn recipient(&self) -> Option<Address> {
        match self {
            Self::SendLockedTransfer { recipient, .. }
            | Self::SendSecretRequest { recipient, .. }
            | Self::SendSecretReveal { recipient, .. }
            | Self::SendBalanceProof { recipient, .. }
            | Self::SendLockExpired { recipient, .. } => Some(*recipient),
            _ => None,
        }
    }

    /// Channel whose balance proof a send effect changes.
    pub fn channel_identifier(&self) -> Option<ChannelId> {
        match self {
            Self::SendLockedTransfer { transfer, .. } => {
                Some(transfer.balance_proof().channel_identifier())
            }
            Self::SendBalanceProof { balance_proof, .. }
            | Self::SendLockExpired { balance_proof, .. } => Some(balance_proof.channel_identifier()),
            _ => None,
        }
    }

    /// Hash of the message carrying a balance proof, which the sender's
    /// signature commits to.
    pub fn message_hash(&self) -> Option<MessageHash> {
        match self {
            Self::SendLockedTransfer {
                message_identifier,
                transfer,
                ..
            } => Some(transfer.message_hash(*message_identifier)),
            Self::SendBalanceProof {
                message_identifier,
                payment_identifier,
                secret,
                ..
            } => Some(unlock_message_hash(*message_identifier, *payment_identifier, secret)),
            Self::SendLockExpired {
                message_identifier,
                secrethash,
                ..
            } => Some(lock_expired_message_hash(*message_identifier, secrethash)),
            _ => None,
        }
    }

    /// Type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SendLockedTransfer { .. } => "SendLockedTransfer",
            Self::SendSecretRequest { .. } => "SendSecretRequest",
            Self::SendSecretReveal { .. } => "SendSecretReveal",
            Self::SendBalanceProof { .. } => "SendBalanceProof",
            Self::SendLockExpired { .. } => "SendLockExpired",
            Self::ContractSendSecretReveal { .. } => "ContractSendSecretReveal",
            Self::ContractSendChannelBatchUnlock { .. } => "ContractSendChannelBatchUnlock",
            Self::PaymentSentSuccess { .. } => "PaymentSentSuccess",
            Self::PaymentSentFailed { .. } => "PaymentSentFailed",
            Self::PaymentReceivedSuccess { .. } => "PaymentReceivedSuccess",
            Self::UnlockSuccess { .. } => "UnlockSuccess",
            Self::UnlockFailed { .. } => "UnlockFailed",
            Self::UnlockClaimSuccess { .. } => "UnlockClaimSuccess",
            Self::UnlockClaimFailed { .. } => "UnlockClaimFailed",
            Self::RouteFailed { .. } => "RouteFailed",
        }
    }
}

/// Hash of an unlock message.
pub fn unlock_message_hash(
    message_identifier: MessageId,
    payment_identifier: PaymentId,
    secret: &Secret,
) -> MessageHash {
    MessageHash::new(keccak256_concat(&[
        &[CMD_UNLOCK],
        &u64_to_be_bytes32(message_identifier),
        &u64_to_be_bytes32(payment_identifier),
        secret.as_bytes(),
    ]))
}

/// Hash of a lock expired message.
pub fn lock_expired_message_hash(
    message_identifier: MessageId,
    secrethash: &SecretHash,
) -> MessageHash {
    MessageHash::new(keccak256_concat(&[
        &[CMD_LOCK_EXPIRED],
        &u64_to_be_bytes32(message_identifier),
        secrethash.as_bytes(),
    ]))
}
