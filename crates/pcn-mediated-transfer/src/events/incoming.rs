//! State changes that drive the role reducers.

use crate::codec::tagged;
use crate::domain::{
    secrethash_of, BalanceProofSignedState, LockedTransferSignedState, RouteState,
    TransferDescriptionWithSecretState,
};
use serde::{Deserialize, Serialize};
use shared_types::{
    Address, BlockExpiration, BlockNumber, CanonicalIdentifier, MessageId, PaymentAmount,
    PaymentId, Secret, SecretHash, TokenAmount,
};

/// One driving event, applied to the task of its secrethash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum StateChange {
    /// Start paying `transfer` over one of `routes`.
    ActionInitInitiator {
        /// Payment intent
        #[serde(with = "tagged")]
        transfer: TransferDescriptionWithSecretState,
        /// Candidate first hops
        #[serde(with = "tagged::vec")]
        routes: Vec<RouteState>,
    },

    /// Mediate a transfer received over `from_route`.
    ActionInitMediator {
        /// Route the transfer came from
        #[serde(with = "tagged")]
        from_route: RouteState,
        /// Received transfer
        #[serde(with = "tagged")]
        from_transfer: LockedTransferSignedState,
        /// Candidate next hops
        #[serde(with = "tagged::vec")]
        routes: Vec<RouteState>,
    },

    /// Receive a transfer addressed to us.
    ActionInitTarget {
        /// Route the transfer came from
        #[serde(with = "tagged")]
        route: RouteState,
        /// Received transfer
        #[serde(with = "tagged")]
        transfer: LockedTransferSignedState,
    },

    /// New block height.
    Block {
        /// Current block
        block_number: BlockNumber,
    },

    /// The target asks the initiator for the secret.
    ReceiveSecretRequest {
        /// Payment identifier
        payment_identifier: PaymentId,
        /// Amount the target expects
        amount: PaymentAmount,
        /// Expiration of the target's lock
        expiration: BlockExpiration,
        /// Requested secret's hash
        secrethash: SecretHash,
        /// Requesting node
        sender: Address,
    },

    /// A peer revealed the secret off-chain.
    ReceiveSecretReveal {
        /// The secret
        secret: Secret,
        /// Revealing node
        sender: Address,
    },

    /// The payer unlocked its lock with a new balance proof.
    ReceiveUnlock {
        /// Message identifier
        message_identifier: MessageId,
        /// The secret
        secret: Secret,
        /// Payer's balance proof without the lock
        #[serde(with = "tagged")]
        balance_proof: BalanceProofSignedState,
    },

    /// The payer removed its expired lock.
    ReceiveLockExpired {
        /// Message identifier
        message_identifier: MessageId,
        /// Expired lock's secrethash
        secrethash: SecretHash,
        /// Payer's balance proof without the lock
        #[serde(with = "tagged")]
        balance_proof: BalanceProofSignedState,
    },

    /// The payee sent the transfer back.
    ReceiveTransferRefund {
        /// Refund transfer
        #[serde(with = "tagged")]
        transfer: LockedTransferSignedState,
        /// Additional candidate routes
        #[serde(with = "tagged::vec")]
        routes: Vec<RouteState>,
    },

    /// The first hop refunded; the initiator cancels the route and retries
    /// with a new secret.
    ReceiveTransferRefundCancelRoute {
        /// Refund transfer
        #[serde(with = "tagged")]
        transfer: LockedTransferSignedState,
        /// Candidate routes for the new attempt
        #[serde(with = "tagged::vec")]
        routes: Vec<RouteState>,
        /// Secret for the new attempt
        secret: Secret,
    },

    /// The secret was registered on-chain.
    ContractReceiveSecretReveal {
        /// Registered secrethash
        secrethash: SecretHash,
        /// Registered secret
        secret: Secret,
        /// Registration block
        block_number: BlockNumber,
    },

    /// Locks of a channel were unlocked on-chain.
    ContractReceiveChannelBatchUnlock {
        /// Channel
        canonical_identifier: CanonicalIdentifier,
        /// Node receiving the unlocked tokens
        receiver: Address,
        /// Node whose locks were unlocked
        sender: Address,
        /// Total unlocked
        unlocked_amount: TokenAmount,
    },
}

impl StateChange {
    /// Secrethash of the task this change belongs to.
    ///
    /// `None` for changes broadcast to every task.
    pub fn secrethash(&self) -> Option<SecretHash> {
        match self {
            Self::ActionInitInitiator { transfer, .. } => Some(transfer.secrethash()),
            Self::ActionInitMediator { from_transfer, .. } => Some(from_transfer.lock().secrethash),
            Self::ActionInitTarget { transfer, .. } => Some(transfer.lock().secrethash),
            Self::ReceiveSecretRequest { secrethash, .. }
            | Self::ReceiveLockExpired { secrethash, .. }
            | Self::ContractReceiveSecretReveal { secrethash, .. } => Some(*secrethash),
            Self::ReceiveSecretReveal { secret, .. } | Self::ReceiveUnlock { secret, .. } => {
                Some(secrethash_of(secret))
            }
            Self::ReceiveTransferRefund { transfer, .. }
            | Self::ReceiveTransferRefundCancelRoute { transfer, .. } => {
                Some(transfer.lock().secrethash)
            }
            Self::Block { .. } | Self::ContractReceiveChannelBatchUnlock { .. } => None,
        }
    }

    /// Whether this change creates a task.
    pub fn is_init(&self) -> bool {
        matches!(
            self,
            Self::ActionInitInitiator { .. }
                | Self::ActionInitMediator { .. }
                | Self::ActionInitTarget { .. }
        )
    }

    /// Type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ActionInitInitiator { .. } => "ActionInitInitiator",
            Self::ActionInitMediator { .. } => "ActionInitMediator",
            Self::ActionInitTarget { .. } => "ActionInitTarget",
            Self::Block { .. } => "Block",
            Self::ReceiveSecretRequest { .. } => "ReceiveSecretRequest",
            Self::ReceiveSecretReveal { .. } => "ReceiveSecretReveal",
            Self::ReceiveUnlock { .. } => "ReceiveUnlock",
            Self::ReceiveLockExpired { .. } => "ReceiveLockExpired",
            Self::ReceiveTransferRefund { .. } => "ReceiveTransferRefund",
            Self::ReceiveTransferRefundCancelRoute { .. } => "ReceiveTransferRefundCancelRoute",
            Self::ContractReceiveSecretReveal { .. } => "ContractReceiveSecretReveal",
            Self::ContractReceiveChannelBatchUnlock { .. } => "ContractReceiveChannelBatchUnlock",
        }
    }
}
