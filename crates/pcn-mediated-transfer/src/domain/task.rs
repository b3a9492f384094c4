//! # Transfer Tasks
//!
//! The role state a node keeps for one transfer.

use super::initiator::InitiatorPaymentState;
use super::mediator::MediatorTransferState;
use super::target::TargetTransferState;
use serde::{Deserialize, Serialize};
use shared_types::SecretHash;

/// Role a node plays in a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Pays.
    Initiator,
    /// Forwards.
    Mediator,
    /// Gets paid.
    Target,
}

impl Role {
    /// Name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Mediator => "mediator",
            Self::Target => "target",
        }
    }
}

/// Live role state of one transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferTask {
    /// We initiated the payment.
    Initiator(InitiatorPaymentState),
    /// We mediate the transfer.
    Mediator(MediatorTransferState),
    /// We are the target.
    Target(TargetTransferState),
}

impl TransferTask {
    /// Role of this task.
    pub fn role(&self) -> Role {
        match self {
            Self::Initiator(_) => Role::Initiator,
            Self::Mediator(_) => Role::Mediator,
            Self::Target(_) => Role::Target,
        }
    }

    /// Every secrethash the task answers to. An initiator payment answers
    /// to the secrethash of each attempt.
    pub fn secrethashes(&self) -> Vec<SecretHash> {
        match self {
            Self::Initiator(payment) => payment.initiator_transfers().keys().copied().collect(),
            Self::Mediator(mediator) => vec![mediator.secrethash()],
            Self::Target(target) => vec![target.secrethash()],
        }
    }
}
