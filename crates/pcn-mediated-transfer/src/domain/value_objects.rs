//! # Domain Value Objects
//!
//! Closed state enumerations of every role, each with its transition table.
//! States only move forward; a transition missing from a table is rejected
//! with [`TransitionError::Invalid`].

use super::errors::TransitionError;
use serde::{Deserialize, Serialize};

/// Initiator state of one transfer attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InitiatorTransferStatus {
    /// Lock sent, waiting for the target.
    #[default]
    #[serde(rename = "transfer_pending")]
    Pending,
    /// Attempt abandoned (refund or expiry).
    #[serde(rename = "transfer_cancelled")]
    Cancelled,
    /// Secret revealed to the payee, payment done.
    #[serde(rename = "transfer_secret_revealed")]
    SecretRevealed,
}

impl InitiatorTransferStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "transfer_pending",
            Self::Cancelled => "transfer_cancelled",
            Self::SecretRevealed => "transfer_secret_revealed",
        }
    }

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::SecretRevealed) | (Self::Pending, Self::Cancelled)
        )
    }

    /// Move to `next` if the table allows it.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                entity: "initiator",
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::SecretRevealed)
    }
}

/// Payer-side state of one mediated hop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayerState {
    /// Lock received.
    #[default]
    #[serde(rename = "payer_pending")]
    Pending,
    /// Secret sent to the payer.
    #[serde(rename = "payer_secret_revealed")]
    SecretRevealed,
    /// Secret registered on-chain, waiting for the on-chain unlock.
    #[serde(rename = "payer_waiting_unlock")]
    WaitingUnlock,
    /// On-chain secret registration in flight.
    #[serde(rename = "payer_waiting_secret_reveal")]
    WaitingSecretReveal,
    /// Payer's balance proof received.
    #[serde(rename = "payer_balance_proof")]
    BalanceProof,
    /// Lock expired before it was claimed.
    #[serde(rename = "payer_expired")]
    Expired,
}

impl PayerState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "payer_pending",
            Self::SecretRevealed => "payer_secret_revealed",
            Self::WaitingUnlock => "payer_waiting_unlock",
            Self::WaitingSecretReveal => "payer_waiting_secret_reveal",
            Self::BalanceProof => "payer_balance_proof",
            Self::Expired => "payer_expired",
        }
    }

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PayerState::*;
        matches!(
            (self, next),
            (Pending, SecretRevealed)
                | (Pending, Expired)
                | (SecretRevealed, WaitingUnlock)
                | (SecretRevealed, WaitingSecretReveal)
                | (SecretRevealed, BalanceProof)
                | (SecretRevealed, Expired)
                | (WaitingSecretReveal, WaitingUnlock)
                | (WaitingSecretReveal, BalanceProof)
                | (WaitingUnlock, BalanceProof)
        )
    }

    /// Move to `next` if the table allows it.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                entity: "payer",
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }

    /// The mediator can enforce its claim on the payer's lock.
    pub fn holds_claim(&self) -> bool {
        matches!(
            self,
            Self::SecretRevealed | Self::WaitingUnlock | Self::WaitingSecretReveal | Self::BalanceProof
        )
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BalanceProof | Self::Expired)
    }
}

/// Payee-side state of one mediated hop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayeeState {
    /// Lock sent.
    #[default]
    #[serde(rename = "payee_pending")]
    Pending,
    /// Payee revealed the secret to us.
    #[serde(rename = "payee_secret_revealed")]
    SecretRevealed,
    /// Payee unlocked on-chain.
    #[serde(rename = "payee_contract_unlock")]
    ContractUnlock,
    /// Balance proof sent to the payee.
    #[serde(rename = "payee_balance_proof")]
    BalanceProof,
    /// Lock expired before it was claimed.
    #[serde(rename = "payee_expired")]
    Expired,
}

impl PayeeState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "payee_pending",
            Self::SecretRevealed => "payee_secret_revealed",
            Self::ContractUnlock => "payee_contract_unlock",
            Self::BalanceProof => "payee_balance_proof",
            Self::Expired => "payee_expired",
        }
    }

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PayeeState::*;
        matches!(
            (self, next),
            (Pending, SecretRevealed)
                | (Pending, ContractUnlock)
                | (Pending, BalanceProof)
                | (Pending, Expired)
                | (SecretRevealed, ContractUnlock)
                | (SecretRevealed, BalanceProof)
                | (SecretRevealed, Expired)
                | (ContractUnlock, BalanceProof)
                | (ContractUnlock, Expired)
        )
    }

    /// Move to `next` if the table allows it.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                entity: "payee",
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }

    /// The payee's lock is settled one way or another.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::ContractUnlock | Self::BalanceProof | Self::Expired)
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BalanceProof | Self::Expired)
    }
}

/// Target state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetState {
    /// Secret requested from the initiator.
    #[default]
    #[serde(rename = "secret_request")]
    SecretRequest,
    /// Secret known and revealed to the payer off-chain.
    #[serde(rename = "reveal_secret")]
    OffchainSecretReveal,
    /// Secret registration on-chain requested.
    #[serde(rename = "onchain_secret_reveal")]
    OnchainSecretReveal,
    /// Secret registered on-chain, lock claimable by unlock.
    #[serde(rename = "onchain_unlock")]
    OnchainUnlock,
    /// Lock expired.
    #[serde(rename = "expired")]
    Expired,
}

impl TargetState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretRequest => "secret_request",
            Self::OffchainSecretReveal => "reveal_secret",
            Self::OnchainSecretReveal => "onchain_secret_reveal",
            Self::OnchainUnlock => "onchain_unlock",
            Self::Expired => "expired",
        }
    }

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (SecretRequest, OffchainSecretReveal)
                | (SecretRequest, Expired)
                | (OffchainSecretReveal, OnchainSecretReveal)
                | (OffchainSecretReveal, OnchainUnlock)
                | (OffchainSecretReveal, Expired)
                | (OnchainSecretReveal, OnchainUnlock)
        )
    }

    /// Move to `next` if the table allows it.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                entity: "target",
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OnchainUnlock | Self::Expired)
    }
}

/// State of a transfer parked by the mediator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitingTransferStatus {
    /// Waiting for a usable route.
    #[default]
    #[serde(rename = "waiting")]
    Waiting,
    /// The lock expired while waiting.
    #[serde(rename = "expired")]
    Expired,
}

impl WaitingTransferStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Expired => "expired",
        }
    }

    /// Move to `next` if the table allows it.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if !(self == Self::Waiting && next == Self::Expired) {
            return Err(TransitionError::Invalid {
                entity: "waiting transfer",
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }
}
