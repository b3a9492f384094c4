//! # Initiator State
//!
//! One [`InitiatorTransferState`] per attempt; [`InitiatorPaymentState`]
//! groups the attempts of one payment by secrethash.

use super::balance_proof::BalanceProof;
use super::description::TransferDescriptionWithSecretState;
use super::errors::TransitionError;
use super::invariants::invariant_same_secrethash;
use super::route::RouteState;
use super::transfer::LockedTransferUnsignedState;
use super::value_objects::InitiatorTransferStatus;
use crate::codec::{tagged, Record};
use serde::{Deserialize, Serialize};
use shared_types::{ChannelId, SecretHash, ValidationError};
use std::collections::BTreeMap;

/// Initiator's view of one transfer attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorTransferState {
    #[serde(with = "tagged")]
    transfer_description: TransferDescriptionWithSecretState,
    #[serde(with = "tagged")]
    route: RouteState,
    #[serde(with = "tagged")]
    transfer: LockedTransferUnsignedState,
    received_secret_request: bool,
    transfer_state: InitiatorTransferStatus,
    #[serde(default)]
    lock_expired: bool,
}

impl InitiatorTransferState {
    /// Create a pending attempt over `route`.
    pub fn new(
        transfer_description: TransferDescriptionWithSecretState,
        route: RouteState,
        transfer: LockedTransferUnsignedState,
    ) -> Result<Self, ValidationError> {
        let state = Self {
            transfer_description,
            route,
            transfer,
            received_secret_request: false,
            transfer_state: InitiatorTransferStatus::Pending,
            lock_expired: false,
        };
        state.validate()?;
        Ok(state)
    }

    /// The payment intent of this attempt.
    pub fn transfer_description(&self) -> &TransferDescriptionWithSecretState {
        &self.transfer_description
    }

    /// Route the lock was sent over.
    pub fn route(&self) -> &RouteState {
        &self.route
    }

    /// Channel the lock was sent over.
    pub fn channel_identifier(&self) -> ChannelId {
        self.route.channel_identifier
    }

    /// The locked transfer sent to the first hop.
    pub fn transfer(&self) -> &LockedTransferUnsignedState {
        &self.transfer
    }

    /// Secrethash of this attempt.
    pub fn secrethash(&self) -> SecretHash {
        self.transfer.lock().secrethash
    }

    /// Whether the target asked for the secret.
    pub fn received_secret_request(&self) -> bool {
        self.received_secret_request
    }

    /// Current attempt state.
    pub fn transfer_state(&self) -> InitiatorTransferStatus {
        self.transfer_state
    }

    /// Whether the lock expiry was announced to the payee.
    pub fn lock_expired(&self) -> bool {
        self.lock_expired
    }

    /// Record the target's secret request.
    pub fn mark_secret_request_received(&mut self) {
        self.received_secret_request = true;
    }

    /// Record that the payee was told the lock expired.
    pub fn mark_lock_expired(&mut self) {
        self.lock_expired = true;
    }

    /// Move the attempt to `next`.
    ///
    /// `SecretRevealed` is refused until a secret request was received.
    pub fn set_transfer_state(&mut self, next: InitiatorTransferStatus) -> Result<(), TransitionError> {
        if next == InitiatorTransferStatus::SecretRevealed && !self.received_secret_request {
            return Err(TransitionError::SecretRequestMissing);
        }
        self.transfer_state = self.transfer_state.transition_to(next)?;
        Ok(())
    }
}

impl Record for InitiatorTransferState {
    const TYPE_TAG: &'static str = "InitiatorTransferState";

    fn validate(&self) -> Result<(), ValidationError> {
        self.transfer_description.validate()?;
        self.transfer.validate()?;
        invariant_same_secrethash(
            &self.transfer_description.secrethash(),
            &self.transfer.lock().secrethash,
        )?;
        if self.route.channel_identifier != self.transfer.balance_proof().channel_identifier() {
            return Err(ValidationError::InvalidField {
                field: "route",
                reason: "route channel differs from the transfer's channel".to_string(),
            });
        }
        Ok(())
    }
}

/// Initiator's view of one payment, possibly spanning several attempts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorPaymentState {
    #[serde(with = "tagged::map")]
    initiator_transfers: BTreeMap<SecretHash, InitiatorTransferState>,
    cancelled_channels: Vec<ChannelId>,
}

impl InitiatorPaymentState {
    /// Start a payment with its first attempt.
    pub fn new(first: InitiatorTransferState) -> Self {
        let mut initiator_transfers = BTreeMap::new();
        initiator_transfers.insert(first.secrethash(), first);
        Self {
            initiator_transfers,
            cancelled_channels: Vec::new(),
        }
    }

    /// All attempts keyed by secrethash.
    pub fn initiator_transfers(&self) -> &BTreeMap<SecretHash, InitiatorTransferState> {
        &self.initiator_transfers
    }

    /// One attempt.
    pub fn transfer(&self, secrethash: &SecretHash) -> Option<&InitiatorTransferState> {
        self.initiator_transfers.get(secrethash)
    }

    /// One attempt, mutably.
    pub fn transfer_mut(&mut self, secrethash: &SecretHash) -> Option<&mut InitiatorTransferState> {
        self.initiator_transfers.get_mut(secrethash)
    }

    /// Iterate attempts mutably.
    pub fn transfers_mut(&mut self) -> impl Iterator<Item = &mut InitiatorTransferState> {
        self.initiator_transfers.values_mut()
    }

    /// Add a new attempt; its secrethash must be unused.
    pub fn add_transfer(&mut self, attempt: InitiatorTransferState) -> Result<(), ValidationError> {
        let secrethash = attempt.secrethash();
        if self.initiator_transfers.contains_key(&secrethash) {
            return Err(ValidationError::InvalidField {
                field: "initiator_transfers",
                reason: format!("secrethash {} already has an attempt", secrethash),
            });
        }
        self.initiator_transfers.insert(secrethash, attempt);
        Ok(())
    }

    /// Channels that must not be used again for this payment.
    pub fn cancelled_channels(&self) -> &[ChannelId] {
        &self.cancelled_channels
    }

    /// Exclude a channel from future attempts.
    pub fn cancel_channel(&mut self, channel_identifier: ChannelId) {
        if !self.cancelled_channels.contains(&channel_identifier) {
            self.cancelled_channels.push(channel_identifier);
        }
    }

    /// Every attempt reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        !self.initiator_transfers.is_empty()
            && self
                .initiator_transfers
                .values()
                .all(|t| t.transfer_state().is_terminal())
    }

    /// Resolved with exactly one attempt revealing the secret.
    pub fn is_successful(&self) -> bool {
        self.is_resolved()
            && self
                .initiator_transfers
                .values()
                .filter(|t| t.transfer_state() == InitiatorTransferStatus::SecretRevealed)
                .count()
                == 1
    }
}

impl Record for InitiatorPaymentState {
    const TYPE_TAG: &'static str = "InitiatorPaymentState";

    fn validate(&self) -> Result<(), ValidationError> {
        for (secrethash, attempt) in &self.initiator_transfers {
            attempt.validate()?;
            invariant_same_secrethash(secrethash, &attempt.secrethash())?;
        }
        Ok(())
    }
}
