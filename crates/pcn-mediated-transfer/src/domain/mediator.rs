//! # Mediator State
//!
//! A mediator tracks each hop it forwards as a [`MediationPairState`]: the
//! signed transfer received from the payer and the unsigned transfer sent to
//! the payee, each with its own sub-state machine.
//!
//! ## Safety
//!
//! The payee side never gets paid (`payee_balance_proof`) before the payer
//! side holds an enforceable claim (`payer_secret_revealed` or later).

use super::errors::TransitionError;
use super::invariants::{invariant_same_secrethash, invariant_secret_matches};
use super::route::RouteState;
use super::transfer::{LockedTransferSignedState, LockedTransferUnsignedState};
use super::value_objects::{PayeeState, PayerState, WaitingTransferStatus};
use super::balance_proof::BalanceProof;
use crate::codec::{tagged, Record};
use serde::{Deserialize, Serialize};
use shared_types::{Address, ChannelId, Secret, SecretHash, ValidationError};

/// One hop mediated by this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediationPairState {
    #[serde(with = "tagged")]
    payer_transfer: LockedTransferSignedState,
    payee_address: Address,
    #[serde(with = "tagged")]
    payee_transfer: LockedTransferUnsignedState,
    payer_state: PayerState,
    payee_state: PayeeState,
}

impl MediationPairState {
    /// Create a pair with both sides pending.
    pub fn new(
        payer_transfer: LockedTransferSignedState,
        payee_address: Address,
        payee_transfer: LockedTransferUnsignedState,
    ) -> Result<Self, ValidationError> {
        let pair = Self {
            payer_transfer,
            payee_address,
            payee_transfer,
            payer_state: PayerState::Pending,
            payee_state: PayeeState::Pending,
        };
        pair.validate()?;
        Ok(pair)
    }

    /// Transfer received from the payer.
    pub fn payer_transfer(&self) -> &LockedTransferSignedState {
        &self.payer_transfer
    }

    /// Transfer sent to the payee.
    pub fn payee_transfer(&self) -> &LockedTransferUnsignedState {
        &self.payee_transfer
    }

    /// Payer node.
    pub fn payer_address(&self) -> Address {
        self.payer_transfer.payer_address()
    }

    /// Payee node.
    pub fn payee_address(&self) -> Address {
        self.payee_address
    }

    /// Channel with the payer.
    pub fn payer_channel(&self) -> ChannelId {
        self.payer_transfer.balance_proof().channel_identifier()
    }

    /// Channel with the payee.
    pub fn payee_channel(&self) -> ChannelId {
        self.payee_transfer.balance_proof().channel_identifier()
    }

    /// Payer-side state.
    pub fn payer_state(&self) -> PayerState {
        self.payer_state
    }

    /// Payee-side state.
    pub fn payee_state(&self) -> PayeeState {
        self.payee_state
    }

    /// Move the payer side to `next`.
    ///
    /// Once the payee holds `payee_balance_proof` the payer side must keep
    /// holding a claim.
    pub fn set_payer_state(&mut self, next: PayerState) -> Result<(), TransitionError> {
        if self.payee_state == PayeeState::BalanceProof && !next.holds_claim() {
            return Err(TransitionError::PayerClaimAbandoned {
                payer: next.as_str(),
                payee: self.payee_state.as_str(),
            });
        }
        self.payer_state = self.payer_state.transition_to(next)?;
        Ok(())
    }

    /// Move the payee side to `next`.
    ///
    /// `payee_balance_proof` is refused while the payer side holds no claim.
    pub fn set_payee_state(&mut self, next: PayeeState) -> Result<(), TransitionError> {
        if next == PayeeState::BalanceProof && !self.payer_state.holds_claim() {
            return Err(TransitionError::PayeeAheadOfPayer {
                payee: next.as_str(),
                payer: self.payer_state.as_str(),
            });
        }
        self.payee_state = self.payee_state.transition_to(next)?;
        Ok(())
    }

    /// Both sides are settled.
    pub fn is_resolved(&self) -> bool {
        self.payer_state.is_terminal() && self.payee_state.is_resolved()
    }
}

impl Record for MediationPairState {
    const TYPE_TAG: &'static str = "MediationPairState";

    fn validate(&self) -> Result<(), ValidationError> {
        self.payer_transfer.validate()?;
        self.payee_transfer.validate()?;
        invariant_same_secrethash(
            &self.payer_transfer.lock().secrethash,
            &self.payee_transfer.lock().secrethash,
        )?;
        if self.payee_address == self.payer_address() {
            return Err(ValidationError::InvalidField {
                field: "payee_address",
                reason: "payee is the payer".to_string(),
            });
        }
        if self.payee_state == PayeeState::BalanceProof && !self.payer_state.holds_claim() {
            return Err(ValidationError::InvalidField {
                field: "payee_state",
                reason: format!(
                    "{} while payer is {}",
                    self.payee_state.as_str(),
                    self.payer_state.as_str()
                ),
            });
        }
        Ok(())
    }
}

/// A signed transfer the mediator could not forward yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingTransferState {
    #[serde(with = "tagged")]
    transfer: LockedTransferSignedState,
    state: WaitingTransferStatus,
}

impl WaitingTransferState {
    /// Park `transfer`.
    pub fn new(transfer: LockedTransferSignedState) -> Self {
        Self {
            transfer,
            state: WaitingTransferStatus::Waiting,
        }
    }

    /// The parked transfer.
    pub fn transfer(&self) -> &LockedTransferSignedState {
        &self.transfer
    }

    /// Waiting state.
    pub fn state(&self) -> WaitingTransferStatus {
        self.state
    }

    /// Mark the parked lock as expired.
    pub fn expire(&mut self) -> Result<(), TransitionError> {
        self.state = self.state.transition_to(WaitingTransferStatus::Expired)?;
        Ok(())
    }
}

impl Record for WaitingTransferState {
    const TYPE_TAG: &'static str = "WaitingTransferState";

    fn validate(&self) -> Result<(), ValidationError> {
        self.transfer.validate()
    }
}

/// Mediator's view of one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatorTransferState {
    secrethash: SecretHash,
    #[serde(with = "tagged::vec")]
    routes: Vec<RouteState>,
    #[serde(default)]
    secret: Option<Secret>,
    #[serde(with = "tagged::vec")]
    transfers_pair: Vec<MediationPairState>,
    #[serde(default, with = "tagged::option")]
    waiting_transfer: Option<WaitingTransferState>,
    #[serde(default)]
    refunded_channels: Vec<ChannelId>,
}

impl MediatorTransferState {
    /// Create a state with no pairs yet.
    pub fn new(secrethash: SecretHash, routes: Vec<RouteState>) -> Self {
        Self {
            secrethash,
            routes,
            secret: None,
            transfers_pair: Vec::new(),
            waiting_transfer: None,
            refunded_channels: Vec::new(),
        }
    }

    /// The transfer's secrethash, shared by every pair.
    pub fn secrethash(&self) -> SecretHash {
        self.secrethash
    }

    /// Candidate routes in order.
    pub fn routes(&self) -> &[RouteState] {
        &self.routes
    }

    /// Append routes not already known.
    pub fn extend_routes(&mut self, routes: &[RouteState]) {
        for route in routes {
            if !self.routes.contains(route) {
                self.routes.push(route.clone());
            }
        }
    }

    /// Secret, once learned.
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    /// Record the secret; it must hash to the secrethash.
    pub fn set_secret(&mut self, secret: Secret) -> Result<(), ValidationError> {
        invariant_secret_matches(&secret, &self.secrethash)?;
        self.secret = Some(secret);
        Ok(())
    }

    /// Mediated hops, oldest first.
    pub fn transfers_pair(&self) -> &[MediationPairState] {
        &self.transfers_pair
    }

    /// Mediated hops, mutably.
    pub fn transfers_pair_mut(&mut self) -> &mut [MediationPairState] {
        &mut self.transfers_pair
    }

    /// Append a pair; its locks must carry this transfer's secrethash.
    pub fn push_pair(&mut self, pair: MediationPairState) -> Result<(), ValidationError> {
        invariant_same_secrethash(&self.secrethash, &pair.payer_transfer().lock().secrethash)?;
        self.transfers_pair.push(pair);
        Ok(())
    }

    /// Parked transfer, if any.
    pub fn waiting_transfer(&self) -> Option<&WaitingTransferState> {
        self.waiting_transfer.as_ref()
    }

    /// Parked transfer, mutably.
    pub fn waiting_transfer_mut(&mut self) -> Option<&mut WaitingTransferState> {
        self.waiting_transfer.as_mut()
    }

    /// Park a transfer that could not be forwarded.
    pub fn set_waiting_transfer(
        &mut self,
        waiting: WaitingTransferState,
    ) -> Result<(), ValidationError> {
        invariant_same_secrethash(&self.secrethash, &waiting.transfer().lock().secrethash)?;
        self.waiting_transfer = Some(waiting);
        Ok(())
    }

    /// Drop the parked transfer once it was forwarded.
    pub fn clear_waiting_transfer(&mut self) {
        self.waiting_transfer = None;
    }

    /// Channels a refund arrived on.
    pub fn refunded_channels(&self) -> &[ChannelId] {
        &self.refunded_channels
    }

    /// Record a refund on `channel_identifier`.
    pub fn mark_refunded(&mut self, channel_identifier: ChannelId) {
        if !self.refunded_channels.contains(&channel_identifier) {
            self.refunded_channels.push(channel_identifier);
        }
    }

    /// Routes still worth trying for a transfer paid by `payer`, in order.
    ///
    /// Excludes channels already used by a pair on either side, refunded
    /// channels and routes leading back to the payer.
    pub fn available_routes(&self, payer: &Address) -> Vec<&RouteState> {
        self.routes
            .iter()
            .filter(|route| route.node_address != *payer)
            .filter(|route| !self.refunded_channels.contains(&route.channel_identifier))
            .filter(|route| {
                !self.transfers_pair.iter().any(|pair| {
                    pair.payee_channel() == route.channel_identifier
                        || pair.payer_channel() == route.channel_identifier
                })
            })
            .collect()
    }

    /// Every pair and the parked transfer are settled.
    pub fn is_resolved(&self) -> bool {
        let waiting_done = self
            .waiting_transfer
            .as_ref()
            .map_or(true, |w| w.state() == WaitingTransferStatus::Expired);
        let pairs_done = self.transfers_pair.iter().all(MediationPairState::is_resolved);
        waiting_done && pairs_done && (!self.transfers_pair.is_empty() || self.waiting_transfer.is_some())
    }
}

impl Record for MediatorTransferState {
    const TYPE_TAG: &'static str = "MediatorTransferState";

    fn validate(&self) -> Result<(), ValidationError> {
        for pair in &self.transfers_pair {
            pair.validate()?;
            invariant_same_secrethash(&self.secrethash, &pair.payer_transfer().lock().secrethash)?;
        }
        if let Some(waiting) = &self.waiting_transfer {
            waiting.validate()?;
            invariant_same_secrethash(&self.secrethash, &waiting.transfer().lock().secrethash)?;
        }
        if let Some(secret) = &self.secret {
            invariant_secret_matches(secret, &self.secrethash)?;
        }
        Ok(())
    }
}
