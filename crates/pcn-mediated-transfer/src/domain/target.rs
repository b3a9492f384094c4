//! # Target State

use super::errors::TransitionError;
use super::invariants::invariant_secret_matches;
use super::route::RouteState;
use super::transfer::LockedTransferSignedState;
use super::value_objects::TargetState;
use crate::codec::{tagged, Record};
use serde::{Deserialize, Serialize};
use shared_types::{Secret, SecretHash, ValidationError};

/// Target's view of one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTransferState {
    #[serde(with = "tagged")]
    route: RouteState,
    #[serde(with = "tagged")]
    transfer: LockedTransferSignedState,
    #[serde(default)]
    secret: Option<Secret>,
    state: TargetState,
}

impl TargetTransferState {
    /// Start waiting for the secret of `transfer`, received over `route`.
    pub fn new(route: RouteState, transfer: LockedTransferSignedState) -> Result<Self, ValidationError> {
        let state = Self {
            route,
            transfer,
            secret: None,
            state: TargetState::SecretRequest,
        };
        state.validate()?;
        Ok(state)
    }

    /// Route the transfer arrived over.
    pub fn route(&self) -> &RouteState {
        &self.route
    }

    /// The received transfer.
    pub fn transfer(&self) -> &LockedTransferSignedState {
        &self.transfer
    }

    /// Replace the received transfer, e.g. with a newer balance proof.
    pub fn set_transfer(&mut self, transfer: LockedTransferSignedState) -> Result<(), ValidationError> {
        if transfer.lock() != self.transfer.lock() {
            return Err(ValidationError::InvalidField {
                field: "transfer",
                reason: "lock differs from the received lock".to_string(),
            });
        }
        self.transfer = transfer;
        Ok(())
    }

    /// Secrethash of the received lock.
    pub fn secrethash(&self) -> SecretHash {
        self.transfer.lock().secrethash
    }

    /// Secret, once learned.
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    /// Record the secret; it must hash to the lock's secrethash.
    pub fn set_secret(&mut self, secret: Secret) -> Result<(), ValidationError> {
        invariant_secret_matches(&secret, &self.secrethash())?;
        self.secret = Some(secret);
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Move to `next`.
    pub fn set_state(&mut self, next: TargetState) -> Result<(), TransitionError> {
        self.state = self.state.transition_to(next)?;
        Ok(())
    }
}

impl Record for TargetTransferState {
    const TYPE_TAG: &'static str = "TargetTransferState";

    fn validate(&self) -> Result<(), ValidationError> {
        self.transfer.validate()?;
        if let Some(secret) = &self.secret {
            invariant_secret_matches(secret, &self.secrethash())?;
        }
        if self.route.node_address != self.transfer.payer_address() {
            return Err(ValidationError::InvalidField {
                field: "route",
                reason: "route node is not the payer".to_string(),
            });
        }
        Ok(())
    }
}
