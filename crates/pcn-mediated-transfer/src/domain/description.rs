//! # Transfer Description
//!
//! The initiator's intent, from which the first locked transfer is built.

use super::invariants::{invariant_address_set, invariant_secret_matches, secrethash_of};
use crate::codec::Record;
use serde::{Deserialize, Serialize};
use shared_types::{
    FeeAmount, InitiatorAddress, PaymentAmount, PaymentId, PaymentNetworkAddress, Secret,
    SecretHash, TargetAddress, TokenNetworkAddress, ValidationError, EMPTY_SECRETHASH, U256,
};

/// Parameters for a transfer description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferDescriptionParams {
    /// Payment network (token network registry).
    pub payment_network_identifier: PaymentNetworkAddress,
    /// Payment identifier chosen by the initiator.
    pub payment_identifier: PaymentId,
    /// Amount the target receives.
    pub amount: PaymentAmount,
    /// Fee allocated for mediators.
    pub allocated_fee: FeeAmount,
    /// Token network.
    pub token_network_identifier: TokenNetworkAddress,
    /// Payment initiator.
    pub initiator: InitiatorAddress,
    /// Payment target.
    pub target: TargetAddress,
    /// Lock secret, if known.
    pub secret: Option<Secret>,
    /// Explicit secrethash; derived from `secret` when absent.
    pub secrethash: Option<SecretHash>,
}

/// What the initiator wants to pay, and to whom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptionWithSecretState {
    payment_network_identifier: PaymentNetworkAddress,
    payment_identifier: PaymentId,
    amount: PaymentAmount,
    allocated_fee: FeeAmount,
    token_network_identifier: TokenNetworkAddress,
    initiator: InitiatorAddress,
    target: TargetAddress,
    #[serde(default)]
    secret: Option<Secret>,
    secrethash: SecretHash,
}

impl TransferDescriptionWithSecretState {
    /// Create a description.
    ///
    /// The secrethash is `keccak256(secret)` unless given explicitly; an
    /// explicit secrethash must agree with the secret.
    pub fn new(params: TransferDescriptionParams) -> Result<Self, ValidationError> {
        let secrethash = match (&params.secret, params.secrethash) {
            (Some(secret), None) => secrethash_of(secret),
            (_, Some(secrethash)) => secrethash,
            (None, None) => return Err(ValidationError::MissingSecretHash),
        };

        let description = Self {
            payment_network_identifier: params.payment_network_identifier,
            payment_identifier: params.payment_identifier,
            amount: params.amount,
            allocated_fee: params.allocated_fee,
            token_network_identifier: params.token_network_identifier,
            initiator: params.initiator,
            target: params.target,
            secret: params.secret,
            secrethash,
        };
        description.validate()?;
        Ok(description)
    }

    /// Same payment with a fresh secret, for a new attempt.
    pub fn with_secret(&self, secret: Secret) -> Result<Self, ValidationError> {
        Self::new(TransferDescriptionParams {
            payment_network_identifier: self.payment_network_identifier,
            payment_identifier: self.payment_identifier,
            amount: self.amount,
            allocated_fee: self.allocated_fee,
            token_network_identifier: self.token_network_identifier,
            initiator: self.initiator,
            target: self.target,
            secret: Some(secret),
            secrethash: None,
        })
    }

    /// Payment network.
    pub fn payment_network_identifier(&self) -> PaymentNetworkAddress {
        self.payment_network_identifier
    }

    /// Payment identifier.
    pub fn payment_identifier(&self) -> PaymentId {
        self.payment_identifier
    }

    /// Amount the target receives.
    pub fn amount(&self) -> PaymentAmount {
        self.amount
    }

    /// Fee allocated for mediators.
    pub fn allocated_fee(&self) -> FeeAmount {
        self.allocated_fee
    }

    /// Amount plus fee, i.e. what the first lock holds.
    pub fn amount_with_fee(&self) -> Result<U256, ValidationError> {
        shared_types::checked_add(self.amount, self.allocated_fee, "amount with fee")
    }

    /// Token network.
    pub fn token_network_identifier(&self) -> TokenNetworkAddress {
        self.token_network_identifier
    }

    /// Payment initiator.
    pub fn initiator(&self) -> InitiatorAddress {
        self.initiator
    }

    /// Payment target.
    pub fn target(&self) -> TargetAddress {
        self.target
    }

    /// Lock secret, if known.
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    /// Secrethash of this payment attempt.
    pub fn secrethash(&self) -> SecretHash {
        self.secrethash
    }
}

impl Record for TransferDescriptionWithSecretState {
    const TYPE_TAG: &'static str = "TransferDescriptionWithSecretState";

    fn validate(&self) -> Result<(), ValidationError> {
        if self.secrethash == EMPTY_SECRETHASH {
            return Err(ValidationError::MissingSecretHash);
        }
        if let Some(secret) = &self.secret {
            invariant_secret_matches(secret, &self.secrethash)?;
        }
        invariant_address_set("initiator", &self.initiator)?;
        invariant_address_set("target", &self.target)
    }
}
