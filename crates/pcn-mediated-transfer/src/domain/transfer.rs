//! # Locked Transfers
//!
//! A locked transfer binds one [`HashTimeLock`] to a balance proof of the
//! matching signedness plus payment metadata. Construction validates every
//! invariant, so an invalid transfer never exists.

use super::balance_proof::{BalanceProof, BalanceProofSignedState, BalanceProofUnsignedState};
use super::invariants::{invariant_lock_covered, invariant_locksroot_not_empty};
use super::lock::HashTimeLock;
use crate::codec::{tagged, Record};
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256_concat, Secp256k1KeyPair};
use shared_types::{
    u64_to_be_bytes32, Address, InitiatorAddress, MessageHash, MessageId, PaymentId, TargetAddress,
    TokenAddress, ValidationError,
};

fn validate_transfer<B: BalanceProof + Record>(
    balance_proof: &B,
    lock: &HashTimeLock,
) -> Result<(), ValidationError> {
    balance_proof.validate()?;
    lock.validate()?;
    invariant_locksroot_not_empty(balance_proof.locksroot())?;
    invariant_lock_covered(&lock.amount, &balance_proof.locked_amount())
}

/// Transfer built locally and not yet countersigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTransferUnsignedState {
    payment_identifier: PaymentId,
    token: TokenAddress,
    #[serde(with = "tagged")]
    balance_proof: BalanceProofUnsignedState,
    #[serde(with = "tagged")]
    lock: HashTimeLock,
    initiator: InitiatorAddress,
    target: TargetAddress,
}

impl LockedTransferUnsignedState {
    /// Create a new unsigned locked transfer.
    pub fn new(
        payment_identifier: PaymentId,
        token: TokenAddress,
        balance_proof: BalanceProofUnsignedState,
        lock: HashTimeLock,
        initiator: InitiatorAddress,
        target: TargetAddress,
    ) -> Result<Self, ValidationError> {
        let transfer = Self {
            payment_identifier,
            token,
            balance_proof,
            lock,
            initiator,
            target,
        };
        transfer.validate()?;
        Ok(transfer)
    }

    /// Payment identifier.
    pub fn payment_identifier(&self) -> PaymentId {
        self.payment_identifier
    }

    /// Token being transferred.
    pub fn token(&self) -> TokenAddress {
        self.token
    }

    /// Unsigned balance proof.
    pub fn balance_proof(&self) -> &BalanceProofUnsignedState {
        &self.balance_proof
    }

    /// The transfer's lock.
    pub fn lock(&self) -> &HashTimeLock {
        &self.lock
    }

    /// Payment initiator.
    pub fn initiator(&self) -> InitiatorAddress {
        self.initiator
    }

    /// Payment target.
    pub fn target(&self) -> TargetAddress {
        self.target
    }

    /// Replace the balance proof, re-running validation.
    pub fn with_balance_proof(
        &self,
        balance_proof: BalanceProofUnsignedState,
    ) -> Result<Self, ValidationError> {
        Self::new(
            self.payment_identifier,
            self.token,
            balance_proof,
            self.lock.clone(),
            self.initiator,
            self.target,
        )
    }

    /// Replace the lock, re-running validation.
    pub fn with_lock(&self, lock: HashTimeLock) -> Result<Self, ValidationError> {
        Self::new(
            self.payment_identifier,
            self.token,
            self.balance_proof.clone(),
            lock,
            self.initiator,
            self.target,
        )
    }

    /// Hash of the locked transfer message for `message_identifier`.
    pub fn message_hash(&self, message_identifier: MessageId) -> MessageHash {
        MessageHash::new(keccak256_concat(&[
            &u64_to_be_bytes32(message_identifier),
            &u64_to_be_bytes32(self.payment_identifier),
            self.token.as_bytes(),
            self.initiator.as_bytes(),
            self.target.as_bytes(),
            &self.lock.encoded(),
        ]))
    }

    /// Sign as the sending node, producing the transfer its partner receives.
    pub fn sign(
        &self,
        message_identifier: MessageId,
        keypair: &Secp256k1KeyPair,
    ) -> Result<LockedTransferSignedState, ValidationError> {
        let balance_proof = self
            .balance_proof
            .sign(self.message_hash(message_identifier), keypair)?;

        LockedTransferSignedState::new(
            message_identifier,
            self.payment_identifier,
            self.token,
            balance_proof,
            self.lock.clone(),
            self.initiator,
            self.target,
        )
    }
}

impl Record for LockedTransferUnsignedState {
    const TYPE_TAG: &'static str = "LockedTransferUnsignedState";

    fn validate(&self) -> Result<(), ValidationError> {
        validate_transfer(&self.balance_proof, &self.lock)
    }
}

/// Transfer received from (or countersigned by) the payer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTransferSignedState {
    message_identifier: MessageId,
    payment_identifier: PaymentId,
    token: TokenAddress,
    #[serde(with = "tagged")]
    balance_proof: BalanceProofSignedState,
    #[serde(with = "tagged")]
    lock: HashTimeLock,
    initiator: InitiatorAddress,
    target: TargetAddress,
}

impl LockedTransferSignedState {
    /// Create a new signed locked transfer.
    pub fn new(
        message_identifier: MessageId,
        payment_identifier: PaymentId,
        token: TokenAddress,
        balance_proof: BalanceProofSignedState,
        lock: HashTimeLock,
        initiator: InitiatorAddress,
        target: TargetAddress,
    ) -> Result<Self, ValidationError> {
        let transfer = Self {
            message_identifier,
            payment_identifier,
            token,
            balance_proof,
            lock,
            initiator,
            target,
        };
        transfer.validate()?;
        Ok(transfer)
    }

    /// Identifier of the message that carried the transfer.
    pub fn message_identifier(&self) -> MessageId {
        self.message_identifier
    }

    /// Payment identifier.
    pub fn payment_identifier(&self) -> PaymentId {
        self.payment_identifier
    }

    /// Token being transferred.
    pub fn token(&self) -> TokenAddress {
        self.token
    }

    /// Signed balance proof.
    pub fn balance_proof(&self) -> &BalanceProofSignedState {
        &self.balance_proof
    }

    /// The transfer's lock.
    pub fn lock(&self) -> &HashTimeLock {
        &self.lock
    }

    /// Payment initiator.
    pub fn initiator(&self) -> InitiatorAddress {
        self.initiator
    }

    /// Payment target.
    pub fn target(&self) -> TargetAddress {
        self.target
    }

    /// The node that sent this transfer.
    pub fn payer_address(&self) -> Address {
        self.balance_proof.sender()
    }

    /// Replace the balance proof, re-running validation.
    pub fn with_balance_proof(
        &self,
        balance_proof: BalanceProofSignedState,
    ) -> Result<Self, ValidationError> {
        Self::new(
            self.message_identifier,
            self.payment_identifier,
            self.token,
            balance_proof,
            self.lock.clone(),
            self.initiator,
            self.target,
        )
    }

    /// Replace the lock, re-running validation.
    pub fn with_lock(&self, lock: HashTimeLock) -> Result<Self, ValidationError> {
        Self::new(
            self.message_identifier,
            self.payment_identifier,
            self.token,
            self.balance_proof.clone(),
            lock,
            self.initiator,
            self.target,
        )
    }
}

impl Record for LockedTransferSignedState {
    const TYPE_TAG: &'static str = "LockedTransferSignedState";

    fn validate(&self) -> Result<(), ValidationError> {
        validate_transfer(&self.balance_proof, &self.lock)
    }
}
