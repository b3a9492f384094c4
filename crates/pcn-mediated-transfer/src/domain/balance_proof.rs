//! # Balance Proofs
//!
//! A balance proof states a channel end's cumulative transferred amount,
//! locked amount and locksroot under an increasing nonce. The unsigned form
//! is built locally before sending; the signed form carries the sender's
//! signature and is the only one that can be enforced on-chain. They are
//! distinct types so one can never stand in for the other.

use super::invariants::invariant_locksroot_committed;
use crate::codec::Record;
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256_concat, recover_address, Secp256k1KeyPair};
use shared_types::{
    u256_to_be_bytes, u64_to_be_bytes32, Address, BalanceHash, CanonicalIdentifier, ChannelId,
    LockedAmount, Locksroot, MessageHash, Nonce, Signature, TokenAmount, ValidationError,
};

/// Message type committed to by balance proof signatures.
pub const MESSAGE_TYPE_BALANCE_PROOF: u64 = 1;

/// Capabilities shared by both balance proof variants.
pub trait BalanceProof {
    /// Channel this proof belongs to.
    fn canonical_identifier(&self) -> &CanonicalIdentifier;
    /// Sequence number.
    fn nonce(&self) -> Nonce;
    /// Cumulative amount transferred to the partner.
    fn transferred_amount(&self) -> TokenAmount;
    /// Amount held in pending locks.
    fn locked_amount(&self) -> LockedAmount;
    /// Commitment over the pending locks.
    fn locksroot(&self) -> &Locksroot;

    /// Channel identifier within the token network.
    fn channel_identifier(&self) -> ChannelId {
        self.canonical_identifier().channel_identifier
    }

    /// `keccak256(transferred || locked || locksroot)`.
    fn balance_hash(&self) -> BalanceHash {
        BalanceHash::new(keccak256_concat(&[
            &u256_to_be_bytes(&self.transferred_amount()),
            &u256_to_be_bytes(&self.locked_amount()),
            self.locksroot().as_bytes(),
        ]))
    }
}

/// Digest a balance proof signature covers.
pub fn balance_proof_signing_hash(
    canonical_identifier: &CanonicalIdentifier,
    balance_hash: &BalanceHash,
    nonce: Nonce,
    message_hash: &MessageHash,
) -> [u8; 32] {
    keccak256_concat(&[
        canonical_identifier.token_network_address.as_bytes(),
        &u64_to_be_bytes32(canonical_identifier.chain_identifier),
        &u64_to_be_bytes32(MESSAGE_TYPE_BALANCE_PROOF),
        &u256_to_be_bytes(&canonical_identifier.channel_identifier),
        balance_hash.as_bytes(),
        &u64_to_be_bytes32(nonce),
        message_hash.as_bytes(),
    ])
}

/// Balance proof computed locally, not yet signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProofUnsignedState {
    nonce: Nonce,
    transferred_amount: TokenAmount,
    locked_amount: LockedAmount,
    locksroot: Locksroot,
    canonical_identifier: CanonicalIdentifier,
}

impl BalanceProofUnsignedState {
    /// Create a new unsigned balance proof.
    pub fn new(
        nonce: Nonce,
        transferred_amount: TokenAmount,
        locked_amount: LockedAmount,
        locksroot: Locksroot,
        canonical_identifier: CanonicalIdentifier,
    ) -> Result<Self, ValidationError> {
        let proof = Self {
            nonce,
            transferred_amount,
            locked_amount,
            locksroot,
            canonical_identifier,
        };
        proof.validate()?;
        Ok(proof)
    }

    /// Sign for `message_hash`, producing the signed variant.
    pub fn sign(
        &self,
        message_hash: MessageHash,
        keypair: &Secp256k1KeyPair,
    ) -> Result<BalanceProofSignedState, ValidationError> {
        let prehash = balance_proof_signing_hash(
            &self.canonical_identifier,
            &self.balance_hash(),
            self.nonce,
            &message_hash,
        );
        let signature = keypair
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| ValidationError::InvalidSignature(e.to_string()))?;

        BalanceProofSignedState::new(BalanceProofSignedParams {
            nonce: self.nonce,
            transferred_amount: self.transferred_amount,
            locked_amount: self.locked_amount,
            locksroot: self.locksroot,
            canonical_identifier: self.canonical_identifier,
            message_hash,
            signature: Signature::new(signature),
            sender: Address::new(keypair.address()),
        })
    }
}

impl BalanceProof for BalanceProofUnsignedState {
    fn canonical_identifier(&self) -> &CanonicalIdentifier {
        &self.canonical_identifier
    }
    fn nonce(&self) -> Nonce {
        self.nonce
    }
    fn transferred_amount(&self) -> TokenAmount {
        self.transferred_amount
    }
    fn locked_amount(&self) -> LockedAmount {
        self.locked_amount
    }
    fn locksroot(&self) -> &Locksroot {
        &self.locksroot
    }
}

impl Record for BalanceProofUnsignedState {
    const TYPE_TAG: &'static str = "BalanceProofUnsignedState";

    fn validate(&self) -> Result<(), ValidationError> {
        if self.nonce == 0 {
            return Err(ValidationError::ZeroNonce);
        }
        invariant_locksroot_committed(&self.locked_amount, &self.locksroot)
    }
}

/// Parameters for a signed balance proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceProofSignedParams {
    /// Sequence number.
    pub nonce: Nonce,
    /// Cumulative transferred amount.
    pub transferred_amount: TokenAmount,
    /// Amount in pending locks.
    pub locked_amount: LockedAmount,
    /// Pending locks commitment.
    pub locksroot: Locksroot,
    /// Channel.
    pub canonical_identifier: CanonicalIdentifier,
    /// Hash of the carrying message.
    pub message_hash: MessageHash,
    /// Recoverable signature.
    pub signature: Signature,
    /// Declared signer.
    pub sender: Address,
}

/// Balance proof carrying the sender's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProofSignedState {
    nonce: Nonce,
    transferred_amount: TokenAmount,
    locked_amount: LockedAmount,
    locksroot: Locksroot,
    canonical_identifier: CanonicalIdentifier,
    message_hash: MessageHash,
    signature: Signature,
    sender: Address,
}

impl BalanceProofSignedState {
    /// Create a signed balance proof; the signature must recover to `sender`.
    pub fn new(params: BalanceProofSignedParams) -> Result<Self, ValidationError> {
        let proof = Self {
            nonce: params.nonce,
            transferred_amount: params.transferred_amount,
            locked_amount: params.locked_amount,
            locksroot: params.locksroot,
            canonical_identifier: params.canonical_identifier,
            message_hash: params.message_hash,
            signature: params.signature,
            sender: params.sender,
        };
        proof.validate()?;
        Ok(proof)
    }

    /// Hash of the message that carried this proof.
    pub fn message_hash(&self) -> &MessageHash {
        &self.message_hash
    }

    /// Signature over the proof.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Address that signed the proof.
    pub fn sender(&self) -> Address {
        self.sender
    }

    fn recover_signer(&self) -> Result<Address, ValidationError> {
        let prehash = balance_proof_signing_hash(
            &self.canonical_identifier,
            &self.balance_hash(),
            self.nonce,
            &self.message_hash,
        );
        recover_address(&prehash, self.signature.as_bytes())
            .map(Address::new)
            .map_err(|e| ValidationError::InvalidSignature(e.to_string()))
    }
}

impl BalanceProof for BalanceProofSignedState {
    fn canonical_identifier(&self) -> &CanonicalIdentifier {
        &self.canonical_identifier
    }
    fn nonce(&self) -> Nonce {
        self.nonce
    }
    fn transferred_amount(&self) -> TokenAmount {
        self.transferred_amount
    }
    fn locked_amount(&self) -> LockedAmount {
        self.locked_amount
    }
    fn locksroot(&self) -> &Locksroot {
        &self.locksroot
    }
}

impl Record for BalanceProofSignedState {
    const TYPE_TAG: &'static str = "BalanceProofSignedState";

    fn validate(&self) -> Result<(), ValidationError> {
        if self.nonce == 0 {
            return Err(ValidationError::ZeroNonce);
        }
        invariant_locksroot_committed(&self.locked_amount, &self.locksroot)?;

        let recovered = self.recover_signer()?;
        if recovered != self.sender {
            return Err(ValidationError::SignerMismatch {
                expected: self.sender.to_hex(),
                recovered: recovered.to_hex(),
            });
        }
        Ok(())
    }
}
