//! # Error Types
//!
//! Construction-time validation errors shared by every state entity.

use primitive_types::U256;
use thiserror::Error;

/// A value could not be constructed because it violates an invariant.
///
/// Always recoverable: the caller discards the attempted value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Fixed-size identifier built from input of the wrong length.
    #[error("Invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Identifier kind (e.g. "address").
        kind: &'static str,
        /// Required length in bytes.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Identifier supplied as malformed hex.
    #[error("Invalid {kind} hex: {reason}")]
    InvalidHex {
        /// Identifier kind.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Checked addition overflowed.
    #[error("Arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: &'static str,
    },

    /// Checked subtraction underflowed.
    #[error("Arithmetic underflow: {context}")]
    ArithmeticUnderflow {
        /// What was being computed.
        context: &'static str,
    },

    /// A balance proof with pending locks carries the empty locksroot.
    #[error("Balance proof locksroot must not be empty while a lock is pending")]
    EmptyLocksroot,

    /// Balance proofs start at nonce 1.
    #[error("Balance proof nonce must be greater than zero")]
    ZeroNonce,

    /// The balance proof does not lock enough to cover the transfer's lock.
    #[error("Lock amount {lock_amount} not covered by locked amount {locked_amount}")]
    LockNotCovered {
        /// Amount of the transfer's lock.
        lock_amount: U256,
        /// Locked amount committed by the balance proof.
        locked_amount: U256,
    },

    /// The signature does not recover to the declared sender.
    #[error("Signer mismatch: expected {expected}, recovered {recovered}")]
    SignerMismatch {
        /// Declared sender (hex).
        expected: String,
        /// Address recovered from the signature (hex).
        recovered: String,
    },

    /// The signature could not be parsed or recovered.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Neither a secret nor a secrethash was supplied.
    #[error("A secrethash is required when no secret is given")]
    MissingSecretHash,

    /// The supplied secrethash is not the hash of the supplied secret.
    #[error("Secrethash does not match the hash of the secret")]
    SecretHashMismatch,

    /// A field holds a value of the wrong kind.
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}
