//! # Domain Errors
//!
//! Error types for mediated transfers.

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::events::Event;
use shared_crypto::CryptoError;
use shared_types::{ChannelId, SecretHash, ValidationError};
use thiserror::Error;

/// A role state refused to move to the requested state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition table has no edge `from -> to`.
    #[error("Invalid {entity} transition: {from} -> {to}")]
    Invalid {
        /// State machine name
        entity: &'static str,
        /// Current state
        from: &'static str,
        /// Attempted state
        to: &'static str,
    },

    /// Payee side tried to get paid before the payer side holds a claim.
    #[error("Payee cannot enter {payee} while payer is {payer}")]
    PayeeAheadOfPayer {
        /// Attempted payee state
        payee: &'static str,
        /// Current payer state
        payer: &'static str,
    },

    /// Payer side tried to give up its claim after the payee was paid.
    #[error("Payer cannot enter {payer} while payee is {payee}")]
    PayerClaimAbandoned {
        /// Attempted payer state
        payer: &'static str,
        /// Current payee state
        payee: &'static str,
    },

    /// Initiator saw a secret reveal without a prior secret request.
    #[error("Secret revealed before the target requested it")]
    SecretRequestMissing,
}

/// Mediated transfer error types.
#[derive(Debug, Error)]
pub enum MediatedTransferError {
    /// A state entity could not be constructed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A role state refused a transition.
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// Record encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Signing failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// No candidate route is left for this transfer.
    #[error("No routes left for transfer {secrethash}")]
    RoutesExhausted {
        /// Transfer secrethash
        secrethash: SecretHash,
    },

    /// The initiator already made the maximum number of attempts.
    #[error("Payment {secrethash} exhausted {attempts} attempts")]
    AttemptsExhausted {
        /// Secrethash of the latest attempt
        secrethash: SecretHash,
        /// Attempts made
        attempts: usize,
    },

    /// The role does not handle this kind of state change.
    #[error("{role} does not handle {state_change}")]
    UnsupportedStateChange {
        /// Role name
        role: &'static str,
        /// State change tag
        state_change: &'static str,
    },

    /// The state change does not fit the current state.
    #[error("Invalid state change: {0}")]
    InvalidStateChange(String),

    /// The channel is not known to the ledger.
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// An effect could not be dispatched.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// The transition was committed but dispatch stopped part way.
    #[error("{} effects undelivered: {source}", .undelivered.len())]
    Undelivered {
        /// Dispatcher error
        source: Box<MediatedTransferError>,
        /// The failed effect and every effect after it, in order
        undelivered: Vec<Event>,
    },
}

/// Result alias for mediated transfer operations.
pub type MediatedTransferResult<T> = Result<T, MediatedTransferError>;
