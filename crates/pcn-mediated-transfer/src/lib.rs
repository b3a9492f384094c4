//! # PCN Mediated Transfers
//!
//! Hash time-locked transfers routed through intermediary payment channels.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A payment travels from an initiator through zero or more mediators to a
//! target, locked on every hop by the same secrethash:
//! - The target requests the secret from the initiator
//! - The secret travels back hop by hop and each payer unlocks off-chain
//! - A node that cannot wait for an off-chain unlock registers the secret
//!   on-chain before its incoming lock expires
//!
//! ## Safety Rules
//!
//! | Rule | Description |
//! |------|-------------|
//! | Reveal margin | A lock is only forwarded or waited on with `reveal_timeout` blocks to spare |
//! | Claim before pay | A mediator unlocks to its payee only once it holds a claim on its payer |
//! | No loops | A mediator never routes back to the payer or over a refunded channel |
//! | Valid by construction | Every state entity validates on construction and on decode |
//!
//! ## Module Structure
//!
//! ```text
//! pcn-mediated-transfer/
//! ├── domain/          # Locks, balance proofs, transfers, role states, errors
//! ├── algorithms/      # Initiator, mediator and target reducers
//! ├── events/          # State changes in, effects out
//! ├── codec/           # Tagged record serialization
//! ├── ports/           # MediatedTransferApi, ChannelLedger, EffectDispatcher
//! ├── adapters/        # In-memory ledger, recording dispatcher
//! ├── config.rs        # MediatedTransferConfig
//! └── service.rs       # TransferService
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod codec;
pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{InMemoryChannelLedger, RecordingDispatcher};
pub use algorithms::{is_safe_to_wait, TransitionContext, TransitionResult};
pub use codec::{decode, decode_any, encode, AnyRecord, CodecError, Record};
pub use config::{ConfigError, MediatedTransferConfig};
pub use domain::{
    compute_locksroot, secrethash_of, BalanceProof, BalanceProofSignedState,
    BalanceProofUnsignedState, HashTimeLock, InitiatorPaymentState, InitiatorTransferState,
    LockedTransferSignedState, LockedTransferUnsignedState, MediatedTransferError,
    MediatedTransferResult, MediationPairState, MediatorTransferState, Role, RouteState,
    TargetTransferState, TransferDescriptionParams, TransferDescriptionWithSecretState,
    TransferTask, TransitionError,
};
pub use events::{Event, StateChange};
pub use ports::{ChannelLedger, ChannelView, EffectDispatcher, MediatedTransferApi};
pub use service::TransferService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
