//! # Domain Layer
//!
//! Locks, balance proofs, locked transfers and the per-role transfer states.
//! Every entity is built through a validating constructor.

pub mod balance_proof;
pub mod description;
pub mod errors;
pub mod initiator;
pub mod invariants;
pub mod lock;
pub mod mediator;
pub mod route;
pub mod target;
pub mod task;
pub mod transfer;
pub mod value_objects;

pub use balance_proof::{
    balance_proof_signing_hash, BalanceProof, BalanceProofSignedParams, BalanceProofSignedState,
    BalanceProofUnsignedState, MESSAGE_TYPE_BALANCE_PROOF,
};
pub use description::{TransferDescriptionParams, TransferDescriptionWithSecretState};
pub use errors::{MediatedTransferError, MediatedTransferResult, TransitionError};
pub use initiator::{InitiatorPaymentState, InitiatorTransferState};
pub use invariants::*;
pub use lock::{compute_locksroot, HashTimeLock};
pub use mediator::{MediationPairState, MediatorTransferState, WaitingTransferState};
pub use route::RouteState;
pub use target::TargetTransferState;
pub use task::{Role, TransferTask};
pub use transfer::{LockedTransferSignedState, LockedTransferUnsignedState};
pub use value_objects::{
    InitiatorTransferStatus, PayeeState, PayerState, TargetState, WaitingTransferStatus,
};
