//! # Algorithms Module
//!
//! Role reducers. Each takes the prior role state (`None` before the task
//! exists), one [`StateChange`] and a read-only [`TransitionContext`], and
//! returns the next state (`None` once the task is finished) with the
//! effects to dispatch. Reducers perform no I/O; outgoing message
//! identifiers come from the caller's RNG.
//!
//! [`StateChange`]: crate::events::StateChange

pub mod initiator;
pub mod mediator;
pub mod target;

use crate::config::MediatedTransferConfig;
use crate::domain::MediatedTransferError;
use crate::events::Event;
use crate::ports::ChannelLedger;
use rand::RngCore;
use shared_types::{
    Address, BlockExpiration, BlockNumber, BlockTimeout, MessageId, SecretHash, ValidationError,
};

/// Read-only inputs of a transition.
#[derive(Clone, Copy)]
pub struct TransitionContext<'a> {
    /// This node.
    pub our_address: Address,
    /// Latest block seen.
    pub block_number: BlockNumber,
    /// Protocol parameters.
    pub config: &'a MediatedTransferConfig,
    /// Our channel ends.
    pub channels: &'a dyn ChannelLedger,
}

/// Outcome of a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionResult<S> {
    /// Next state; `None` once the task is finished.
    pub new_state: Option<S>,
    /// Effects to dispatch, in order.
    pub events: Vec<Event>,
}

impl<S> TransitionResult<S> {
    /// Result with `state` and `events`.
    pub fn new(new_state: Option<S>, events: Vec<Event>) -> Self {
        Self { new_state, events }
    }

    /// State kept, nothing emitted.
    pub fn unchanged(state: S) -> Self {
        Self::new(Some(state), Vec::new())
    }

    /// Task finished.
    pub fn finished(events: Vec<Event>) -> Self {
        Self::new(None, events)
    }
}

/// A lock expiring at `expiration` still leaves `reveal_timeout` blocks to
/// register the secret on-chain.
pub fn is_safe_to_wait(
    expiration: BlockExpiration,
    reveal_timeout: BlockTimeout,
    block_number: BlockNumber,
) -> bool {
    expiration > block_number.saturating_add(reveal_timeout)
}

pub(crate) fn next_message_id(rng: &mut dyn RngCore) -> MessageId {
    rng.next_u64()
}

/// A received balance proof that does not do what its message claims.
pub(crate) fn rejected_balance_proof(
    message: &str,
    secrethash: SecretHash,
    error: ValidationError,
) -> MediatedTransferError {
    MediatedTransferError::InvalidStateChange(format!(
        "{} for {} rejected: {}",
        message, secrethash, error
    ))
}
