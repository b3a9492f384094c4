//! # Events
//!
//! [`StateChange`]s drive the reducers; [`Event`]s are the effects they emit.

pub mod incoming;
pub mod outgoing;

pub use incoming::StateChange;
pub use outgoing::{lock_expired_message_hash, unlock_message_hash, Event};
