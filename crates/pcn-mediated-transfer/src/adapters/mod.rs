//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports, used by single-process
//! deployments and tests.

mod channel_ledger;
mod dispatcher;

pub use channel_ledger::InMemoryChannelLedger;
pub use dispatcher::RecordingDispatcher;
