//! # Inbound Ports

use crate::domain::{MediatedTransferResult, TransferTask};
use crate::events::{Event, StateChange};
use async_trait::async_trait;
use shared_types::{BlockNumber, SecretHash};

/// Mediated transfer API - inbound port.
#[async_trait]
pub trait MediatedTransferApi: Send + Sync {
    /// Apply one state change and dispatch the resulting effects.
    async fn handle_state_change(&self, state_change: StateChange)
        -> MediatedTransferResult<Vec<Event>>;

    /// Snapshot of the task for `secrethash`.
    fn task(&self, secrethash: &SecretHash) -> Option<TransferTask>;

    /// Secrethashes of every live task, sorted.
    fn active_secrethashes(&self) -> Vec<SecretHash>;

    /// Latest block seen.
    fn block_number(&self) -> BlockNumber;
}
