//! Effect dispatcher that keeps what it was given.

use crate::domain::{MediatedTransferError, MediatedTransferResult};
use crate::events::Event;
use crate::ports::EffectDispatcher;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

/// Collects dispatched effects in order.
///
/// A node wiring its transport drains the collected effects with
/// [`RecordingDispatcher::take`].
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatched: RwLock<Vec<Event>>,
    failure: RwLock<Option<String>>,
}

impl RecordingDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every later dispatch with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }

    /// Accept dispatches again.
    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// Effects dispatched so far.
    pub fn dispatched(&self) -> Vec<Event> {
        self.dispatched.read().clone()
    }

    /// Drain the dispatched effects.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.dispatched.write())
    }
}

#[async_trait]
impl EffectDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: Event) -> MediatedTransferResult<()> {
        if let Some(reason) = self.failure.read().clone() {
            return Err(MediatedTransferError::Dispatch(format!(
                "{}: {}",
                event.tag(),
                reason
            )));
        }
        debug!("[pcn] Dispatching {}", event.tag());
        self.dispatched.write().push(event);
        Ok(())
    }
}
