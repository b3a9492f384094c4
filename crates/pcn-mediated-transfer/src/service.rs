//! # Transfer Service
//!
//! Drives the role reducers for every transfer this node takes part in.
//!
//! ## Architecture
//!
//! The service implements the inbound [`MediatedTransferApi`] port and
//! depends on two outbound ports:
//! - [`ChannelLedger`]: our channel ends, read by the reducers and updated
//!   with every effect they emit
//! - [`EffectDispatcher`]: delivery of the emitted effects
//!
//! ## Task Routing
//!
//! Tasks are keyed by secrethash. An initiator payment answers to the
//! secrethash of each of its attempts. `Block` and
//! `ContractReceiveChannelBatchUnlock` carry no secrethash and are applied
//! to every live task.

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::algorithms::{initiator, mediator, target, TransitionContext, TransitionResult};
use crate::config::MediatedTransferConfig;
use crate::domain::{MediatedTransferError, MediatedTransferResult, TransferTask};
use crate::events::{Event, StateChange};
use crate::ports::{ChannelLedger, EffectDispatcher, MediatedTransferApi};
use async_trait::async_trait;
use pcn_telemetry::log_transfer_event;
use rand::RngCore;
use shared_types::{Address, BlockNumber, SecretHash};
use tracing::{debug, warn};

type TaskId = u64;

#[derive(Default)]
struct ServiceState {
    block_number: BlockNumber,
    next_task_id: TaskId,
    tasks: BTreeMap<TaskId, TransferTask>,
    index: HashMap<SecretHash, TaskId>,
}

impl ServiceState {
    fn unindex(&mut self, task_id: TaskId) {
        self.index.retain(|_, id| *id != task_id);
    }

    fn store(&mut self, task_id: TaskId, task: Option<TransferTask>) {
        self.unindex(task_id);
        match task {
            Some(task) => {
                for secrethash in task.secrethashes() {
                    self.index.insert(secrethash, task_id);
                }
                self.tasks.insert(task_id, task);
            }
            None => {
                self.tasks.remove(&task_id);
            }
        }
    }
}

/// Mediated transfer service.
///
/// ## Thread Safety
///
/// Tasks are updated under a single writer lock. The effects of a
/// transition are written to the ledger in one batch before the task is
/// stored, so a failed transition or ledger write leaves both as they were.
/// Effects are dispatched after the lock is released; a dispatch failure
/// hands back the undelivered effects.
pub struct TransferService<L, D>
where
    L: ChannelLedger,
    D: EffectDispatcher,
{
    /// Protocol parameters.
    config: MediatedTransferConfig,
    /// This node.
    our_address: Address,
    /// Our channel ends.
    channels: Arc<L>,
    /// Effect delivery.
    dispatcher: Arc<D>,
    /// Live tasks and the latest block.
    state: RwLock<ServiceState>,
    /// Source of outgoing message identifiers.
    rng: Mutex<StdRng>,
}

impl<L, D> TransferService<L, D>
where
    L: ChannelLedger,
    D: EffectDispatcher,
{
    /// Create a service for `our_address`.
    pub fn new(
        config: MediatedTransferConfig,
        our_address: Address,
        channels: Arc<L>,
        dispatcher: Arc<D>,
    ) -> MediatedTransferResult<Self> {
        Self::build(config, our_address, channels, dispatcher, StdRng::from_entropy())
    }

    /// Same as [`TransferService::new`] with message identifiers drawn from
    /// an RNG seeded with `seed`.
    pub fn with_seed(
        config: MediatedTransferConfig,
        our_address: Address,
        channels: Arc<L>,
        dispatcher: Arc<D>,
        seed: u64,
    ) -> MediatedTransferResult<Self> {
        Self::build(
            config,
            our_address,
            channels,
            dispatcher,
            StdRng::seed_from_u64(seed),
        )
    }

    fn build(
        config: MediatedTransferConfig,
        our_address: Address,
        channels: Arc<L>,
        dispatcher: Arc<D>,
        rng: StdRng,
    ) -> MediatedTransferResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            our_address,
            channels,
            dispatcher,
            state: RwLock::new(ServiceState::default()),
            rng: Mutex::new(rng),
        })
    }

    /// This node.
    pub fn our_address(&self) -> Address {
        self.our_address
    }

    /// Protocol parameters.
    pub fn config(&self) -> &MediatedTransferConfig {
        &self.config
    }

    /// Run the reducers for `state_change` and commit the outcome.
    fn apply(&self, state_change: &StateChange) -> MediatedTransferResult<Vec<Event>> {
        let mut state = self.state.write();
        let mut rng = self.rng.lock();

        if let StateChange::Block { block_number } = state_change {
            if *block_number < state.block_number {
                return Err(MediatedTransferError::InvalidStateChange(format!(
                    "block {} is older than {}",
                    block_number, state.block_number
                )));
            }
            state.block_number = *block_number;
        }

        let ctx = TransitionContext {
            our_address: self.our_address,
            block_number: state.block_number,
            config: &self.config,
            channels: self.channels.as_ref(),
        };

        match state_change.secrethash() {
            None => Ok(self.broadcast(&mut state, state_change, &ctx, &mut *rng)),
            Some(secrethash) if state_change.is_init() => {
                if state.index.contains_key(&secrethash) {
                    return Err(MediatedTransferError::InvalidStateChange(format!(
                        "task for {} already exists",
                        secrethash
                    )));
                }
                let (task, events) = transition(None, state_change, &ctx, &mut *rng)?;
                self.record(&events)?;

                let task_id = state.next_task_id;
                state.next_task_id += 1;
                if let Some(task) = &task {
                    log_transfer_event!(
                        info,
                        task.role().as_str(),
                        "[pcn] Task created",
                        secrethash,
                        task_id = task_id
                    );
                }
                state.store(task_id, task);
                Ok(events)
            }
            Some(secrethash) => {
                let task_id = *state.index.get(&secrethash).ok_or_else(|| {
                    MediatedTransferError::InvalidStateChange(format!(
                        "no task for {} to apply {}",
                        secrethash,
                        state_change.tag()
                    ))
                })?;
                let task = state.tasks.get(&task_id).cloned();
                let (task, events) = transition(task, state_change, &ctx, &mut *rng)?;
                self.record(&events)?;
                if task.is_none() {
                    debug!("[pcn] Task {} for {} finished", task_id, secrethash);
                }
                state.store(task_id, task);
                Ok(events)
            }
        }
    }

    /// Apply a change without secrethash to every task. A task whose
    /// transition fails is kept as it was.
    fn broadcast(
        &self,
        state: &mut ServiceState,
        state_change: &StateChange,
        ctx: &TransitionContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Vec<Event> {
        let task_ids: Vec<TaskId> = state.tasks.keys().copied().collect();
        let mut events = Vec::new();
        for task_id in task_ids {
            let task = state.tasks.get(&task_id).cloned();
            let outcome = transition(task, state_change, ctx, rng)
                .and_then(|(task, produced)| self.record(&produced).map(|_| (task, produced)));
            match outcome {
                Ok((task, produced)) => {
                    if task.is_none() {
                        debug!("[pcn] Task {} finished on {}", task_id, state_change.tag());
                    }
                    state.store(task_id, task);
                    events.extend(produced);
                }
                Err(e) => warn!(
                    "[pcn] Task {} rejected {}: {}",
                    task_id,
                    state_change.tag(),
                    e
                ),
            }
        }
        events
    }

    fn record(&self, events: &[Event]) -> MediatedTransferResult<()> {
        self.channels.record_all(events)
    }
}

/// Route `state_change` to the reducer of `task`'s role, or of the role the
/// init change starts.
fn transition(
    task: Option<TransferTask>,
    state_change: &StateChange,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<(Option<TransferTask>, Vec<Event>)> {
    match task {
        Some(TransferTask::Initiator(payment)) => Ok(lift(
            initiator::state_transition(Some(payment), state_change, ctx, rng)?,
            TransferTask::Initiator,
        )),
        Some(TransferTask::Mediator(mediator)) => Ok(lift(
            mediator::state_transition(Some(mediator), state_change, ctx, rng)?,
            TransferTask::Mediator,
        )),
        Some(TransferTask::Target(target)) => Ok(lift(
            target::state_transition(Some(target), state_change, ctx, rng)?,
            TransferTask::Target,
        )),
        None => match state_change {
            StateChange::ActionInitInitiator { .. } => Ok(lift(
                initiator::state_transition(None, state_change, ctx, rng)?,
                TransferTask::Initiator,
            )),
            StateChange::ActionInitMediator { .. } => Ok(lift(
                mediator::state_transition(None, state_change, ctx, rng)?,
                TransferTask::Mediator,
            )),
            StateChange::ActionInitTarget { .. } => Ok(lift(
                target::state_transition(None, state_change, ctx, rng)?,
                TransferTask::Target,
            )),
            other => Err(MediatedTransferError::InvalidStateChange(format!(
                "{} does not start a task",
                other.tag()
            ))),
        },
    }
}

fn lift<S>(
    result: TransitionResult<S>,
    wrap: fn(S) -> TransferTask,
) -> (Option<TransferTask>, Vec<Event>) {
    (result.new_state.map(wrap), result.events)
}

#[async_trait]
impl<L, D> MediatedTransferApi for TransferService<L, D>
where
    L: ChannelLedger + 'static,
    D: EffectDispatcher + 'static,
{
    async fn handle_state_change(
        &self,
        state_change: StateChange,
    ) -> MediatedTransferResult<Vec<Event>> {
        let events = self.apply(&state_change)?;
        for (index, event) in events.iter().enumerate() {
            if let Err(error) = self.dispatcher.dispatch(event.clone()).await {
                warn!(
                    "[pcn] Dispatch of {} failed, {} effects undelivered: {}",
                    event.tag(),
                    events.len() - index,
                    error
                );
                return Err(MediatedTransferError::Undelivered {
                    source: Box::new(error),
                    undelivered: events[index..].to_vec(),
                });
            }
        }
        Ok(events)
    }

    fn task(&self, secrethash: &SecretHash) -> Option<TransferTask> {
        let state = self.state.read();
        state
            .index
            .get(secrethash)
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned()
    }

    fn active_secrethashes(&self) -> Vec<SecretHash> {
        let mut secrethashes: Vec<SecretHash> = self.state.read().index.keys().copied().collect();
        secrethashes.sort();
        secrethashes
    }

    fn block_number(&self) -> BlockNumber {
        self.state.read().block_number
    }
}
