//! # Test Network
//!
//! A line of nodes, each running its own [`TransferService`], where node
//! `i` and node `i + 1` share channel `i + 1`. Send effects are signed by
//! the emitting node and delivered to the recipient as the matching state
//! change; every other effect stays with its emitter.

use pcn_mediated_transfer::adapters::{InMemoryChannelLedger, RecordingDispatcher};
use pcn_mediated_transfer::test_utils::{
    address, address_of, canonical_identifier, keypair, token_address, token_network_address,
    DEPOSIT,
};
use pcn_mediated_transfer::{
    BalanceProof, Event, MediatedTransferApi, MediatedTransferConfig, MediatedTransferError,
    RouteState, StateChange, TransferDescriptionParams, TransferDescriptionWithSecretState,
    TransferService,
};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, BlockNumber, Secret, SecretHash, U256};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Service type every node runs.
pub type NodeService = TransferService<InMemoryChannelLedger, RecordingDispatcher>;

/// One participant.
pub struct Node {
    /// Signing key.
    pub keypair: Secp256k1KeyPair,
    /// Node address, derived from the key.
    pub address: Address,
    /// Our channel ends.
    pub ledger: Arc<InMemoryChannelLedger>,
    /// Dispatched effects.
    pub dispatcher: Arc<RecordingDispatcher>,
    /// The node's transfer service.
    pub service: NodeService,
    /// Next hops offered when this node mediates.
    pub routes: Vec<RouteState>,
}

/// A state change the recipient rejected.
#[derive(Debug)]
pub struct Rejection {
    /// Rejecting node.
    pub node: Address,
    /// Tag of the rejected change.
    pub state_change: &'static str,
    /// Why.
    pub error: MediatedTransferError,
}

/// In-process network of nodes in a line.
pub struct Network {
    nodes: Vec<Node>,
    withheld: Vec<(Address, &'static str)>,
    /// Effects that were not delivered, with their emitter.
    pub held_back: Vec<(Address, Event)>,
    /// State changes a node refused.
    pub rejected: Vec<Rejection>,
}

impl Network {
    /// Build a line over `keys`, in order, with default configuration.
    pub fn line(keys: &[[u8; 32]]) -> Self {
        Self::line_with_config(keys, MediatedTransferConfig::default())
    }

    /// Build a line over `keys` with `config` on every node.
    pub fn line_with_config(keys: &[[u8; 32]], config: MediatedTransferConfig) -> Self {
        let addresses: Vec<Address> = keys.iter().map(|key| address_of(*key)).collect();
        let nodes = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let ledger = Arc::new(InMemoryChannelLedger::new());
                let mut routes = Vec::new();
                if index > 0 {
                    open(&ledger, addresses[index - 1], index as u64);
                }
                if index + 1 < keys.len() {
                    let channel = index as u64 + 1;
                    open(&ledger, addresses[index + 1], channel);
                    routes.push(RouteState::new(addresses[index + 1], U256::from(channel)));
                }
                let dispatcher = Arc::new(RecordingDispatcher::new());
                let service = TransferService::with_seed(
                    config.clone(),
                    addresses[index],
                    ledger.clone(),
                    dispatcher.clone(),
                    index as u64,
                )
                .expect("valid config");
                Node {
                    keypair: keypair(*key),
                    address: addresses[index],
                    ledger,
                    dispatcher,
                    service,
                    routes,
                }
            })
            .collect();

        Self {
            nodes,
            withheld: Vec::new(),
            held_back: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Node at `index` in the line.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Address of the node at `index`.
    pub fn address(&self, index: usize) -> Address {
        self.nodes[index].address
    }

    /// Stop delivering effects tagged `tag` emitted by `from`.
    pub fn withhold(&mut self, from: Address, tag: &'static str) {
        self.withheld.push((from, tag));
    }

    /// Payment of `amount` from the first to the last node, locked by
    /// `secret`.
    pub fn description(&self, amount: u64, secret: Secret) -> TransferDescriptionWithSecretState {
        let last = self.nodes.len() - 1;
        TransferDescriptionWithSecretState::new(TransferDescriptionParams {
            payment_network_identifier: address(7),
            payment_identifier: 1,
            amount: U256::from(amount),
            allocated_fee: U256::zero(),
            token_network_identifier: token_network_address(),
            initiator: self.address(0),
            target: self.address(last),
            secret: Some(secret),
            secrethash: None,
        })
        .expect("valid description")
    }

    /// Start a payment at the first node and deliver every resulting
    /// message. Returns the payment's secrethash.
    pub async fn pay(&mut self, amount: u64, secret: Secret) -> SecretHash {
        let transfer = self.description(amount, secret);
        let secrethash = transfer.secrethash();
        let change = StateChange::ActionInitInitiator {
            transfer,
            routes: self.nodes[0].routes.clone(),
        };
        self.send(self.address(0), change).await;
        secrethash
    }

    /// Apply `change` at `to` and deliver every resulting message.
    pub async fn send(&mut self, to: Address, change: StateChange) {
        let mut queue = VecDeque::from([(to, change)]);
        self.pump(&mut queue).await;
    }

    /// Move every node to `block_number`, then deliver the messages the new
    /// block produced.
    pub async fn advance(&mut self, block_number: BlockNumber) {
        let mut queue = VecDeque::new();
        for index in 0..self.nodes.len() {
            let at = self.address(index);
            let events = self.apply(at, StateChange::Block { block_number }).await;
            self.route(at, events, &mut queue);
        }
        self.pump(&mut queue).await;
    }

    /// Whether no node has a live task.
    pub fn is_idle(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| node.service.active_secrethashes().is_empty())
    }

    /// Tags of every effect `index` dispatched.
    pub fn effect_tags(&self, index: usize) -> Vec<&'static str> {
        self.nodes[index]
            .dispatcher
            .dispatched()
            .iter()
            .map(Event::tag)
            .collect()
    }

    async fn pump(&mut self, queue: &mut VecDeque<(Address, StateChange)>) {
        while let Some((to, change)) = queue.pop_front() {
            let events = self.apply(to, change).await;
            self.route(to, events, queue);
        }
    }

    async fn apply(&mut self, to: Address, change: StateChange) -> Vec<Event> {
        let tag = change.tag();
        let result = self.find(to).service.handle_state_change(change).await;
        match result {
            Ok(events) => events,
            Err(error) => {
                debug!("[pcn] {} rejected {}: {}", to, tag, error);
                self.rejected.push(Rejection {
                    node: to,
                    state_change: tag,
                    error,
                });
                Vec::new()
            }
        }
    }

    fn route(
        &mut self,
        from: Address,
        events: Vec<Event>,
        queue: &mut VecDeque<(Address, StateChange)>,
    ) {
        for event in events {
            if self.withheld.contains(&(from, event.tag())) {
                self.held_back.push((from, event));
                continue;
            }
            if let Some(delivery) = self.deliver(from, &event) {
                queue.push_back(delivery);
            }
        }
    }

    /// The state change `event`, sent by `from`, causes at its recipient.
    fn deliver(&self, from: Address, event: &Event) -> Option<(Address, StateChange)> {
        let sender = self.find(from);
        let message_hash = event.message_hash();
        match event {
            Event::SendLockedTransfer {
                recipient,
                message_identifier,
                transfer,
            } => {
                let signed = transfer
                    .sign(*message_identifier, &sender.keypair)
                    .expect("signing succeeds");
                let route = RouteState::new(from, signed.balance_proof().channel_identifier());
                let change = if signed.target() == *recipient {
                    StateChange::ActionInitTarget {
                        route,
                        transfer: signed,
                    }
                } else {
                    StateChange::ActionInitMediator {
                        from_route: route,
                        from_transfer: signed,
                        routes: self.find(*recipient).routes.clone(),
                    }
                };
                Some((*recipient, change))
            }
            Event::SendSecretRequest {
                recipient,
                payment_identifier,
                amount,
                expiration,
                secrethash,
                ..
            } => Some((
                *recipient,
                StateChange::ReceiveSecretRequest {
                    payment_identifier: *payment_identifier,
                    amount: *amount,
                    expiration: *expiration,
                    secrethash: *secrethash,
                    sender: from,
                },
            )),
            Event::SendSecretReveal {
                recipient, secret, ..
            } => Some((
                *recipient,
                StateChange::ReceiveSecretReveal {
                    secret: secret.clone(),
                    sender: from,
                },
            )),
            Event::SendBalanceProof {
                recipient,
                message_identifier,
                secret,
                balance_proof,
                ..
            } => {
                let signed = balance_proof
                    .sign(message_hash?, &sender.keypair)
                    .expect("signing succeeds");
                Some((
                    *recipient,
                    StateChange::ReceiveUnlock {
                        message_identifier: *message_identifier,
                        secret: secret.clone(),
                        balance_proof: signed,
                    },
                ))
            }
            Event::SendLockExpired {
                recipient,
                message_identifier,
                balance_proof,
                secrethash,
            } => {
                let signed = balance_proof
                    .sign(message_hash?, &sender.keypair)
                    .expect("signing succeeds");
                Some((
                    *recipient,
                    StateChange::ReceiveLockExpired {
                        message_identifier: *message_identifier,
                        secrethash: *secrethash,
                        balance_proof: signed,
                    },
                ))
            }
            _ => None,
        }
    }

    fn find(&self, address: Address) -> &Node {
        self.nodes
            .iter()
            .find(|node| node.address == address)
            .expect("node in network")
    }
}

fn open(ledger: &InMemoryChannelLedger, partner: Address, channel: u64) {
    ledger.open_channel(
        canonical_identifier(channel),
        token_address(),
        partner,
        U256::from(DEPOSIT),
    );
}
