//! # Initiator Reducer
//!
//! Sends the first lock, answers the target's secret request and unlocks
//! the first hop once it reveals the secret. Expired or refunded attempts
//! are cancelled; a refund with a cancelled route starts a new attempt with
//! a fresh secret.

use super::{next_message_id, TransitionContext, TransitionResult};
use crate::domain::{
    secrethash_of, HashTimeLock, InitiatorPaymentState, InitiatorTransferState,
    InitiatorTransferStatus, LockedTransferSignedState, LockedTransferUnsignedState,
    MediatedTransferError, MediatedTransferResult, RouteState, TransferDescriptionWithSecretState,
};
use crate::events::{Event, StateChange};
use crate::ports::ChannelView;
use pcn_telemetry::log_transfer_event;
use rand::RngCore;
use shared_types::{
    Address, BlockExpiration, BlockNumber, ChannelId, PaymentAmount, PaymentId, Secret,
    SecretHash, ValidationError,
};

const ROLE: &str = "initiator";

/// Apply `state_change` to the initiator payment `state`.
pub fn state_transition(
    state: Option<InitiatorPaymentState>,
    state_change: &StateChange,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    match (state, state_change) {
        (None, StateChange::ActionInitInitiator { transfer, routes }) => {
            handle_init(transfer, routes, ctx, rng)
        }
        (None, other) => Err(MediatedTransferError::InvalidStateChange(format!(
            "no initiator payment for {}",
            other.tag()
        ))),
        (Some(_), StateChange::ActionInitInitiator { transfer, .. }) => {
            Err(MediatedTransferError::InvalidStateChange(format!(
                "payment {} already started",
                transfer.secrethash()
            )))
        }
        (Some(payment), StateChange::Block { block_number }) => {
            handle_block(payment, *block_number, ctx, rng)
        }
        (
            Some(payment),
            StateChange::ReceiveSecretRequest {
                payment_identifier,
                amount,
                expiration,
                secrethash,
                sender,
            },
        ) => handle_secret_request(
            payment,
            SecretRequest {
                payment_identifier: *payment_identifier,
                amount: *amount,
                expiration: *expiration,
                secrethash: *secrethash,
                sender: *sender,
            },
            ctx,
            rng,
        ),
        (Some(payment), StateChange::ReceiveSecretReveal { secret, sender }) => {
            handle_secret_reveal(payment, secret, Some(*sender), ctx.block_number, ctx, rng)
        }
        (
            Some(payment),
            StateChange::ContractReceiveSecretReveal {
                secret,
                block_number,
                ..
            },
        ) => handle_secret_reveal(payment, secret, None, *block_number, ctx, rng),
        (
            Some(payment),
            StateChange::ReceiveTransferRefundCancelRoute {
                transfer,
                routes,
                secret,
            },
        ) => handle_cancel_route(payment, transfer, routes, secret, ctx, rng),
        (Some(payment), StateChange::ContractReceiveChannelBatchUnlock { .. }) => {
            Ok(TransitionResult::unchanged(payment))
        }
        (Some(_), other) => Err(MediatedTransferError::UnsupportedStateChange {
            role: ROLE,
            state_change: other.tag(),
        }),
    }
}

struct SecretRequest {
    payment_identifier: PaymentId,
    amount: PaymentAmount,
    expiration: BlockExpiration,
    secrethash: SecretHash,
    sender: Address,
}

/// First route, in order, that is not cancelled and can carry `amount`.
fn select_route(
    routes: &[RouteState],
    cancelled_channels: &[ChannelId],
    description: &TransferDescriptionWithSecretState,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<(RouteState, ChannelView)> {
    let amount = description.amount_with_fee()?;
    routes
        .iter()
        .filter(|route| !cancelled_channels.contains(&route.channel_identifier))
        .find_map(|route| {
            let view = ctx.channels.channel(route.channel_identifier)?;
            let usable = view.partner_address == route.node_address
                && view.canonical_identifier.chain_identifier == ctx.config.chain_id
                && view.canonical_identifier.token_network_address
                    == description.token_network_identifier()
                && view.is_usable_for(&amount);
            usable.then(|| (route.clone(), view))
        })
        .ok_or(MediatedTransferError::RoutesExhausted {
            secrethash: description.secrethash(),
        })
}

/// Build an attempt for `description` over the first usable route.
fn new_attempt(
    description: &TransferDescriptionWithSecretState,
    routes: &[RouteState],
    cancelled_channels: &[ChannelId],
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<(InitiatorTransferState, Event)> {
    if description.initiator() != ctx.our_address {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "payment initiator {} is not this node",
            description.initiator()
        )));
    }
    if description.secret().is_none() {
        return Err(MediatedTransferError::InvalidStateChange(
            "initiator needs the payment secret".to_string(),
        ));
    }

    let (route, view) = select_route(routes, cancelled_channels, description, ctx)?;
    let expiration = ctx
        .block_number
        .checked_add(ctx.config.lock_timeout)
        .ok_or(ValidationError::ArithmeticOverflow {
            context: "lock expiration",
        })?;
    let lock = HashTimeLock::new(
        description.amount_with_fee()?,
        expiration,
        description.secrethash(),
    );
    let balance_proof = ctx
        .channels
        .balance_proof_with_lock(route.channel_identifier, &lock)?;
    let transfer = LockedTransferUnsignedState::new(
        description.payment_identifier(),
        view.token_address,
        balance_proof,
        lock,
        description.initiator(),
        description.target(),
    )?;
    let attempt = InitiatorTransferState::new(description.clone(), route.clone(), transfer.clone())?;

    log_transfer_event!(
        debug,
        ROLE,
        "[pcn] Sending locked transfer",
        description.secrethash(),
        recipient = %route.node_address,
        channel = %route.channel_identifier,
        expiration = expiration
    );

    let event = Event::SendLockedTransfer {
        recipient: route.node_address,
        message_identifier: next_message_id(rng),
        transfer,
    };
    Ok((attempt, event))
}

fn handle_init(
    description: &TransferDescriptionWithSecretState,
    routes: &[RouteState],
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    let (attempt, event) = new_attempt(description, routes, &[], ctx, rng)?;
    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Payment started",
        description.secrethash(),
        target = %description.target(),
        amount = %description.amount()
    );
    Ok(TransitionResult::new(
        Some(InitiatorPaymentState::new(attempt)),
        vec![event],
    ))
}

fn handle_secret_request(
    mut payment: InitiatorPaymentState,
    request: SecretRequest,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    let Some(attempt) = payment.transfer_mut(&request.secrethash) else {
        return Ok(TransitionResult::unchanged(payment));
    };
    let description = attempt.transfer_description().clone();

    if request.sender != description.target() {
        log_transfer_event!(
            warn,
            ROLE,
            "[pcn] Ignoring secret request from a node other than the target",
            request.secrethash,
            sender = %request.sender
        );
        return Ok(TransitionResult::unchanged(payment));
    }
    if attempt.transfer_state() != InitiatorTransferStatus::Pending
        || attempt.received_secret_request()
    {
        return Ok(TransitionResult::unchanged(payment));
    }

    let lock = attempt.transfer().lock();
    let valid = request.payment_identifier == description.payment_identifier()
        && request.amount == description.amount()
        && request.expiration == lock.expiration
        && !lock.is_expired(ctx.block_number);

    if !valid {
        attempt.set_transfer_state(InitiatorTransferStatus::Cancelled)?;
        log_transfer_event!(
            warn,
            ROLE,
            "[pcn] Invalid secret request, attempt cancelled",
            request.secrethash
        );
        let event = Event::PaymentSentFailed {
            payment_network_identifier: description.payment_network_identifier(),
            token_network_identifier: description.token_network_identifier(),
            identifier: description.payment_identifier(),
            target: description.target(),
            reason: "bad secret request message from target".to_string(),
        };
        return Ok(TransitionResult::new(Some(payment), vec![event]));
    }

    let Some(secret) = description.secret().cloned() else {
        return Err(MediatedTransferError::InvalidStateChange(
            "attempt has no secret to reveal".to_string(),
        ));
    };
    attempt.mark_secret_request_received();
    log_transfer_event!(debug, ROLE, "[pcn] Revealing secret to target", request.secrethash);

    let event = Event::SendSecretReveal {
        recipient: description.target(),
        message_identifier: next_message_id(rng),
        secret,
    };
    Ok(TransitionResult::new(Some(payment), vec![event]))
}

/// Off-chain reveal from the first hop (`sender` set) or on-chain
/// registration at `revealed_at`.
fn handle_secret_reveal(
    mut payment: InitiatorPaymentState,
    secret: &Secret,
    sender: Option<Address>,
    revealed_at: BlockNumber,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    let secrethash = secrethash_of(secret);
    let Some(attempt) = payment.transfer_mut(&secrethash) else {
        return Ok(TransitionResult::unchanged(payment));
    };
    if attempt.transfer_state() != InitiatorTransferStatus::Pending {
        return Ok(TransitionResult::unchanged(payment));
    }
    if let Some(sender) = sender {
        if sender != attempt.route().node_address {
            log_transfer_event!(
                warn,
                ROLE,
                "[pcn] Ignoring secret reveal from a node other than the first hop",
                secrethash,
                sender = %sender
            );
            return Ok(TransitionResult::unchanged(payment));
        }
    }
    if attempt.transfer().lock().is_expired(revealed_at) {
        log_transfer_event!(warn, ROLE, "[pcn] Secret revealed after lock expiry", secrethash);
        return Ok(TransitionResult::unchanged(payment));
    }

    attempt.set_transfer_state(InitiatorTransferStatus::SecretRevealed)?;

    let description = attempt.transfer_description().clone();
    let transfer = attempt.transfer().clone();
    let balance_proof = ctx
        .channels
        .balance_proof_with_unlock(attempt.channel_identifier(), &secrethash)?;

    let events = vec![
        Event::SendBalanceProof {
            recipient: attempt.route().node_address,
            message_identifier: next_message_id(rng),
            payment_identifier: description.payment_identifier(),
            token_address: transfer.token(),
            secret: secret.clone(),
            secrethash,
            balance_proof,
        },
        Event::PaymentSentSuccess {
            payment_network_identifier: description.payment_network_identifier(),
            token_network_identifier: description.token_network_identifier(),
            identifier: description.payment_identifier(),
            amount: description.amount(),
            target: description.target(),
            secret: secret.clone(),
        },
        Event::UnlockSuccess {
            identifier: description.payment_identifier(),
            secrethash,
        },
    ];

    log_transfer_event!(info, ROLE, "[pcn] Payment sent", secrethash);
    Ok(finish_if_done(payment, events))
}

fn handle_block(
    mut payment: InitiatorPaymentState,
    block_number: BlockNumber,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    let mut events = Vec::new();
    let mut expired_channels = Vec::new();

    for attempt in payment.transfers_mut() {
        let lock = attempt.transfer().lock().clone();
        if attempt.lock_expired() || !lock.is_expired(block_number) {
            continue;
        }
        let state = attempt.transfer_state();
        if state == InitiatorTransferStatus::SecretRevealed {
            continue;
        }

        let balance_proof = ctx
            .channels
            .balance_proof_with_expired(attempt.channel_identifier(), &lock.secrethash)?;
        events.push(Event::SendLockExpired {
            recipient: attempt.route().node_address,
            message_identifier: next_message_id(rng),
            balance_proof,
            secrethash: lock.secrethash,
        });
        attempt.mark_lock_expired();

        if state == InitiatorTransferStatus::Pending {
            let description = attempt.transfer_description();
            events.push(Event::UnlockFailed {
                identifier: description.payment_identifier(),
                secrethash: lock.secrethash,
                reason: "lock expired".to_string(),
            });
            events.push(Event::PaymentSentFailed {
                payment_network_identifier: description.payment_network_identifier(),
                token_network_identifier: description.token_network_identifier(),
                identifier: description.payment_identifier(),
                target: description.target(),
                reason: "lock expired".to_string(),
            });
            attempt.set_transfer_state(InitiatorTransferStatus::Cancelled)?;
            expired_channels.push(attempt.channel_identifier());
            log_transfer_event!(
                info,
                ROLE,
                "[pcn] Attempt expired",
                lock.secrethash,
                block_number = block_number
            );
        }
    }

    for channel in expired_channels {
        payment.cancel_channel(channel);
    }
    Ok(finish_if_done(payment, events))
}

fn handle_cancel_route(
    mut payment: InitiatorPaymentState,
    refund: &LockedTransferSignedState,
    routes: &[RouteState],
    secret: &Secret,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
    let secrethash = refund.lock().secrethash;
    let attempt = payment.transfer_mut(&secrethash).ok_or_else(|| {
        MediatedTransferError::InvalidStateChange(format!("refund for unknown attempt {}", secrethash))
    })?;

    let original = attempt.transfer();
    let valid = attempt.transfer_state() == InitiatorTransferStatus::Pending
        && refund.payer_address() == attempt.route().node_address
        && refund.payment_identifier() == original.payment_identifier()
        && refund.lock().amount == original.lock().amount
        && refund.lock().expiration == original.lock().expiration;
    if !valid {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "refund does not match attempt {}",
            secrethash
        )));
    }

    attempt.set_transfer_state(InitiatorTransferStatus::Cancelled)?;
    let failed_route = attempt.route().clone();
    let retry = attempt.transfer_description().with_secret(secret.clone())?;
    payment.cancel_channel(failed_route.channel_identifier);

    let attempts = payment.initiator_transfers().len();
    if attempts >= ctx.config.max_attempts {
        return Err(MediatedTransferError::AttemptsExhausted {
            secrethash,
            attempts,
        });
    }

    let (next, send) = new_attempt(&retry, routes, payment.cancelled_channels(), ctx, rng)?;
    payment.add_transfer(next)?;

    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Route cancelled, retrying with a new secret",
        secrethash,
        retry_secrethash = %retry.secrethash()
    );
    let events = vec![
        Event::RouteFailed {
            secrethash,
            route: failed_route,
        },
        send,
    ];
    Ok(TransitionResult::new(Some(payment), events))
}

/// Every attempt is terminal and the lock of every cancelled attempt was
/// announced as expired.
fn is_finished(payment: &InitiatorPaymentState) -> bool {
    payment.is_resolved()
        && payment.initiator_transfers().values().all(|attempt| {
            attempt.transfer_state() != InitiatorTransferStatus::Cancelled || attempt.lock_expired()
        })
}

fn finish_if_done(
    payment: InitiatorPaymentState,
    events: Vec<Event>,
) -> TransitionResult<InitiatorPaymentState> {
    if is_finished(&payment) {
        TransitionResult::finished(events)
    } else {
        TransitionResult::new(Some(payment), events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChannelLedger;
    use crate::config::MediatedTransferConfig;
    use crate::ports::ChannelLedger;
    use crate::test_utils::{
        address, keypair, ledger_with_channels, make_description_params, seeded_rng, BOB_KEY,
    };
    use shared_types::U256;

    const SECRET: [u8; 32] = [0x11; 32];

    fn description() -> TransferDescriptionWithSecretState {
        TransferDescriptionWithSecretState::new(make_description_params(Some(Secret::new(SECRET))))
            .unwrap()
    }

    fn routes() -> Vec<RouteState> {
        vec![
            RouteState::new(address(2), U256::from(1)),
            RouteState::new(address(3), U256::from(2)),
        ]
    }

    fn ctx<'a>(
        config: &'a MediatedTransferConfig,
        ledger: &'a InMemoryChannelLedger,
        block_number: BlockNumber,
    ) -> TransitionContext<'a> {
        TransitionContext {
            our_address: address(1),
            block_number,
            config,
            channels: ledger,
        }
    }

    fn apply(
        state: Option<InitiatorPaymentState>,
        change: StateChange,
        ctx: &TransitionContext<'_>,
        ledger: &InMemoryChannelLedger,
    ) -> MediatedTransferResult<TransitionResult<InitiatorPaymentState>> {
        let result = state_transition(state, &change, ctx, &mut seeded_rng())?;
        for event in &result.events {
            ledger.record(event).unwrap();
        }
        Ok(result)
    }

    fn started(
        config: &MediatedTransferConfig,
        ledger: &InMemoryChannelLedger,
    ) -> InitiatorPaymentState {
        let init = StateChange::ActionInitInitiator {
            transfer: description(),
            routes: routes(),
        };
        apply(None, init, &ctx(config, ledger, 10), ledger)
            .unwrap()
            .new_state
            .unwrap()
    }

    #[test]
    fn test_init_sends_locked_transfer_on_first_route() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1), (address(3), 2)]);
        let init = StateChange::ActionInitInitiator {
            transfer: description(),
            routes: routes(),
        };
        let result = state_transition(None, &init, &ctx(&config, &ledger, 10), &mut seeded_rng())
            .unwrap();

        assert_eq!(result.events.len(), 1);
        match &result.events[0] {
            Event::SendLockedTransfer {
                recipient, transfer, ..
            } => {
                assert_eq!(*recipient, address(2));
                assert_eq!(transfer.lock().amount, U256::from(10));
                assert_eq!(transfer.lock().expiration, 10 + config.lock_timeout);
                assert_eq!(transfer.lock().secrethash, description().secrethash());
            }
            other => panic!("unexpected event {other:?}"),
        }
        let payment = result.new_state.unwrap();
        assert_eq!(payment.initiator_transfers().len(), 1);
    }

    #[test]
    fn test_init_skips_unusable_route() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1), (address(3), 2)]);
        ledger.close_channel(U256::from(1)).unwrap();
        let payment = started(&config, &ledger);
        let attempt = payment.initiator_transfers().values().next().unwrap();
        assert_eq!(attempt.channel_identifier(), U256::from(2));
    }

    #[test]
    fn test_init_without_routes_is_exhausted() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[]);
        let init = StateChange::ActionInitInitiator {
            transfer: description(),
            routes: routes(),
        };
        let err = state_transition(None, &init, &ctx(&config, &ledger, 10), &mut seeded_rng())
            .unwrap_err();
        assert!(matches!(err, MediatedTransferError::RoutesExhausted { .. }));
    }

    #[test]
    fn test_happy_path() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let secrethash = description().secrethash();
        let context = ctx(&config, &ledger, 11);

        let request = StateChange::ReceiveSecretRequest {
            payment_identifier: 1,
            amount: U256::from(10),
            expiration: 10 + config.lock_timeout,
            secrethash,
            sender: address(4),
        };
        let result = apply(Some(payment), request.clone(), &context, &ledger).unwrap();
        assert!(matches!(
            result.events.as_slice(),
            [Event::SendSecretReveal { recipient, .. }] if *recipient == address(4)
        ));
        let payment = result.new_state.unwrap();

        let duplicate = apply(Some(payment.clone()), request, &context, &ledger).unwrap();
        assert!(duplicate.events.is_empty());

        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address(2),
        };
        let result = apply(Some(payment), reveal, &context, &ledger).unwrap();
        assert!(result.new_state.is_none());
        let tags: Vec<_> = result.events.iter().map(Event::tag).collect();
        assert_eq!(
            tags,
            vec!["SendBalanceProof", "PaymentSentSuccess", "UnlockSuccess"]
        );
        assert_eq!(ledger.transferred_amount(U256::from(1)), Some(U256::from(10)));
    }

    #[test]
    fn test_reveal_without_request_rejected() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address(2),
        };
        let err = apply(Some(payment), reveal, &ctx(&config, &ledger, 11), &ledger).unwrap_err();
        assert!(matches!(
            err,
            MediatedTransferError::Transition(crate::domain::TransitionError::SecretRequestMissing)
        ));
    }

    #[test]
    fn test_bad_secret_request_cancels_attempt() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let request = StateChange::ReceiveSecretRequest {
            payment_identifier: 1,
            amount: U256::from(3),
            expiration: 10 + config.lock_timeout,
            secrethash: description().secrethash(),
            sender: address(4),
        };
        let result = apply(Some(payment), request, &ctx(&config, &ledger, 11), &ledger).unwrap();
        assert_eq!(result.events[0].tag(), "PaymentSentFailed");
        let payment = result.new_state.unwrap();
        let attempt = payment.transfer(&description().secrethash()).unwrap();
        assert_eq!(attempt.transfer_state(), InitiatorTransferStatus::Cancelled);
    }

    #[test]
    fn test_expiry_cancels_and_finishes() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let expiration = 10 + config.lock_timeout;

        let early = apply(
            Some(payment),
            StateChange::Block {
                block_number: expiration - 1,
            },
            &ctx(&config, &ledger, expiration - 1),
            &ledger,
        )
        .unwrap();
        assert!(early.events.is_empty());

        let result = apply(
            early.new_state,
            StateChange::Block {
                block_number: expiration,
            },
            &ctx(&config, &ledger, expiration),
            &ledger,
        )
        .unwrap();
        let tags: Vec<_> = result.events.iter().map(Event::tag).collect();
        assert_eq!(tags, vec!["SendLockExpired", "UnlockFailed", "PaymentSentFailed"]);
        assert!(result.new_state.is_none());
        assert!(ledger.pending_locks(U256::from(1)).is_empty());
    }

    #[test]
    fn test_cancel_route_retries_with_new_secret() {
        let config = MediatedTransferConfig::default();
        let bob = address_of(BOB_KEY);
        let ledger = ledger_with_channels(&[(bob, 7), (address(3), 2)]);
        let routes = vec![
            RouteState::new(bob, U256::from(7)),
            RouteState::new(address(3), U256::from(2)),
        ];
        let init = StateChange::ActionInitInitiator {
            transfer: description(),
            routes: routes.clone(),
        };
        let payment = apply(None, init, &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state
            .unwrap();
        let attempt = payment.initiator_transfers().values().next().unwrap();
        let refund = attempt.transfer().sign(5, &keypair(BOB_KEY)).unwrap();

        let cancel = StateChange::ReceiveTransferRefundCancelRoute {
            transfer: refund,
            routes,
            secret: Secret::new([0x22; 32]),
        };
        let result = apply(Some(payment), cancel, &ctx(&config, &ledger, 12), &ledger).unwrap();
        let tags: Vec<_> = result.events.iter().map(Event::tag).collect();
        assert_eq!(tags, vec!["RouteFailed", "SendLockedTransfer"]);
        assert!(matches!(
            &result.events[1],
            Event::SendLockedTransfer { recipient, .. } if *recipient == address(3)
        ));

        let payment = result.new_state.unwrap();
        assert_eq!(payment.initiator_transfers().len(), 2);
        assert_eq!(payment.cancelled_channels(), &[U256::from(7)]);
        let first = payment.transfer(&description().secrethash()).unwrap();
        assert_eq!(first.transfer_state(), InitiatorTransferStatus::Cancelled);
    }

    #[test]
    fn test_refund_from_other_node_rejected() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let attempt = payment.initiator_transfers().values().next().unwrap();
        let refund = attempt.transfer().sign(5, &keypair(BOB_KEY)).unwrap();

        let cancel = StateChange::ReceiveTransferRefundCancelRoute {
            transfer: refund,
            routes: routes(),
            secret: Secret::new([0x33; 32]),
        };
        assert!(matches!(
            apply(Some(payment), cancel, &ctx(&config, &ledger, 12), &ledger),
            Err(MediatedTransferError::InvalidStateChange(_))
        ));
    }

    #[test]
    fn test_plain_refund_unsupported() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[(address(2), 1)]);
        let payment = started(&config, &ledger);
        let transfer = crate::test_utils::make_signed_transfer(
            &keypair(BOB_KEY),
            description().secrethash(),
            10,
            110,
            1,
        );
        let refund = StateChange::ReceiveTransferRefund {
            transfer,
            routes: Vec::new(),
        };
        assert!(matches!(
            state_transition(Some(payment), &refund, &ctx(&config, &ledger, 11), &mut seeded_rng()),
            Err(MediatedTransferError::UnsupportedStateChange { role: "initiator", .. })
        ));
    }

    fn address_of(key: [u8; 32]) -> Address {
        Address::new(keypair(key).address())
    }
}
