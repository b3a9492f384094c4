//! # Mediator Reducer
//!
//! Forwards a received lock to the next hop and tracks both legs as one
//! [`MediationPairState`]. The secret travels back from payee to payer;
//! the payee is only paid once the payer side holds an enforceable claim.
//! Refunds start a new pair over the remaining routes.

use super::{
    is_safe_to_wait, next_message_id, rejected_balance_proof, TransitionContext, TransitionResult,
};
use crate::domain::{
    invariant_expires_lock, invariant_secret_matches, invariant_unlocks_lock, BalanceProof,
    BalanceProofSignedState, HashTimeLock, LockedTransferSignedState,
    LockedTransferUnsignedState, MediatedTransferError, MediatedTransferResult,
    MediationPairState, MediatorTransferState, PayeeState, PayerState, RouteState,
    WaitingTransferState, WaitingTransferStatus,
};
use crate::events::{Event, StateChange};
use crate::ports::ChannelView;
use pcn_telemetry::log_transfer_event;
use rand::RngCore;
use shared_types::{
    Address, BlockNumber, CanonicalIdentifier, LockedAmount, Secret, TokenNetworkAddress,
};

const ROLE: &str = "mediator";

/// Apply `state_change` to the mediator transfer `state`.
pub fn state_transition(
    state: Option<MediatorTransferState>,
    state_change: &StateChange,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    match (state, state_change) {
        (
            None,
            StateChange::ActionInitMediator {
                from_route,
                from_transfer,
                routes,
            },
        ) => handle_init(from_route, from_transfer, routes, ctx, rng),
        (None, other) => Err(MediatedTransferError::InvalidStateChange(format!(
            "no mediated transfer for {}",
            other.tag()
        ))),
        (Some(state), StateChange::ActionInitMediator { .. }) => {
            Err(MediatedTransferError::InvalidStateChange(format!(
                "transfer {} already mediated",
                state.secrethash()
            )))
        }
        (Some(state), StateChange::Block { block_number }) => {
            handle_block(state, *block_number, ctx, rng)
        }
        (Some(state), StateChange::ReceiveSecretReveal { secret, sender }) => {
            handle_secret_reveal(state, secret, *sender, ctx, rng)
        }
        (
            Some(state),
            StateChange::ReceiveUnlock {
                secret,
                balance_proof,
                ..
            },
        ) => handle_unlock(state, secret, balance_proof, ctx, rng),
        (Some(state), StateChange::ReceiveLockExpired { balance_proof, .. }) => {
            handle_lock_expired(state, balance_proof, ctx)
        }
        (Some(state), StateChange::ReceiveTransferRefund { transfer, routes }) => {
            handle_refund(state, transfer, routes, ctx, rng)
        }
        (
            Some(state),
            StateChange::ContractReceiveSecretReveal {
                secret,
                block_number,
                ..
            },
        ) => handle_onchain_secret_reveal(state, secret, *block_number, ctx, rng),
        (
            Some(state),
            StateChange::ContractReceiveChannelBatchUnlock {
                canonical_identifier,
                receiver,
                sender,
                ..
            },
        ) => handle_batch_unlock(state, canonical_identifier, *receiver, *sender, ctx),
        (Some(_), other) => Err(MediatedTransferError::UnsupportedStateChange {
            role: ROLE,
            state_change: other.tag(),
        }),
    }
}

/// First available route, in order, whose channel can lock `amount`.
fn select_route(
    state: &MediatorTransferState,
    payer: &Address,
    token_network: TokenNetworkAddress,
    amount: &LockedAmount,
    ctx: &TransitionContext<'_>,
) -> Option<(RouteState, ChannelView)> {
    state.available_routes(payer).into_iter().find_map(|route| {
        let view = ctx.channels.channel(route.channel_identifier)?;
        let usable = view.partner_address == route.node_address
            && view.canonical_identifier.token_network_address == token_network
            && view.is_usable_for(amount);
        usable.then(|| (route.clone(), view))
    })
}

/// Lock `payer_transfer` towards the next usable route and record the pair.
///
/// `None` when no route is usable or the payer's lock is too close to its
/// expiration to be forwarded safely.
fn forward_transfer(
    state: &mut MediatorTransferState,
    payer_transfer: &LockedTransferSignedState,
    block_number: BlockNumber,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<Option<Event>> {
    let lock = payer_transfer.lock();
    if !is_safe_to_wait(lock.expiration, ctx.config.reveal_timeout, block_number) {
        return Ok(None);
    }

    let payer = payer_transfer.payer_address();
    let token_network = payer_transfer
        .balance_proof()
        .canonical_identifier()
        .token_network_address;
    let Some((route, view)) = select_route(state, &payer, token_network, &lock.amount, ctx) else {
        return Ok(None);
    };

    let payee_lock = HashTimeLock::new(lock.amount, lock.expiration, lock.secrethash);
    let balance_proof = ctx
        .channels
        .balance_proof_with_lock(route.channel_identifier, &payee_lock)?;
    let payee_transfer = LockedTransferUnsignedState::new(
        payer_transfer.payment_identifier(),
        view.token_address,
        balance_proof,
        payee_lock,
        payer_transfer.initiator(),
        payer_transfer.target(),
    )?;
    state.push_pair(MediationPairState::new(
        payer_transfer.clone(),
        route.node_address,
        payee_transfer.clone(),
    )?)?;

    log_transfer_event!(
        debug,
        ROLE,
        "[pcn] Forwarding locked transfer",
        lock.secrethash,
        payer = %payer,
        payee = %route.node_address,
        channel = %route.channel_identifier,
        pairs = state.transfers_pair().len()
    );

    Ok(Some(Event::SendLockedTransfer {
        recipient: route.node_address,
        message_identifier: next_message_id(rng),
        transfer: payee_transfer,
    }))
}

fn handle_init(
    from_route: &RouteState,
    from_transfer: &LockedTransferSignedState,
    routes: &[RouteState],
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = from_transfer.lock().secrethash;
    let canonical = from_transfer.balance_proof().canonical_identifier();

    if canonical.chain_identifier != ctx.config.chain_id {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "transfer for chain {} received on chain {}",
            canonical.chain_identifier, ctx.config.chain_id
        )));
    }
    if from_route.node_address != from_transfer.payer_address()
        || from_route.channel_identifier != canonical.channel_identifier
    {
        return Err(MediatedTransferError::InvalidStateChange(
            "transfer did not arrive over its route".to_string(),
        ));
    }
    if from_transfer.target() == ctx.our_address {
        return Err(MediatedTransferError::InvalidStateChange(
            "transfer addressed to this node cannot be mediated".to_string(),
        ));
    }
    if from_transfer.lock().is_expired(ctx.block_number) {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "received lock {} already expired",
            secrethash
        )));
    }

    let mut state = MediatorTransferState::new(secrethash, routes.to_vec());
    let mut events = Vec::new();
    match forward_transfer(&mut state, from_transfer, ctx.block_number, ctx, rng)? {
        Some(event) => events.push(event),
        None => {
            state.set_waiting_transfer(WaitingTransferState::new(from_transfer.clone()))?;
            log_transfer_event!(
                warn,
                ROLE,
                "[pcn] No usable route, parking transfer",
                secrethash,
                routes = routes.len()
            );
        }
    }

    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Mediation started",
        secrethash,
        payer = %from_transfer.payer_address()
    );
    Ok(TransitionResult::new(Some(state), events))
}

fn handle_block(
    mut state: MediatorTransferState,
    block_number: BlockNumber,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = state.secrethash();
    let mut events = Vec::new();

    let parked = state
        .waiting_transfer()
        .filter(|waiting| waiting.state() == WaitingTransferStatus::Waiting)
        .map(|waiting| waiting.transfer().clone());
    if let Some(transfer) = parked {
        if transfer.lock().is_expired(block_number) {
            if let Some(waiting) = state.waiting_transfer_mut() {
                waiting.expire()?;
            }
            events.push(Event::UnlockClaimFailed {
                identifier: transfer.payment_identifier(),
                secrethash,
                reason: "lock expired".to_string(),
            });
        } else if let Some(event) = forward_transfer(&mut state, &transfer, block_number, ctx, rng)? {
            state.clear_waiting_transfer();
            events.push(event);
        }
    }

    let secret = state.secret().cloned();
    let mut onchain_reveal_sent = false;
    for pair in state.transfers_pair_mut() {
        let payee_lock = pair.payee_transfer().lock().clone();
        if matches!(pair.payee_state(), PayeeState::Pending | PayeeState::SecretRevealed)
            && payee_lock.is_expired(block_number)
        {
            let balance_proof = ctx
                .channels
                .balance_proof_with_expired(pair.payee_channel(), &secrethash)?;
            events.push(Event::SendLockExpired {
                recipient: pair.payee_address(),
                message_identifier: next_message_id(rng),
                balance_proof,
                secrethash,
            });
            events.push(Event::UnlockFailed {
                identifier: pair.payee_transfer().payment_identifier(),
                secrethash,
                reason: "lock expired".to_string(),
            });
            pair.set_payee_state(PayeeState::Expired)?;
        }

        let payer_lock = pair.payer_transfer().lock().clone();
        let payer_state = pair.payer_state();
        let payer_expired = payer_lock.is_expired(block_number);
        let payee_paid = pair.payee_state() == PayeeState::BalanceProof;
        // A payee holding its balance proof keeps the payer claim alive
        // past expiry; only the chain can settle it.
        let register_onchain = payer_state == PayerState::SecretRevealed
            && if payer_expired {
                payee_paid
            } else {
                !is_safe_to_wait(payer_lock.expiration, ctx.config.reveal_timeout, block_number)
            };
        if register_onchain {
            if let Some(secret) = &secret {
                if !onchain_reveal_sent {
                    events.push(Event::ContractSendSecretReveal {
                        expiration: payer_lock.expiration,
                        secret: secret.clone(),
                    });
                    onchain_reveal_sent = true;
                }
                pair.set_payer_state(PayerState::WaitingSecretReveal)?;
                log_transfer_event!(
                    info,
                    ROLE,
                    "[pcn] Payer lock close to expiry, registering secret on-chain",
                    secrethash,
                    expiration = payer_lock.expiration,
                    payee_paid = payee_paid
                );
            }
        } else if payer_expired {
            if matches!(payer_state, PayerState::Pending | PayerState::SecretRevealed) {
                pair.set_payer_state(PayerState::Expired)?;
                events.push(Event::UnlockClaimFailed {
                    identifier: pair.payer_transfer().payment_identifier(),
                    secrethash,
                    reason: "lock expired".to_string(),
                });
            }
        }
    }

    Ok(finish_if_resolved(state, events))
}

/// Reveal the secret to every pending payer whose lock is still live.
fn reveal_to_payers(
    state: &mut MediatorTransferState,
    secret: &Secret,
    block_number: BlockNumber,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<Vec<Event>> {
    let mut events = Vec::new();
    for pair in state.transfers_pair_mut() {
        if pair.payer_state() == PayerState::Pending
            && !pair.payer_transfer().lock().is_expired(block_number)
        {
            pair.set_payer_state(PayerState::SecretRevealed)?;
            events.push(Event::SendSecretReveal {
                recipient: pair.payer_address(),
                message_identifier: next_message_id(rng),
                secret: secret.clone(),
            });
        }
    }
    Ok(events)
}

/// Send balance proofs to payees whose payer side holds a claim.
///
/// With `secret_onchain` the payer claim is enforceable regardless of its
/// expiration margin and payees that never learned the secret are included.
fn unlock_payees(
    state: &mut MediatorTransferState,
    secret: &Secret,
    secret_onchain: bool,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<Vec<Event>> {
    let secrethash = state.secrethash();
    let mut events = Vec::new();
    for pair in state.transfers_pair_mut() {
        let payee_knows_secret = pair.payee_state() == PayeeState::SecretRevealed
            || (secret_onchain && pair.payee_state() == PayeeState::Pending);
        let payer_claim_safe = secret_onchain
            || is_safe_to_wait(
                pair.payer_transfer().lock().expiration,
                ctx.config.reveal_timeout,
                ctx.block_number,
            );
        let should_send = payee_knows_secret
            && pair.payer_state().holds_claim()
            && payer_claim_safe
            && !pair.payee_transfer().lock().is_expired(ctx.block_number);
        if !should_send {
            continue;
        }

        let balance_proof = ctx
            .channels
            .balance_proof_with_unlock(pair.payee_channel(), &secrethash)?;
        pair.set_payee_state(PayeeState::BalanceProof)?;
        let payee_transfer = pair.payee_transfer();
        events.push(Event::SendBalanceProof {
            recipient: pair.payee_address(),
            message_identifier: next_message_id(rng),
            payment_identifier: payee_transfer.payment_identifier(),
            token_address: payee_transfer.token(),
            secret: secret.clone(),
            secrethash,
            balance_proof,
        });
        events.push(Event::UnlockSuccess {
            identifier: payee_transfer.payment_identifier(),
            secrethash,
        });
        log_transfer_event!(
            debug,
            ROLE,
            "[pcn] Unlocking payee",
            secrethash,
            payee = %pair.payee_address()
        );
    }
    Ok(events)
}

fn handle_secret_reveal(
    mut state: MediatorTransferState,
    secret: &Secret,
    sender: Address,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    if !state
        .transfers_pair()
        .iter()
        .any(|pair| pair.payee_address() == sender)
    {
        log_transfer_event!(
            warn,
            ROLE,
            "[pcn] Ignoring secret reveal from a node that is not a payee",
            state.secrethash(),
            sender = %sender
        );
        return Ok(TransitionResult::unchanged(state));
    }

    if state.secret().is_none() {
        state.set_secret(secret.clone())?;
    }
    for pair in state.transfers_pair_mut() {
        if pair.payee_address() == sender && pair.payee_state() == PayeeState::Pending {
            pair.set_payee_state(PayeeState::SecretRevealed)?;
        }
    }

    let mut events = reveal_to_payers(&mut state, secret, ctx.block_number, rng)?;
    events.extend(unlock_payees(&mut state, secret, false, ctx, rng)?);
    Ok(finish_if_resolved(state, events))
}

fn handle_unlock(
    mut state: MediatorTransferState,
    secret: &Secret,
    balance_proof: &BalanceProofSignedState,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = state.secrethash();
    let sender = balance_proof.sender();
    let channel = balance_proof.channel_identifier();
    let index = state
        .transfers_pair()
        .iter()
        .position(|pair| pair.payer_address() == sender && pair.payer_channel() == channel)
        .ok_or_else(|| {
            MediatedTransferError::InvalidStateChange(format!(
                "unlock from {} matches no payer of {}",
                sender, secrethash
            ))
        })?;

    invariant_secret_matches(secret, &secrethash)
        .map_err(|err| rejected_balance_proof("unlock", secrethash, err))?;
    let payer_transfer = state.transfers_pair()[index].payer_transfer();
    invariant_unlocks_lock(payer_transfer.balance_proof(), balance_proof, payer_transfer.lock())
        .map_err(|err| rejected_balance_proof("unlock", secrethash, err))?;

    if state.secret().is_none() {
        state.set_secret(secret.clone())?;
    }

    let pair = &mut state.transfers_pair_mut()[index];
    if pair.payer_state() == PayerState::Pending {
        pair.set_payer_state(PayerState::SecretRevealed)?;
    }
    pair.set_payer_state(PayerState::BalanceProof)?;
    let mut events = vec![Event::UnlockClaimSuccess {
        identifier: pair.payer_transfer().payment_identifier(),
        secrethash,
    }];
    log_transfer_event!(debug, ROLE, "[pcn] Payer unlocked", secrethash, payer = %sender);

    events.extend(unlock_payees(&mut state, secret, false, ctx, rng)?);
    Ok(finish_if_resolved(state, events))
}

fn handle_lock_expired(
    mut state: MediatorTransferState,
    balance_proof: &BalanceProofSignedState,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = state.secrethash();
    let sender = balance_proof.sender();
    let channel = balance_proof.channel_identifier();

    if let Some(waiting) = state.waiting_transfer_mut() {
        let parked = waiting.transfer();
        if parked.payer_address() == sender && parked.balance_proof().channel_identifier() == channel
        {
            if !parked.lock().is_expired(ctx.block_number) {
                return Err(MediatedTransferError::InvalidStateChange(format!(
                    "lock {} expired early",
                    secrethash
                )));
            }
            invariant_expires_lock(parked.balance_proof(), balance_proof, parked.lock())
                .map_err(|err| rejected_balance_proof("lock expired", secrethash, err))?;
            let identifier = parked.payment_identifier();
            if waiting.state() == WaitingTransferStatus::Expired {
                return Ok(TransitionResult::unchanged(state));
            }
            waiting.expire()?;
            let events = vec![Event::UnlockClaimFailed {
                identifier,
                secrethash,
                reason: "lock expired".to_string(),
            }];
            return Ok(finish_if_resolved(state, events));
        }
    }

    let pair = state
        .transfers_pair_mut()
        .iter_mut()
        .find(|pair| pair.payer_address() == sender && pair.payer_channel() == channel)
        .ok_or_else(|| {
            MediatedTransferError::InvalidStateChange(format!(
                "lock expired from {} matches no payer of {}",
                sender, secrethash
            ))
        })?;
    if !pair.payer_transfer().lock().is_expired(ctx.block_number) {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "lock {} expired early",
            secrethash
        )));
    }
    let payer_transfer = pair.payer_transfer();
    invariant_expires_lock(payer_transfer.balance_proof(), balance_proof, payer_transfer.lock())
        .map_err(|err| rejected_balance_proof("lock expired", secrethash, err))?;

    let mut events = Vec::new();
    if pair.payer_state() != PayerState::Expired {
        pair.set_payer_state(PayerState::Expired)?;
        events.push(Event::UnlockClaimFailed {
            identifier: pair.payer_transfer().payment_identifier(),
            secrethash,
            reason: "lock expired".to_string(),
        });
    }
    Ok(finish_if_resolved(state, events))
}

fn handle_refund(
    mut state: MediatorTransferState,
    refund: &LockedTransferSignedState,
    routes: &[RouteState],
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = state.secrethash();
    let sender = refund.payer_address();
    let channel = refund.balance_proof().channel_identifier();
    let token_network = refund
        .balance_proof()
        .canonical_identifier()
        .token_network_address;

    state.mark_refunded(channel);
    state.extend_routes(routes);
    if select_route(&state, &sender, token_network, &refund.lock().amount, ctx).is_none() {
        log_transfer_event!(warn, ROLE, "[pcn] Refund received, no route left", secrethash);
        return Err(MediatedTransferError::RoutesExhausted { secrethash });
    }

    let pair = state
        .transfers_pair()
        .iter()
        .find(|pair| pair.payee_address() == sender && pair.payee_channel() == channel)
        .ok_or_else(|| {
            MediatedTransferError::InvalidStateChange(format!(
                "refund from {} matches no payee of {}",
                sender, secrethash
            ))
        })?;
    let sent = pair.payee_transfer();
    let matches_sent = refund.payment_identifier() == sent.payment_identifier()
        && refund.lock().amount == sent.lock().amount
        && refund.lock().expiration == sent.lock().expiration;
    if !matches_sent {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "refund does not match the transfer sent for {}",
            secrethash
        )));
    }
    if pair.payer_state().holds_claim() {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "refund after the secret of {} was revealed",
            secrethash
        )));
    }

    let event = forward_transfer(&mut state, refund, ctx.block_number, ctx, rng)?
        .ok_or(MediatedTransferError::RoutesExhausted { secrethash })?;
    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Refund received, trying next route",
        secrethash,
        refunded_by = %sender
    );
    Ok(TransitionResult::new(Some(state), vec![event]))
}

fn handle_onchain_secret_reveal(
    mut state: MediatorTransferState,
    secret: &Secret,
    registered_at: BlockNumber,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    if state.secret().is_none() {
        state.set_secret(secret.clone())?;
    }

    let mut events = Vec::new();
    for pair in state.transfers_pair_mut() {
        if pair.payer_transfer().lock().is_expired(registered_at) {
            continue;
        }
        if pair.payer_state() == PayerState::Pending {
            pair.set_payer_state(PayerState::SecretRevealed)?;
            events.push(Event::SendSecretReveal {
                recipient: pair.payer_address(),
                message_identifier: next_message_id(rng),
                secret: secret.clone(),
            });
        }
        if matches!(
            pair.payer_state(),
            PayerState::SecretRevealed | PayerState::WaitingSecretReveal
        ) {
            pair.set_payer_state(PayerState::WaitingUnlock)?;
            events.push(Event::ContractSendChannelBatchUnlock {
                canonical_identifier: *pair.payer_transfer().balance_proof().canonical_identifier(),
                participant: pair.payer_address(),
            });
        }
    }

    events.extend(unlock_payees(&mut state, secret, true, ctx, rng)?);
    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Secret registered on-chain",
        state.secrethash(),
        block_number = registered_at
    );
    Ok(finish_if_resolved(state, events))
}

fn handle_batch_unlock(
    mut state: MediatorTransferState,
    canonical_identifier: &CanonicalIdentifier,
    receiver: Address,
    sender: Address,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
    let secrethash = state.secrethash();
    let mut events = Vec::new();

    for pair in state.transfers_pair_mut() {
        let payee_unlocked = receiver == pair.payee_address()
            && sender == ctx.our_address
            && pair.payee_transfer().balance_proof().canonical_identifier() == canonical_identifier;
        if payee_unlocked
            && matches!(pair.payee_state(), PayeeState::Pending | PayeeState::SecretRevealed)
        {
            pair.set_payee_state(PayeeState::ContractUnlock)?;
            events.push(Event::UnlockSuccess {
                identifier: pair.payee_transfer().payment_identifier(),
                secrethash,
            });
        }

        let payer_unlocked = receiver == ctx.our_address
            && sender == pair.payer_address()
            && pair.payer_transfer().balance_proof().canonical_identifier() == canonical_identifier;
        if payer_unlocked
            && matches!(
                pair.payer_state(),
                PayerState::SecretRevealed | PayerState::WaitingSecretReveal | PayerState::WaitingUnlock
            )
        {
            pair.set_payer_state(PayerState::BalanceProof)?;
            events.push(Event::UnlockClaimSuccess {
                identifier: pair.payer_transfer().payment_identifier(),
                secrethash,
            });
        }
    }

    if events.is_empty() {
        return Ok(TransitionResult::unchanged(state));
    }
    Ok(finish_if_resolved(state, events))
}

fn finish_if_resolved(
    state: MediatorTransferState,
    events: Vec<Event>,
) -> TransitionResult<MediatorTransferState> {
    if state.is_resolved() {
        log_transfer_event!(info, ROLE, "[pcn] Mediation finished", state.secrethash());
        TransitionResult::finished(events)
    } else {
        TransitionResult::new(Some(state), events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChannelLedger;
    use crate::codec::{decode, encode, Record};
    use crate::config::MediatedTransferConfig;
    use crate::domain::{secrethash_of, TransitionError};
    use crate::ports::ChannelLedger;
    use crate::test_utils::{
        address, address_of, canonical_identifier, keypair, ledger_with_channels,
        make_signed_transfer, make_unlock_balance_proof, seeded_rng, ALICE_KEY, BOB_KEY,
        CHARLIE_KEY,
    };
    use shared_types::{SecretHash, U256};

    const SECRET: [u8; 32] = [0x44; 32];
    const EXPIRATION: u64 = 100;

    fn secrethash() -> SecretHash {
        secrethash_of(&Secret::new(SECRET))
    }

    fn ctx<'a>(
        config: &'a MediatedTransferConfig,
        ledger: &'a InMemoryChannelLedger,
        block_number: BlockNumber,
    ) -> TransitionContext<'a> {
        TransitionContext {
            our_address: address(3),
            block_number,
            config,
            channels: ledger,
        }
    }

    fn apply(
        state: Option<MediatorTransferState>,
        change: StateChange,
        ctx: &TransitionContext<'_>,
        ledger: &InMemoryChannelLedger,
    ) -> MediatedTransferResult<TransitionResult<MediatorTransferState>> {
        let result = state_transition(state, &change, ctx, &mut seeded_rng())?;
        for event in &result.events {
            ledger.record(event).unwrap();
        }
        Ok(result)
    }

    fn payer_transfer() -> LockedTransferSignedState {
        make_signed_transfer(&keypair(ALICE_KEY), secrethash(), 10, EXPIRATION, 1)
    }

    fn init(routes: Vec<RouteState>) -> StateChange {
        StateChange::ActionInitMediator {
            from_route: RouteState::new(address_of(ALICE_KEY), U256::from(1)),
            from_transfer: payer_transfer(),
            routes,
        }
    }

    fn tags(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::tag).collect()
    }

    fn bob_and_charlie() -> (InMemoryChannelLedger, Vec<RouteState>) {
        let bob = address_of(BOB_KEY);
        let charlie = address_of(CHARLIE_KEY);
        let ledger = ledger_with_channels(&[(bob, 2), (charlie, 3)]);
        let routes = vec![
            RouteState::new(bob, U256::from(2)),
            RouteState::new(charlie, U256::from(3)),
        ];
        (ledger, routes)
    }

    #[test]
    fn test_init_forwards_same_lock() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let result = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger).unwrap();

        match result.events.as_slice() {
            [Event::SendLockedTransfer {
                recipient, transfer, ..
            }] => {
                assert_eq!(*recipient, address_of(BOB_KEY));
                assert_eq!(transfer.lock(), payer_transfer().lock());
                assert_eq!(transfer.balance_proof().channel_identifier(), U256::from(2));
            }
            other => panic!("unexpected events {other:?}"),
        }
        let state = result.new_state.unwrap();
        assert_eq!(state.transfers_pair().len(), 1);
        assert_eq!(ledger.pending_locks(U256::from(2)).len(), 1);
    }

    #[test]
    fn test_init_rejects_expired_and_misrouted_transfer() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        assert!(matches!(
            apply(None, init(routes.clone()), &ctx(&config, &ledger, EXPIRATION), &ledger),
            Err(MediatedTransferError::InvalidStateChange(_))
        ));

        let misrouted = StateChange::ActionInitMediator {
            from_route: RouteState::new(address(9), U256::from(1)),
            from_transfer: payer_transfer(),
            routes,
        };
        assert!(apply(None, misrouted, &ctx(&config, &ledger, 10), &ledger).is_err());
    }

    #[test]
    fn test_happy_path_pays_payee_after_payer_claim() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let context = ctx(&config, &ledger, 10);
        let state = apply(None, init(routes), &context, &ledger)
            .unwrap()
            .new_state;

        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address_of(BOB_KEY),
        };
        let result = apply(state, reveal, &context, &ledger).unwrap();
        assert_eq!(
            tags(&result.events),
            vec!["SendSecretReveal", "SendBalanceProof", "UnlockSuccess"]
        );
        let state = result.new_state.unwrap();
        let pair = &state.transfers_pair()[0];
        assert_eq!(pair.payer_state(), PayerState::SecretRevealed);
        assert_eq!(pair.payee_state(), PayeeState::BalanceProof);

        let unlock = StateChange::ReceiveUnlock {
            message_identifier: 5,
            secret: Secret::new(SECRET),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, 10),
        };
        let result = apply(Some(state), unlock, &context, &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimSuccess"]);
        assert!(result.new_state.is_none());
        assert_eq!(ledger.transferred_amount(U256::from(2)), Some(U256::from(10)));
    }

    #[test]
    fn test_reveal_from_stranger_ignored() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let context = ctx(&config, &ledger, 10);
        let state = apply(None, init(routes), &context, &ledger)
            .unwrap()
            .new_state
            .unwrap();
        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address(77),
        };
        let result = apply(Some(state.clone()), reveal, &context, &ledger).unwrap();
        assert!(result.events.is_empty());
        assert_eq!(result.new_state, Some(state));
    }

    #[test]
    fn test_duplicate_unlock_rejected() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let context = ctx(&config, &ledger, 10);
        let state = apply(None, init(routes), &context, &ledger).unwrap().new_state;
        let unlock = StateChange::ReceiveUnlock {
            message_identifier: 5,
            secret: Secret::new(SECRET),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, 10),
        };
        let state = apply(state, unlock.clone(), &context, &ledger)
            .unwrap()
            .new_state;
        assert!(matches!(
            apply(state, unlock, &context, &ledger),
            Err(MediatedTransferError::Transition(TransitionError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_parked_transfer_forwarded_when_channel_opens() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[]);
        let bob = address_of(BOB_KEY);
        let result = apply(
            None,
            init(vec![RouteState::new(bob, U256::from(2))]),
            &ctx(&config, &ledger, 10),
            &ledger,
        )
        .unwrap();
        assert!(result.events.is_empty());
        let state = result.new_state.unwrap();
        assert!(state.waiting_transfer().is_some());

        ledger.open_channel(canonical_identifier(2), address(9), bob, U256::from(1000));
        let result = apply(
            Some(state),
            StateChange::Block { block_number: 11 },
            &ctx(&config, &ledger, 11),
            &ledger,
        )
        .unwrap();
        assert_eq!(tags(&result.events), vec!["SendLockedTransfer"]);
        let state = result.new_state.unwrap();
        assert!(state.waiting_transfer().is_none());
        assert_eq!(state.transfers_pair().len(), 1);
    }

    #[test]
    fn test_parked_transfer_expires() {
        let config = MediatedTransferConfig::default();
        let ledger = ledger_with_channels(&[]);
        let state = apply(None, init(Vec::new()), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;
        let result = apply(
            state,
            StateChange::Block {
                block_number: EXPIRATION,
            },
            &ctx(&config, &ledger, EXPIRATION),
            &ledger,
        )
        .unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimFailed"]);
        assert!(result.new_state.is_none());
    }

    #[test]
    fn test_expiry_of_both_legs() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let state = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;
        let result = apply(
            state,
            StateChange::Block {
                block_number: EXPIRATION,
            },
            &ctx(&config, &ledger, EXPIRATION),
            &ledger,
        )
        .unwrap();
        assert_eq!(
            tags(&result.events),
            vec!["SendLockExpired", "UnlockFailed", "UnlockClaimFailed"]
        );
        assert!(result.new_state.is_none());
        assert!(ledger.pending_locks(U256::from(2)).is_empty());
    }

    #[test]
    fn test_onchain_path_when_payer_does_not_unlock() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let state = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;
        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address_of(BOB_KEY),
        };
        let state = apply(state, reveal, &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;

        let late = EXPIRATION - config.reveal_timeout;
        let result = apply(
            state,
            StateChange::Block { block_number: late },
            &ctx(&config, &ledger, late),
            &ledger,
        )
        .unwrap();
        assert_eq!(tags(&result.events), vec!["ContractSendSecretReveal"]);
        let state = result.new_state;

        let registered = StateChange::ContractReceiveSecretReveal {
            secrethash: secrethash(),
            secret: Secret::new(SECRET),
            block_number: late + 1,
        };
        let result = apply(state, registered, &ctx(&config, &ledger, late + 1), &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["ContractSendChannelBatchUnlock"]);
        let state = result.new_state.unwrap();
        assert_eq!(state.transfers_pair()[0].payer_state(), PayerState::WaitingUnlock);

        let unlocked = StateChange::ContractReceiveChannelBatchUnlock {
            canonical_identifier: canonical_identifier(1),
            receiver: address(3),
            sender: address_of(ALICE_KEY),
            unlocked_amount: U256::from(10),
        };
        let result = apply(Some(state), unlocked, &ctx(&config, &ledger, late + 2), &ledger)
            .unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimSuccess"]);
        assert!(result.new_state.is_none());
    }

    #[test]
    fn test_refund_tries_next_route() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let context = ctx(&config, &ledger, 10);
        let result = apply(None, init(routes), &context, &ledger).unwrap();
        let Event::SendLockedTransfer { transfer, .. } = &result.events[0] else {
            panic!("expected a locked transfer");
        };
        let refund = transfer.sign(8, &keypair(BOB_KEY)).unwrap();

        let change = StateChange::ReceiveTransferRefund {
            transfer: refund,
            routes: Vec::new(),
        };
        let result = apply(result.new_state, change, &context, &ledger).unwrap();
        assert!(matches!(
            result.events.as_slice(),
            [Event::SendLockedTransfer { recipient, .. }] if *recipient == address_of(CHARLIE_KEY)
        ));
        let state = result.new_state.unwrap();
        assert_eq!(state.transfers_pair().len(), 2);
        assert_eq!(state.transfers_pair()[1].payer_address(), address_of(BOB_KEY));
        assert_eq!(state.refunded_channels(), &[U256::from(2)]);
    }

    #[test]
    fn test_refund_without_routes_is_exhausted() {
        let config = MediatedTransferConfig::default();
        let (ledger, _) = bob_and_charlie();
        let bob = address_of(BOB_KEY);
        let context = ctx(&config, &ledger, 10);
        let result = apply(
            None,
            init(vec![RouteState::new(bob, U256::from(2))]),
            &context,
            &ledger,
        )
        .unwrap();
        let Event::SendLockedTransfer { transfer, .. } = &result.events[0] else {
            panic!("expected a locked transfer");
        };
        let refund = transfer.sign(8, &keypair(BOB_KEY)).unwrap();

        let mut state = result.new_state.unwrap();
        state.transfers_pair_mut()[0]
            .set_payer_state(PayerState::Expired)
            .unwrap();
        let pairs_before = state.transfers_pair().len();

        let change = StateChange::ReceiveTransferRefund {
            transfer: refund,
            routes: Vec::new(),
        };
        let err = apply(Some(state.clone()), change, &context, &ledger).unwrap_err();
        assert!(matches!(err, MediatedTransferError::RoutesExhausted { .. }));
        assert_eq!(state.transfers_pair().len(), pairs_before);
    }

    #[test]
    fn test_lock_expired_from_payer() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let state = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;
        let expired = StateChange::ReceiveLockExpired {
            message_identifier: 3,
            secrethash: secrethash(),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, 0),
        };
        assert!(apply(state.clone(), expired.clone(), &ctx(&config, &ledger, 50), &ledger).is_err());

        let result = apply(state, expired, &ctx(&config, &ledger, EXPIRATION), &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimFailed"]);
        let state = result.new_state.unwrap();
        assert_eq!(state.transfers_pair()[0].payer_state(), PayerState::Expired);
    }

    /// Pair state after the payee revealed at block 10 and was paid.
    fn payee_paid(
        config: &MediatedTransferConfig,
        ledger: &InMemoryChannelLedger,
    ) -> MediatorTransferState {
        let context = ctx(config, ledger, 10);
        let (_, routes) = bob_and_charlie();
        let state = apply(None, init(routes), &context, ledger).unwrap().new_state;
        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address_of(BOB_KEY),
        };
        let state = apply(state, reveal, &context, ledger).unwrap().new_state.unwrap();
        assert_eq!(state.transfers_pair()[0].payee_state(), PayeeState::BalanceProof);
        state
    }

    #[test]
    fn test_unlock_must_release_the_payer_lock() {
        let config = MediatedTransferConfig::default();
        let (ledger, _) = bob_and_charlie();
        let context = ctx(&config, &ledger, 11);
        let state = payee_paid(&config, &ledger);

        let unlock = |secret: [u8; 32], transferred: u64| StateChange::ReceiveUnlock {
            message_identifier: 5,
            secret: Secret::new(secret),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, transferred),
        };
        for change in [unlock([0x99; 32], 0), unlock(SECRET, 0), unlock([0x99; 32], 10)] {
            assert!(matches!(
                apply(Some(state.clone()), change, &context, &ledger),
                Err(MediatedTransferError::InvalidStateChange(_))
            ));
        }

        let result = apply(Some(state), unlock(SECRET, 10), &context, &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimSuccess"]);
        assert!(result.new_state.is_none());
    }

    #[test]
    fn test_lock_expired_that_pays_rejected() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let state = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;
        let expired = StateChange::ReceiveLockExpired {
            message_identifier: 3,
            secrethash: secrethash(),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, 10),
        };
        assert!(matches!(
            apply(state, expired, &ctx(&config, &ledger, EXPIRATION), &ledger),
            Err(MediatedTransferError::InvalidStateChange(_))
        ));
    }

    #[test]
    fn test_block_past_payer_expiry_after_payee_paid_goes_onchain() {
        let config = MediatedTransferConfig::default();
        let (ledger, _) = bob_and_charlie();
        let state = payee_paid(&config, &ledger);

        let context = ctx(&config, &ledger, EXPIRATION);
        let result = apply(
            Some(state),
            StateChange::Block {
                block_number: EXPIRATION,
            },
            &context,
            &ledger,
        )
        .unwrap();
        assert_eq!(tags(&result.events), vec!["ContractSendSecretReveal"]);
        let state = result.new_state.unwrap();
        let pair = &state.transfers_pair()[0];
        assert_eq!(pair.payer_state(), PayerState::WaitingSecretReveal);
        assert!(pair.validate().is_ok());
        assert_eq!(decode::<MediatorTransferState>(encode(&state).unwrap()).unwrap(), state);

        let expired = StateChange::ReceiveLockExpired {
            message_identifier: 3,
            secrethash: secrethash(),
            balance_proof: make_unlock_balance_proof(&keypair(ALICE_KEY), 1, 0),
        };
        assert!(matches!(
            apply(Some(state.clone()), expired, &context, &ledger),
            Err(MediatedTransferError::Transition(TransitionError::PayerClaimAbandoned { .. }))
        ));

        let unlocked = StateChange::ContractReceiveChannelBatchUnlock {
            canonical_identifier: canonical_identifier(1),
            receiver: address(3),
            sender: address_of(ALICE_KEY),
            unlocked_amount: U256::from(10),
        };
        let result = apply(Some(state), unlocked, &context, &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["UnlockClaimSuccess"]);
        assert!(result.new_state.is_none());
    }

    #[test]
    fn test_block_jumping_reveal_window_expires_unpaid_legs() {
        let config = MediatedTransferConfig::default();
        let (ledger, routes) = bob_and_charlie();
        let late = EXPIRATION - config.reveal_timeout;
        let state = apply(None, init(routes), &ctx(&config, &ledger, 10), &ledger)
            .unwrap()
            .new_state;

        let reveal = StateChange::ReceiveSecretReveal {
            secret: Secret::new(SECRET),
            sender: address_of(BOB_KEY),
        };
        let result = apply(state, reveal, &ctx(&config, &ledger, late), &ledger).unwrap();
        assert_eq!(tags(&result.events), vec!["SendSecretReveal"]);
        let state = result.new_state.unwrap();
        assert_eq!(state.transfers_pair()[0].payee_state(), PayeeState::SecretRevealed);

        let result = apply(
            Some(state),
            StateChange::Block {
                block_number: EXPIRATION + 5,
            },
            &ctx(&config, &ledger, EXPIRATION + 5),
            &ledger,
        )
        .unwrap();
        assert_eq!(
            tags(&result.events),
            vec!["SendLockExpired", "UnlockFailed", "UnlockClaimFailed"]
        );
        assert!(result.new_state.is_none());
        assert_eq!(ledger.transferred_amount(U256::from(2)), Some(U256::zero()));
    }
}
