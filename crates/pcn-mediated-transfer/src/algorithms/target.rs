//! # Target Reducer
//!
//! Requests the secret from the initiator, reveals it back to the payer and
//! finishes once the payer unlocks, off-chain or on-chain.

use super::{
    is_safe_to_wait, next_message_id, rejected_balance_proof, TransitionContext, TransitionResult,
};
use crate::domain::{
    invariant_expires_lock, invariant_secret_matches, invariant_unlocks_lock, BalanceProof, BalanceProofSignedState, LockedTransferSignedState, MediatedTransferError,
    MediatedTransferResult, RouteState, TargetState, TargetTransferState,
};
use crate::events::{Event, StateChange};
use pcn_telemetry::log_transfer_event;
use rand::RngCore;
use shared_types::{Address, BlockNumber, CanonicalIdentifier, Secret};

const ROLE: &str = "target";

/// Apply `state_change` to the target transfer `state`.
pub fn state_transition(
    state: Option<TargetTransferState>,
    state_change: &StateChange,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    match (state, state_change) {
        (None, StateChange::ActionInitTarget { route, transfer }) => {
            handle_init(route, transfer, ctx, rng)
        }
        (None, other) => Err(MediatedTransferError::InvalidStateChange(format!(
            "no target transfer for {}",
            other.tag()
        ))),
        (Some(state), StateChange::ActionInitTarget { .. }) => {
            Err(MediatedTransferError::InvalidStateChange(format!(
                "transfer {} already received",
                state.secrethash()
            )))
        }
        (Some(state), StateChange::Block { block_number }) => {
            handle_block(state, *block_number, ctx)
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
        ) => handle_unlock(state, secret, balance_proof),
        (Some(state), StateChange::ReceiveLockExpired { balance_proof, .. }) => {
            handle_lock_expired(state, balance_proof, ctx)
        }
        (
            Some(state),
            StateChange::ContractReceiveSecretReveal {
                secret,
                block_number,
                ..
            },
        ) => handle_onchain_secret_reveal(state, secret, *block_number),
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

fn handle_init(
    route: &RouteState,
    transfer: &LockedTransferSignedState,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = transfer.lock().secrethash;
    if transfer.target() != ctx.our_address {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "transfer {} is addressed to {}",
            secrethash,
            transfer.target()
        )));
    }
    let canonical = transfer.balance_proof().canonical_identifier();
    if canonical.chain_identifier != ctx.config.chain_id
        || canonical.channel_identifier != route.channel_identifier
    {
        return Err(MediatedTransferError::InvalidStateChange(
            "transfer did not arrive over its route".to_string(),
        ));
    }

    let state = TargetTransferState::new(route.clone(), transfer.clone())?;
    let lock = transfer.lock();
    if !is_safe_to_wait(lock.expiration, ctx.config.reveal_timeout, ctx.block_number) {
        log_transfer_event!(
            warn,
            ROLE,
            "[pcn] Lock too close to expiry, not requesting the secret",
            secrethash,
            expiration = lock.expiration,
            block_number = ctx.block_number
        );
        return Ok(TransitionResult::unchanged(state));
    }

    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Transfer received, requesting secret",
        secrethash,
        initiator = %transfer.initiator(),
        amount = %lock.amount
    );
    let event = Event::SendSecretRequest {
        recipient: transfer.initiator(),
        message_identifier: next_message_id(rng),
        payment_identifier: transfer.payment_identifier(),
        amount: lock.amount,
        expiration: lock.expiration,
        secrethash,
    };
    Ok(TransitionResult::new(Some(state), vec![event]))
}

fn handle_secret_reveal(
    mut state: TargetTransferState,
    secret: &Secret,
    sender: Address,
    ctx: &TransitionContext<'_>,
    rng: &mut dyn RngCore,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = state.secrethash();
    if sender != state.transfer().initiator() {
        log_transfer_event!(
            warn,
            ROLE,
            "[pcn] Ignoring secret reveal from a node other than the initiator",
            secrethash,
            sender = %sender
        );
        return Ok(TransitionResult::unchanged(state));
    }
    if state.state() != TargetState::SecretRequest
        || state.transfer().lock().is_expired(ctx.block_number)
    {
        return Ok(TransitionResult::unchanged(state));
    }

    state.set_secret(secret.clone())?;
    state.set_state(TargetState::OffchainSecretReveal)?;
    log_transfer_event!(debug, ROLE, "[pcn] Revealing secret to payer", secrethash);

    let event = Event::SendSecretReveal {
        recipient: state.route().node_address,
        message_identifier: next_message_id(rng),
        secret: secret.clone(),
    };
    Ok(TransitionResult::new(Some(state), vec![event]))
}

fn is_from_payer(state: &TargetTransferState, balance_proof: &BalanceProofSignedState) -> bool {
    balance_proof.sender() == state.route().node_address
        && balance_proof.channel_identifier() == state.route().channel_identifier
}

/// Events closing a paid transfer.
fn payment_received(state: &TargetTransferState) -> Vec<Event> {
    let transfer = state.transfer();
    vec![
        Event::PaymentReceivedSuccess {
            token_network_identifier: transfer
                .balance_proof()
                .canonical_identifier()
                .token_network_address,
            identifier: transfer.payment_identifier(),
            amount: transfer.lock().amount,
            initiator: transfer.initiator(),
        },
        Event::UnlockClaimSuccess {
            identifier: transfer.payment_identifier(),
            secrethash: state.secrethash(),
        },
    ]
}

fn handle_unlock(
    mut state: TargetTransferState,
    secret: &Secret,
    balance_proof: &BalanceProofSignedState,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = state.secrethash();
    if !is_from_payer(&state, balance_proof) {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "unlock of {} from {} who is not the payer",
            secrethash,
            balance_proof.sender()
        )));
    }
    if state.state() == TargetState::Expired {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "unlock of expired lock {}",
            secrethash
        )));
    }
    invariant_secret_matches(secret, &secrethash)
        .map_err(|err| rejected_balance_proof("unlock", secrethash, err))?;
    let transfer = state.transfer();
    invariant_unlocks_lock(transfer.balance_proof(), balance_proof, transfer.lock())
        .map_err(|err| rejected_balance_proof("unlock", secrethash, err))?;
    if state.secret().is_none() {
        state.set_secret(secret.clone())?;
    }

    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Payment received",
        secrethash,
        amount = %state.transfer().lock().amount
    );
    Ok(TransitionResult::finished(payment_received(&state)))
}

fn handle_block(
    mut state: TargetTransferState,
    block_number: BlockNumber,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = state.secrethash();
    let lock = state.transfer().lock().clone();
    let mut events = Vec::new();

    match state.state() {
        TargetState::SecretRequest | TargetState::OffchainSecretReveal
            if lock.is_expired(block_number) =>
        {
            state.set_state(TargetState::Expired)?;
            events.push(Event::UnlockClaimFailed {
                identifier: state.transfer().payment_identifier(),
                secrethash,
                reason: "lock expired".to_string(),
            });
            log_transfer_event!(info, ROLE, "[pcn] Lock expired unpaid", secrethash);
        }
        TargetState::OffchainSecretReveal
            if !is_safe_to_wait(lock.expiration, ctx.config.reveal_timeout, block_number) =>
        {
            if let Some(secret) = state.secret().cloned() {
                state.set_state(TargetState::OnchainSecretReveal)?;
                events.push(Event::ContractSendSecretReveal {
                    expiration: lock.expiration,
                    secret,
                });
                log_transfer_event!(
                    info,
                    ROLE,
                    "[pcn] Payer did not unlock in time, registering secret on-chain",
                    secrethash,
                    expiration = lock.expiration
                );
            }
        }
        _ => {}
    }
    Ok(TransitionResult::new(Some(state), events))
}

fn handle_lock_expired(
    mut state: TargetTransferState,
    balance_proof: &BalanceProofSignedState,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = state.secrethash();
    if !is_from_payer(&state, balance_proof) {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "lock expired for {} from {} who is not the payer",
            secrethash,
            balance_proof.sender()
        )));
    }
    if !state.transfer().lock().is_expired(ctx.block_number) {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "lock {} expired early",
            secrethash
        )));
    }
    let transfer = state.transfer();
    invariant_expires_lock(transfer.balance_proof(), balance_proof, transfer.lock())
        .map_err(|err| rejected_balance_proof("lock expired", secrethash, err))?;

    let mut events = Vec::new();
    match state.state() {
        TargetState::Expired => {}
        TargetState::SecretRequest | TargetState::OffchainSecretReveal => {
            state.set_state(TargetState::Expired)?;
            events.push(Event::UnlockClaimFailed {
                identifier: state.transfer().payment_identifier(),
                secrethash,
                reason: "lock expired".to_string(),
            });
        }
        other => {
            return Err(MediatedTransferError::InvalidStateChange(format!(
                "lock {} expired while {}",
                secrethash,
                other.as_str()
            )));
        }
    }
    Ok(TransitionResult::finished(events))
}

fn handle_onchain_secret_reveal(
    mut state: TargetTransferState,
    secret: &Secret,
    registered_at: BlockNumber,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let secrethash = state.secrethash();
    if state.transfer().lock().is_expired(registered_at)
        || matches!(state.state(), TargetState::OnchainUnlock | TargetState::Expired)
    {
        return Ok(TransitionResult::unchanged(state));
    }

    if state.secret().is_none() {
        state.set_secret(secret.clone())?;
    }
    if state.state() == TargetState::SecretRequest {
        state.set_state(TargetState::OffchainSecretReveal)?;
    }
    state.set_state(TargetState::OnchainUnlock)?;

    let event = Event::ContractSendChannelBatchUnlock {
        canonical_identifier: *state.transfer().balance_proof().canonical_identifier(),
        participant: state.route().node_address,
    };
    log_transfer_event!(
        info,
        ROLE,
        "[pcn] Secret registered on-chain, unlocking",
        secrethash,
        block_number = registered_at
    );
    Ok(TransitionResult::new(Some(state), vec![event]))
}

fn handle_batch_unlock(
    state: TargetTransferState,
    canonical_identifier: &CanonicalIdentifier,
    receiver: Address,
    sender: Address,
    ctx: &TransitionContext<'_>,
) -> MediatedTransferResult<TransitionResult<TargetTransferState>> {
    let ours = receiver == ctx.our_address
        && sender == state.route().node_address
        && state.transfer().balance_proof().canonical_identifier() == canonical_identifier;
    if !ours || state.state() == TargetState::Expired {
        return Ok(TransitionResult::unchanged(state));
    }
    log_transfer_event!(info, ROLE, "[pcn] Payment received on-chain", state.secrethash());
    Ok(TransitionResult::finished(payment_received(&state)))
}
