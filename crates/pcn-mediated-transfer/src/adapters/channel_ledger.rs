//! In-memory channel ledger.
//!
//! Holds our end of each channel: deposit, sent balance proof state and the
//! pending locks we sent. Locks the partner sent to us live in the partner's
//! balance proofs and are not tracked here.

use crate::domain::{
    compute_locksroot, BalanceProof, BalanceProofUnsignedState, HashTimeLock,
    MediatedTransferError, MediatedTransferResult,
};
use crate::events::Event;
use crate::ports::{ChannelLedger, ChannelView};
use parking_lot::RwLock;
use pcn_telemetry::log_channel_event;
use shared_types::{
    checked_add, checked_sub, next_nonce, Address, CanonicalIdentifier, ChannelId, Locksroot,
    Nonce, SecretHash, TokenAddress, TokenAmount,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug)]
struct ChannelEnd {
    canonical_identifier: CanonicalIdentifier,
    token_address: TokenAddress,
    partner_address: Address,
    deposit: TokenAmount,
    nonce: Nonce,
    transferred_amount: TokenAmount,
    locked_amount: TokenAmount,
    locks: BTreeMap<SecretHash, HashTimeLock>,
    is_open: bool,
}

impl ChannelEnd {
    fn distributable(&self) -> TokenAmount {
        self.deposit
            .saturating_sub(self.transferred_amount)
            .saturating_sub(self.locked_amount)
    }

    fn view(&self) -> ChannelView {
        ChannelView {
            canonical_identifier: self.canonical_identifier,
            token_address: self.token_address,
            partner_address: self.partner_address,
            distributable: self.distributable(),
            is_open: self.is_open,
        }
    }

    fn pending_lock(&self, secrethash: &SecretHash) -> MediatedTransferResult<&HashTimeLock> {
        self.locks.get(secrethash).ok_or_else(|| {
            MediatedTransferError::InvalidStateChange(format!(
                "no pending lock {} on channel {}",
                secrethash, self.canonical_identifier.channel_identifier
            ))
        })
    }

    /// Next balance proof over `locks` with the given totals.
    fn next_balance_proof(
        &self,
        transferred_amount: TokenAmount,
        locked_amount: TokenAmount,
        locks: &BTreeMap<SecretHash, HashTimeLock>,
    ) -> MediatedTransferResult<BalanceProofUnsignedState> {
        Ok(BalanceProofUnsignedState::new(
            next_nonce(self.nonce)?,
            transferred_amount,
            locked_amount,
            locksroot_of(locks),
            self.canonical_identifier,
        )?)
    }

    fn apply(&mut self, balance_proof: &BalanceProofUnsignedState) -> MediatedTransferResult<()> {
        if balance_proof.nonce() <= self.nonce {
            return Err(MediatedTransferError::InvalidStateChange(format!(
                "stale balance proof nonce {} on channel {}",
                balance_proof.nonce(),
                self.canonical_identifier.channel_identifier
            )));
        }
        self.nonce = balance_proof.nonce();
        self.transferred_amount = balance_proof.transferred_amount();
        self.locked_amount = balance_proof.locked_amount();
        Ok(())
    }
}

fn locksroot_of(locks: &BTreeMap<SecretHash, HashTimeLock>) -> Locksroot {
    let lockhashes: Vec<[u8; 32]> = locks.values().map(HashTimeLock::lockhash).collect();
    compute_locksroot(&lockhashes)
}

/// Channel ledger kept in memory.
pub struct InMemoryChannelLedger {
    channels: RwLock<HashMap<ChannelId, ChannelEnd>>,
}

impl InMemoryChannelLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Open a channel with `partner_address`, depositing `deposit` on our side.
    pub fn open_channel(
        &self,
        canonical_identifier: CanonicalIdentifier,
        token_address: TokenAddress,
        partner_address: Address,
        deposit: TokenAmount,
    ) {
        log_channel_event!(
            info,
            "[pcn] Channel opened",
            canonical_identifier.channel_identifier,
            partner = %partner_address,
            deposit = %deposit
        );
        self.channels.write().insert(
            canonical_identifier.channel_identifier,
            ChannelEnd {
                canonical_identifier,
                token_address,
                partner_address,
                deposit,
                nonce: 0,
                transferred_amount: TokenAmount::zero(),
                locked_amount: TokenAmount::zero(),
                locks: BTreeMap::new(),
                is_open: true,
            },
        );
    }

    /// Stop accepting new locks on a channel.
    pub fn close_channel(&self, channel_identifier: ChannelId) -> MediatedTransferResult<()> {
        let mut channels = self.channels.write();
        let channel = channels
            .get_mut(&channel_identifier)
            .ok_or(MediatedTransferError::UnknownChannel(channel_identifier))?;
        channel.is_open = false;
        log_channel_event!(info, "[pcn] Channel closed", channel_identifier);
        Ok(())
    }

    /// Locks we sent that are neither unlocked nor expired.
    pub fn pending_locks(&self, channel_identifier: ChannelId) -> Vec<HashTimeLock> {
        self.channels
            .read()
            .get(&channel_identifier)
            .map(|channel| channel.locks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total we transferred to the partner.
    pub fn transferred_amount(&self, channel_identifier: ChannelId) -> Option<TokenAmount> {
        self.channels
            .read()
            .get(&channel_identifier)
            .map(|channel| channel.transferred_amount)
    }

    /// Nonce of our latest balance proof.
    pub fn nonce(&self, channel_identifier: ChannelId) -> Option<Nonce> {
        self.channels
            .read()
            .get(&channel_identifier)
            .map(|channel| channel.nonce)
    }

    fn with_channel<T>(
        &self,
        channel_identifier: ChannelId,
        f: impl FnOnce(&ChannelEnd) -> MediatedTransferResult<T>,
    ) -> MediatedTransferResult<T> {
        let channels = self.channels.read();
        let channel = channels
            .get(&channel_identifier)
            .ok_or(MediatedTransferError::UnknownChannel(channel_identifier))?;
        f(channel)
    }
}

type Channels = HashMap<ChannelId, ChannelEnd>;

/// Apply a sent balance proof, adding or removing one lock first. The
/// channel is left as it was on error.
fn apply_balance_proof(
    channels: &mut Channels,
    balance_proof: &BalanceProofUnsignedState,
    added: Option<&HashTimeLock>,
    removed: Option<&SecretHash>,
) -> MediatedTransferResult<()> {
    let channel_identifier = balance_proof.channel_identifier();
    let channel = channels
        .get_mut(&channel_identifier)
        .ok_or(MediatedTransferError::UnknownChannel(channel_identifier))?;

    let mut locks = channel.locks.clone();
    if let Some(lock) = added {
        locks.insert(lock.secrethash, lock.clone());
    }
    if let Some(secrethash) = removed {
        locks.remove(secrethash);
    }
    if locksroot_of(&locks) != *balance_proof.locksroot() {
        return Err(MediatedTransferError::InvalidStateChange(format!(
            "balance proof locksroot does not match the locks of channel {}",
            channel_identifier
        )));
    }

    channel.apply(balance_proof)?;
    channel.locks = locks;
    log_channel_event!(
        debug,
        "[pcn] Balance proof recorded",
        channel_identifier,
        nonce = balance_proof.nonce(),
        transferred = %balance_proof.transferred_amount(),
        locked = %balance_proof.locked_amount()
    );
    Ok(())
}

fn apply_event(channels: &mut Channels, event: &Event) -> MediatedTransferResult<()> {
    match event {
        Event::SendLockedTransfer { transfer, .. } => {
            apply_balance_proof(channels, transfer.balance_proof(), Some(transfer.lock()), None)
        }
        Event::SendBalanceProof {
            balance_proof,
            secrethash,
            ..
        }
        | Event::SendLockExpired {
            balance_proof,
            secrethash,
            ..
        } => apply_balance_proof(channels, balance_proof, None, Some(secrethash)),
        _ => Ok(()),
    }
}

impl Default for InMemoryChannelLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLedger for InMemoryChannelLedger {
    fn channel(&self, channel_identifier: ChannelId) -> Option<ChannelView> {
        self.channels
            .read()
            .get(&channel_identifier)
            .map(ChannelEnd::view)
    }

    fn balance_proof_with_lock(
        &self,
        channel_identifier: ChannelId,
        lock: &HashTimeLock,
    ) -> MediatedTransferResult<BalanceProofUnsignedState> {
        self.with_channel(channel_identifier, |channel| {
            if !channel.is_open {
                return Err(MediatedTransferError::InvalidStateChange(format!(
                    "channel {} is closed",
                    channel_identifier
                )));
            }
            if channel.locks.contains_key(&lock.secrethash) {
                return Err(MediatedTransferError::InvalidStateChange(format!(
                    "lock {} already pending on channel {}",
                    lock.secrethash, channel_identifier
                )));
            }
            if lock.amount > channel.distributable() {
                return Err(MediatedTransferError::InvalidStateChange(format!(
                    "channel {} cannot lock {}",
                    channel_identifier, lock.amount
                )));
            }

            let mut locks = channel.locks.clone();
            locks.insert(lock.secrethash, lock.clone());
            let locked_amount = checked_add(channel.locked_amount, lock.amount, "locked amount")?;
            channel.next_balance_proof(channel.transferred_amount, locked_amount, &locks)
        })
    }

    fn balance_proof_with_unlock(
        &self,
        channel_identifier: ChannelId,
        secrethash: &SecretHash,
    ) -> MediatedTransferResult<BalanceProofUnsignedState> {
        self.with_channel(channel_identifier, |channel| {
            let lock = channel.pending_lock(secrethash)?;
            let transferred_amount =
                checked_add(channel.transferred_amount, lock.amount, "transferred amount")?;
            let locked_amount = checked_sub(channel.locked_amount, lock.amount, "locked amount")?;
            let mut locks = channel.locks.clone();
            locks.remove(secrethash);
            channel.next_balance_proof(transferred_amount, locked_amount, &locks)
        })
    }

    fn balance_proof_with_expired(
        &self,
        channel_identifier: ChannelId,
        secrethash: &SecretHash,
    ) -> MediatedTransferResult<BalanceProofUnsignedState> {
        self.with_channel(channel_identifier, |channel| {
            let lock = channel.pending_lock(secrethash)?;
            let locked_amount = checked_sub(channel.locked_amount, lock.amount, "locked amount")?;
            let mut locks = channel.locks.clone();
            locks.remove(secrethash);
            channel.next_balance_proof(channel.transferred_amount, locked_amount, &locks)
        })
    }

    fn record(&self, event: &Event) -> MediatedTransferResult<()> {
        apply_event(&mut self.channels.write(), event)
    }

    fn record_all(&self, events: &[Event]) -> MediatedTransferResult<()> {
        let mut channels = self.channels.write();
        let mut staged = channels.clone();
        for event in events {
            apply_event(&mut staged, event)?;
        }
        *channels = staged;
        Ok(())
    }
}
