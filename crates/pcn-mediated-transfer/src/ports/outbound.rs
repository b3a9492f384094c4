//! # Outbound Ports
//!
//! What the reducers and the service need from the rest of the node.

use crate::domain::{BalanceProofUnsignedState, HashTimeLock, MediatedTransferResult};
use crate::events::Event;
use async_trait::async_trait;
use shared_types::{Address, CanonicalIdentifier, ChannelId, SecretHash, TokenAddress, TokenAmount};

/// Read view of our end of one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelView {
    /// Channel.
    pub canonical_identifier: CanonicalIdentifier,
    /// Token held in the channel.
    pub token_address: TokenAddress,
    /// The other participant.
    pub partner_address: Address,
    /// Amount we can still lock or transfer.
    pub distributable: TokenAmount,
    /// Whether the channel accepts new locks.
    pub is_open: bool,
}

impl ChannelView {
    /// Open and able to lock `amount`.
    pub fn is_usable_for(&self, amount: &TokenAmount) -> bool {
        self.is_open && self.distributable >= *amount
    }
}

/// Our channel ends.
///
/// The `balance_proof_*` methods only compute the next balance proof; the
/// channel changes once [`ChannelLedger::record`] applies the sent effect.
pub trait ChannelLedger: Send + Sync {
    /// View of a channel, if known.
    fn channel(&self, channel_identifier: ChannelId) -> Option<ChannelView>;

    /// Next balance proof with `lock` added.
    fn balance_proof_with_lock(
        &self,
        channel_identifier: ChannelId,
        lock: &HashTimeLock,
    ) -> MediatedTransferResult<BalanceProofUnsignedState>;

    /// Next balance proof with the lock of `secrethash` unlocked to the partner.
    fn balance_proof_with_unlock(
        &self,
        channel_identifier: ChannelId,
        secrethash: &SecretHash,
    ) -> MediatedTransferResult<BalanceProofUnsignedState>;

    /// Next balance proof with the lock of `secrethash` removed as expired.
    fn balance_proof_with_expired(
        &self,
        channel_identifier: ChannelId,
        secrethash: &SecretHash,
    ) -> MediatedTransferResult<BalanceProofUnsignedState>;

    /// Apply an effect we are about to send. Effects that do not change a
    /// balance proof are ignored.
    fn record(&self, event: &Event) -> MediatedTransferResult<()>;

    /// Apply the effects of one transition in order. Either all of them
    /// apply or the ledger is left untouched.
    fn record_all(&self, events: &[Event]) -> MediatedTransferResult<()>;
}

/// Sends effects to the network or the chain.
#[async_trait]
pub trait EffectDispatcher: Send + Sync {
    /// Dispatch one effect.
    async fn dispatch(&self, event: Event) -> MediatedTransferResult<()>;
}
