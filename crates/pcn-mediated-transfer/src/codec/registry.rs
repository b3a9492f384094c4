//! Process-wide record type registry.
//!
//! Built once on first use and read-only afterwards.

use super::{decode, peek_tag, CodecError, Record};
use crate::domain::{
    BalanceProofSignedState, BalanceProofUnsignedState, HashTimeLock, InitiatorPaymentState,
    InitiatorTransferState, LockedTransferSignedState, LockedTransferUnsignedState,
    MediationPairState, MediatorTransferState, RouteState, TargetTransferState,
    TransferDescriptionWithSecretState, WaitingTransferState,
};
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;

/// Any decoded state entity.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum AnyRecord {
    /// A lock.
    HashTimeLock(HashTimeLock),
    /// An unsigned balance proof.
    BalanceProofUnsigned(BalanceProofUnsignedState),
    /// A signed balance proof.
    BalanceProofSigned(BalanceProofSignedState),
    /// An unsigned locked transfer.
    LockedTransferUnsigned(LockedTransferUnsignedState),
    /// A signed locked transfer.
    LockedTransferSigned(LockedTransferSignedState),
    /// A transfer description.
    TransferDescription(TransferDescriptionWithSecretState),
    /// A route.
    Route(RouteState),
    /// An initiator attempt.
    InitiatorTransfer(InitiatorTransferState),
    /// An initiator payment.
    InitiatorPayment(InitiatorPaymentState),
    /// A mediated hop.
    MediationPair(MediationPairState),
    /// A parked transfer.
    WaitingTransfer(WaitingTransferState),
    /// A mediator transfer.
    MediatorTransfer(MediatorTransferState),
    /// A target transfer.
    TargetTransfer(TargetTransferState),
}

impl AnyRecord {
    /// Tag of the wrapped record.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::HashTimeLock(_) => HashTimeLock::TYPE_TAG,
            Self::BalanceProofUnsigned(_) => BalanceProofUnsignedState::TYPE_TAG,
            Self::BalanceProofSigned(_) => BalanceProofSignedState::TYPE_TAG,
            Self::LockedTransferUnsigned(_) => LockedTransferUnsignedState::TYPE_TAG,
            Self::LockedTransferSigned(_) => LockedTransferSignedState::TYPE_TAG,
            Self::TransferDescription(_) => TransferDescriptionWithSecretState::TYPE_TAG,
            Self::Route(_) => RouteState::TYPE_TAG,
            Self::InitiatorTransfer(_) => InitiatorTransferState::TYPE_TAG,
            Self::InitiatorPayment(_) => InitiatorPaymentState::TYPE_TAG,
            Self::MediationPair(_) => MediationPairState::TYPE_TAG,
            Self::WaitingTransfer(_) => WaitingTransferState::TYPE_TAG,
            Self::MediatorTransfer(_) => MediatorTransferState::TYPE_TAG,
            Self::TargetTransfer(_) => TargetTransferState::TYPE_TAG,
        }
    }
}

type Decoder = fn(Value) -> Result<AnyRecord, CodecError>;

fn register<T: Record>(
    registry: &mut HashMap<&'static str, Decoder>,
    decoder: Decoder,
) {
    registry.insert(T::TYPE_TAG, decoder);
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, Decoder> = {
        let mut registry: HashMap<&'static str, Decoder> = HashMap::new();
        register::<HashTimeLock>(&mut registry, |v| decode(v).map(AnyRecord::HashTimeLock));
        register::<BalanceProofUnsignedState>(&mut registry, |v| {
            decode(v).map(AnyRecord::BalanceProofUnsigned)
        });
        register::<BalanceProofSignedState>(&mut registry, |v| {
            decode(v).map(AnyRecord::BalanceProofSigned)
        });
        register::<LockedTransferUnsignedState>(&mut registry, |v| {
            decode(v).map(AnyRecord::LockedTransferUnsigned)
        });
        register::<LockedTransferSignedState>(&mut registry, |v| {
            decode(v).map(AnyRecord::LockedTransferSigned)
        });
        register::<TransferDescriptionWithSecretState>(&mut registry, |v| {
            decode(v).map(AnyRecord::TransferDescription)
        });
        register::<RouteState>(&mut registry, |v| decode(v).map(AnyRecord::Route));
        register::<InitiatorTransferState>(&mut registry, |v| {
            decode(v).map(AnyRecord::InitiatorTransfer)
        });
        register::<InitiatorPaymentState>(&mut registry, |v| {
            decode(v).map(AnyRecord::InitiatorPayment)
        });
        register::<MediationPairState>(&mut registry, |v| {
            decode(v).map(AnyRecord::MediationPair)
        });
        register::<WaitingTransferState>(&mut registry, |v| {
            decode(v).map(AnyRecord::WaitingTransfer)
        });
        register::<MediatorTransferState>(&mut registry, |v| {
            decode(v).map(AnyRecord::MediatorTransfer)
        });
        register::<TargetTransferState>(&mut registry, |v| {
            decode(v).map(AnyRecord::TargetTransfer)
        });
        registry
    };
}

/// Decode a top-level record of whatever type its `_type` names.
pub fn decode_any(value: Value) -> Result<AnyRecord, CodecError> {
    let tag = peek_tag(&value).ok_or(CodecError::MissingTag("record"))?;
    let decoder = REGISTRY
        .get(tag)
        .ok_or_else(|| CodecError::UnknownTag(tag.to_string()))?;
    decoder(value)
}

/// Every registered tag, sorted.
pub fn registered_tags() -> Vec<&'static str> {
    let mut tags: Vec<&'static str> = REGISTRY.keys().copied().collect();
    tags.sort_unstable();
    tags
}
