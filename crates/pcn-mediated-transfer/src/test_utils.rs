//! Deterministic keys and state factories for tests.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! workspace test suite.

#![allow(missing_docs)]
#![allow(clippy::expect_used)]

use crate::adapters::InMemoryChannelLedger;
use crate::domain::{
    BalanceProofSignedState, BalanceProofUnsignedState, HashTimeLock, InitiatorTransferState,
    LockedTransferSignedState, LockedTransferUnsignedState, MediationPairState, RouteState,
    TransferDescriptionParams, TransferDescriptionWithSecretState,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{
    Address, CanonicalIdentifier, Locksroot, MessageHash, Secret, SecretHash, EMPTY_LOCKSROOT,
    U256,
};

pub const ALICE_KEY: [u8; 32] = [0x11; 32];
pub const BOB_KEY: [u8; 32] = [0x22; 32];
pub const CHARLIE_KEY: [u8; 32] = [0x33; 32];
pub const DAVE_KEY: [u8; 32] = [0x44; 32];

/// Chain every factory builds for.
pub const CHAIN_ID: u64 = 1;

/// Deposit of every channel opened by [`ledger_with_channels`].
pub const DEPOSIT: u64 = 1_000;

pub fn keypair(key: [u8; 32]) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes(key).expect("test key is a valid scalar")
}

pub fn address_of(key: [u8; 32]) -> Address {
    Address::new(keypair(key).address())
}

/// Placeholder address filled with `byte`.
pub fn address(byte: u8) -> Address {
    Address::new([byte; 20])
}

pub fn token_address() -> Address {
    address(9)
}

pub fn token_network_address() -> Address {
    address(8)
}

pub fn canonical_identifier(channel: u64) -> CanonicalIdentifier {
    CanonicalIdentifier::new(CHAIN_ID, token_network_address(), U256::from(channel))
}

pub fn make_lock(secrethash: SecretHash, amount: u64, expiration: u64) -> HashTimeLock {
    HashTimeLock::new(U256::from(amount), expiration, secrethash)
}

/// First transfer over `channel`: nonce 1 and the lock as only leaf.
pub fn make_unsigned_transfer_on(
    secrethash: SecretHash,
    amount: u64,
    expiration: u64,
    channel: u64,
) -> LockedTransferUnsignedState {
    let lock = make_lock(secrethash, amount, expiration);
    let balance_proof = BalanceProofUnsignedState::new(
        1,
        U256::zero(),
        lock.amount,
        Locksroot::new(lock.lockhash()),
        canonical_identifier(channel),
    )
    .expect("valid balance proof");
    LockedTransferUnsignedState::new(1, token_address(), balance_proof, lock, address(1), address(4))
        .expect("valid transfer")
}

pub fn make_unsigned_transfer(
    secrethash: SecretHash,
    amount: u64,
    expiration: u64,
) -> LockedTransferUnsignedState {
    make_unsigned_transfer_on(secrethash, amount, expiration, 1)
}

pub fn make_signed_transfer(
    signer: &Secp256k1KeyPair,
    secrethash: SecretHash,
    amount: u64,
    expiration: u64,
    channel: u64,
) -> LockedTransferSignedState {
    make_unsigned_transfer_on(secrethash, amount, expiration, channel)
        .sign(1, signer)
        .expect("signing succeeds")
}

/// Balance proof with no pending locks, as carried by unlock and lock
/// expired messages.
pub fn make_unlock_balance_proof(
    signer: &Secp256k1KeyPair,
    channel: u64,
    transferred: u64,
) -> BalanceProofSignedState {
    BalanceProofUnsignedState::new(
        2,
        U256::from(transferred),
        U256::zero(),
        EMPTY_LOCKSROOT,
        canonical_identifier(channel),
    )
    .expect("valid balance proof")
    .sign(MessageHash::new([7; 32]), signer)
    .expect("signing succeeds")
}

/// Payment of 10 from `address(1)` to `address(4)`.
pub fn make_description_params(secret: Option<Secret>) -> TransferDescriptionParams {
    TransferDescriptionParams {
        payment_network_identifier: address(7),
        payment_identifier: 1,
        amount: U256::from(10),
        allocated_fee: U256::zero(),
        token_network_identifier: token_network_address(),
        initiator: address(1),
        target: address(4),
        secret,
        secrethash: None,
    }
}

/// Pending attempt with secret `[seed; 32]` over channel 1.
pub fn make_initiator_transfer(seed: u8) -> InitiatorTransferState {
    let description =
        TransferDescriptionWithSecretState::new(make_description_params(Some(Secret::new(
            [seed; 32],
        ))))
        .expect("valid description");
    let transfer = make_unsigned_transfer(description.secrethash(), 10, 100);
    InitiatorTransferState::new(description, RouteState::new(address(2), U256::from(1)), transfer)
        .expect("valid attempt")
}

/// Pair paid by Alice over channel 1 and forwarded to `address(5)` over
/// channel 2.
pub fn make_mediation_pair(secrethash: SecretHash) -> MediationPairState {
    let payer = make_signed_transfer(&keypair(ALICE_KEY), secrethash, 10, 100, 1);
    let payee = make_unsigned_transfer_on(secrethash, 10, 100, 2);
    MediationPairState::new(payer, address(5), payee).expect("valid pair")
}

/// Ledger with one open channel per `(partner, channel)`.
pub fn ledger_with_channels(channels: &[(Address, u64)]) -> InMemoryChannelLedger {
    let ledger = InMemoryChannelLedger::new();
    for (partner, channel) in channels {
        ledger.open_channel(
            canonical_identifier(*channel),
            token_address(),
            *partner,
            U256::from(DEPOSIT),
        );
    }
    ledger
}

pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(7)
}
