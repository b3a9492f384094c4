//! # Domain Invariants
//!
//! Rules shared by the constructors of transfers, pairs and role states.

use super::balance_proof::BalanceProof;
use super::lock::HashTimeLock;
use shared_crypto::keccak256;
use shared_types::{
    checked_add, checked_sub, Address, LockedAmount, Locksroot, Secret, SecretHash,
    ValidationError, EMPTY_LOCKSROOT, U256,
};

/// Hash of a secret.
pub fn secrethash_of(secret: &Secret) -> SecretHash {
    SecretHash::new(keccak256(secret.as_bytes()))
}

/// Invariant: a balance proof with pending locks commits to them.
pub fn invariant_locksroot_committed(
    locked_amount: &LockedAmount,
    locksroot: &Locksroot,
) -> Result<(), ValidationError> {
    if !locked_amount.is_zero() && *locksroot == EMPTY_LOCKSROOT {
        return Err(ValidationError::EmptyLocksroot);
    }
    Ok(())
}

/// Invariant: a locked transfer always has at least its own lock committed.
pub fn invariant_locksroot_not_empty(locksroot: &Locksroot) -> Result<(), ValidationError> {
    if *locksroot == EMPTY_LOCKSROOT {
        return Err(ValidationError::EmptyLocksroot);
    }
    Ok(())
}

/// Invariant: the balance proof locks at least the transfer's lock amount.
pub fn invariant_lock_covered(
    lock_amount: &U256,
    locked_amount: &LockedAmount,
) -> Result<(), ValidationError> {
    if lock_amount > locked_amount {
        return Err(ValidationError::LockNotCovered {
            lock_amount: *lock_amount,
            locked_amount: *locked_amount,
        });
    }
    Ok(())
}

/// Invariant: `keccak256(secret) == secrethash`.
pub fn invariant_secret_matches(
    secret: &Secret,
    secrethash: &SecretHash,
) -> Result<(), ValidationError> {
    if secrethash_of(secret) != *secrethash {
        return Err(ValidationError::SecretHashMismatch);
    }
    Ok(())
}

/// Invariant: every lock of one mediated transfer shares its secrethash.
pub fn invariant_same_secrethash(
    expected: &SecretHash,
    actual: &SecretHash,
) -> Result<(), ValidationError> {
    if expected != actual {
        return Err(ValidationError::SecretHashMismatch);
    }
    Ok(())
}

/// Invariant: an address field holds a real address.
pub fn invariant_address_set(field: &'static str, address: &Address) -> Result<(), ValidationError> {
    if address.is_zero() {
        return Err(ValidationError::InvalidField {
            field,
            reason: "zero address".to_string(),
        });
    }
    Ok(())
}

/// Invariant: `next` claims `lock` on top of `previous`. The lock moves
/// from the locked to the transferred amount and leaves the locksroot.
pub fn invariant_unlocks_lock(
    previous: &impl BalanceProof,
    next: &impl BalanceProof,
    lock: &HashTimeLock,
) -> Result<(), ValidationError> {
    invariant_follows(previous, next)?;
    let transferred = checked_add(
        previous.transferred_amount(),
        lock.amount,
        "transferred amount after unlock",
    )?;
    if next.transferred_amount() != transferred {
        return Err(amount_mismatch(
            "transferred_amount",
            transferred,
            next.transferred_amount(),
        ));
    }
    invariant_lock_released(previous, next, lock)
}

/// Invariant: `next` drops the expired `lock` from `previous` and pays
/// nothing for it.
pub fn invariant_expires_lock(
    previous: &impl BalanceProof,
    next: &impl BalanceProof,
    lock: &HashTimeLock,
) -> Result<(), ValidationError> {
    invariant_follows(previous, next)?;
    if next.transferred_amount() != previous.transferred_amount() {
        return Err(amount_mismatch(
            "transferred_amount",
            previous.transferred_amount(),
            next.transferred_amount(),
        ));
    }
    invariant_lock_released(previous, next, lock)
}

fn invariant_follows(
    previous: &impl BalanceProof,
    next: &impl BalanceProof,
) -> Result<(), ValidationError> {
    if next.canonical_identifier() != previous.canonical_identifier() {
        return Err(ValidationError::InvalidField {
            field: "canonical_identifier",
            reason: "balance proof is for another channel".to_string(),
        });
    }
    if next.nonce() <= previous.nonce() {
        return Err(ValidationError::InvalidField {
            field: "nonce",
            reason: format!("nonce {} does not follow {}", next.nonce(), previous.nonce()),
        });
    }
    Ok(())
}

fn invariant_lock_released(
    previous: &impl BalanceProof,
    next: &impl BalanceProof,
    lock: &HashTimeLock,
) -> Result<(), ValidationError> {
    let locked = checked_sub(
        previous.locked_amount(),
        lock.amount,
        "locked amount after release",
    )?;
    if next.locked_amount() != locked {
        return Err(amount_mismatch("locked_amount", locked, next.locked_amount()));
    }
    if next.locksroot() == previous.locksroot() {
        return Err(ValidationError::InvalidField {
            field: "locksroot",
            reason: "locksroot still commits to the lock".to_string(),
        });
    }
    Ok(())
}

fn amount_mismatch(field: &'static str, expected: U256, actual: U256) -> ValidationError {
    ValidationError::InvalidField {
        field,
        reason: format!("expected {}, got {}", expected, actual),
    }
}
