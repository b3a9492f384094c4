//! # Amounts
//!
//! Token amounts are unsigned 256-bit integers. Arithmetic on them goes
//! through the checked helpers below.

use crate::errors::ValidationError;

pub use primitive_types::U256;

/// Generic token amount.
pub type TokenAmount = U256;

/// Amount held in pending locks.
pub type LockedAmount = U256;

/// Amount the initiator wants the target to receive.
pub type PaymentAmount = U256;

/// Fee allocated for mediators.
pub type FeeAmount = U256;

/// Add two amounts, failing on overflow.
pub fn checked_add(a: U256, b: U256, context: &'static str) -> Result<U256, ValidationError> {
    a.checked_add(b)
        .ok_or(ValidationError::ArithmeticOverflow { context })
}

/// Subtract `b` from `a`, failing on underflow.
pub fn checked_sub(a: U256, b: U256, context: &'static str) -> Result<U256, ValidationError> {
    a.checked_sub(b)
        .ok_or(ValidationError::ArithmeticUnderflow { context })
}

/// Big-endian 32-byte encoding used in hashed payloads.
pub fn u256_to_be_bytes(value: &U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

/// Big-endian 32-byte encoding of a `u64`.
pub fn u64_to_be_bytes32(value: u64) -> [u8; 32] {
    u256_to_be_bytes(&U256::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add_overflow() {
        let err = checked_add(U256::MAX, U256::one(), "locked amount").unwrap_err();
        assert_eq!(
            err,
            ValidationError::ArithmeticOverflow {
                context: "locked amount"
            }
        );
    }

    #[test]
    fn test_checked_sub_underflow() {
        assert!(matches!(
            checked_sub(U256::from(1), U256::from(2), "transferred amount"),
            Err(ValidationError::ArithmeticUnderflow { .. })
        ));
        assert_eq!(
            checked_sub(U256::from(5), U256::from(2), "x").unwrap(),
            U256::from(3)
        );
    }

    #[test]
    fn test_be_encoding() {
        let bytes = u64_to_be_bytes32(0x0102);
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|b| *b == 0));
    }
}
