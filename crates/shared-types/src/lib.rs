//! # Shared Types Crate
//!
//! Primitive value types for mediated transfers in the payment channel
//! network.
//!
//! ## Design Principles
//!
//! - **Valid by construction**: fixed-length identifiers can only be built
//!   from input of the exact length; anything else is a `ValidationError`.
//! - **No silent wrapping**: amount and nonce arithmetic is checked and
//!   reports overflow/underflow as an error.
//! - **Hex on the wire**: every byte identifier serializes as a
//!   `0x`-prefixed lowercase hex string so records round-trip exactly.

pub mod amounts;
pub mod bytes;
pub mod errors;
pub mod identifiers;
pub mod secret;

pub use amounts::*;
pub use bytes::*;
pub use errors::*;
pub use identifiers::*;
pub use secret::Secret;
