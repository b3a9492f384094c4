//! # PCN Test Suite
//!
//! Unified test crate for mediated transfers.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── network.rs        # In-process network of transfer services
//! └── integration/      # End-to-end scenarios
//!     ├── scenarios.rs      # Construction and ordering scenarios
//!     ├── payment_flows.rs  # Multi-hop payments, expiry, on-chain unlock
//!     └── codec_roundtrip.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pcn-tests
//! cargo test -p pcn-tests integration::payment_flows::
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod network;
