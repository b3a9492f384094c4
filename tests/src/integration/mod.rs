//! # Integration Tests
//!
//! End-to-end mediated transfer scenarios across crates.

pub mod codec_roundtrip;
pub mod payment_flows;
pub mod scenarios;
