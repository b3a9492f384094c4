//! # PCN Telemetry
//!
//! Structured logging for payment channel network nodes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pcn_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_logging(&config).expect("Failed to init logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PCN_SERVICE_NAME` | `pcn-node` | Service name in log records |
//! | `PCN_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `PCN_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PCN_JSON_LOGS` | `false` | JSON formatted records |

#![warn(missing_docs)]

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_logging, LoggingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber was already installed.
    #[error("Failed to install subscriber: {0}")]
    SubscriberInit(String),
}
