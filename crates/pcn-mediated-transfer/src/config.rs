//! Mediated transfer configuration.

use serde::{Deserialize, Serialize};
use shared_types::{BlockTimeout, ChainId};
use std::env;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Values are individually valid but contradict each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Protocol parameters shared by all roles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatedTransferConfig {
    /// Chain the token networks live on.
    pub chain_id: ChainId,
    /// Blocks before expiration at which a node stops trusting off-chain
    /// progress and registers the secret on-chain.
    pub reveal_timeout: BlockTimeout,
    /// Lifetime in blocks of a lock created by an initiator.
    pub lock_timeout: BlockTimeout,
    /// Attempts an initiator makes for one payment.
    pub max_attempts: usize,
}

impl Default for MediatedTransferConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            reveal_timeout: 50,
            lock_timeout: 100,
            max_attempts: 3,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

impl MediatedTransferConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PCN_CHAIN_ID` (default: 1)
    /// - `PCN_REVEAL_TIMEOUT` (default: 50)
    /// - `PCN_LOCK_TIMEOUT` (default: 100)
    /// - `PCN_MAX_ATTEMPTS` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`MediatedTransferConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            chain_id: parse("PCN_CHAIN_ID", lookup("PCN_CHAIN_ID"), defaults.chain_id)?,
            reveal_timeout: parse(
                "PCN_REVEAL_TIMEOUT",
                lookup("PCN_REVEAL_TIMEOUT"),
                defaults.reveal_timeout,
            )?,
            lock_timeout: parse(
                "PCN_LOCK_TIMEOUT",
                lookup("PCN_LOCK_TIMEOUT"),
                defaults.lock_timeout,
            )?,
            max_attempts: parse(
                "PCN_MAX_ATTEMPTS",
                lookup("PCN_MAX_ATTEMPTS"),
                defaults.max_attempts,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the timeouts leave room for an on-chain reveal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reveal_timeout == 0 {
            return Err(ConfigError::Inconsistent(
                "reveal_timeout must be non-zero".to_string(),
            ));
        }
        if self.reveal_timeout >= self.lock_timeout {
            return Err(ConfigError::Inconsistent(format!(
                "reveal_timeout {} must be smaller than lock_timeout {}",
                self.reveal_timeout, self.lock_timeout
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Inconsistent(
                "max_attempts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
