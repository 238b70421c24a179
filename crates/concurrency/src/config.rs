//! Store tunables
//!
//! Read from the `[store]` section of the tester's configuration file. Every
//! field has a default so an empty section is valid.

use serde::{Deserialize, Serialize};
use stacktester_core::Limits;

/// Configuration of the in-memory store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// First `on_error` backoff in milliseconds (default: 10)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the `on_error` backoff in milliseconds (default: 1000)
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Retry limit applied when a transaction sets none; absent means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_retry_limit: Option<u32>,

    /// Number of commit versions a read version stays valid for (default: 5 000 000)
    #[serde(default = "default_version_window")]
    pub version_window: u64,

    /// Commits between version-history pruning passes (default: 1000)
    #[serde(default = "default_gc_interval")]
    pub gc_interval: u64,

    /// Maximum key length in bytes (default: 10 000)
    #[serde(default = "default_max_key_bytes")]
    pub max_key_bytes: usize,

    /// Maximum value length in bytes (default: 100 000)
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,

    /// Maximum transaction size in bytes (default: 10 000 000)
    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,
}

fn default_initial_backoff_ms() -> u64 {
    10
}

fn default_max_retry_delay_ms() -> u64 {
    1000
}

fn default_version_window() -> u64 {
    5_000_000
}

fn default_gc_interval() -> u64 {
    1000
}

fn default_max_key_bytes() -> usize {
    Limits::default().max_key_bytes
}

fn default_max_value_bytes() -> usize {
    Limits::default().max_value_bytes
}

fn default_max_transaction_bytes() -> usize {
    Limits::default().max_transaction_bytes
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            default_retry_limit: None,
            version_window: default_version_window(),
            gc_interval: default_gc_interval(),
            max_key_bytes: default_max_key_bytes(),
            max_value_bytes: default_max_value_bytes(),
            max_transaction_bytes: default_max_transaction_bytes(),
        }
    }
}

impl DatabaseConfig {
    /// Size limits described by this configuration
    pub fn limits(&self) -> Limits {
        Limits {
            max_key_bytes: self.max_key_bytes,
            max_value_bytes: self.max_value_bytes,
            max_transaction_bytes: self.max_transaction_bytes,
            ..Limits::default()
        }
    }

    /// Configuration for tests: no backoff, small version window
    pub fn for_testing() -> Self {
        Self {
            initial_backoff_ms: 0,
            max_retry_delay_ms: 0,
            version_window: 1_000,
            gc_interval: 10,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_match_core() {
        assert_eq!(DatabaseConfig::default().limits(), Limits::default());
    }

    #[test]
    fn test_testing_config_has_no_backoff() {
        let config = DatabaseConfig::for_testing();
        assert_eq!(config.initial_backoff_ms, 0);
        assert_eq!(config.max_retry_delay_ms, 0);
    }
}
