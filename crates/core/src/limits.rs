//! Size limits for keys, values and transactions
//!
//! These are the limits a store enforces on each mutation and at commit.
//! Violations are reported as store errors with the matching code so that
//! they surface through the same channel as every other store fault.

use crate::error::{code, StoreError, StoreResult};

/// Size limits for keys, values and transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum key length in bytes (default: 10 000)
    pub max_key_bytes: usize,

    /// Maximum key length in bytes for keys in the system keyspace (default: 30 000)
    pub max_system_key_bytes: usize,

    /// Maximum value length in bytes (default: 100 000)
    pub max_value_bytes: usize,

    /// Maximum approximate transaction size in bytes (default: 10 000 000)
    pub max_transaction_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 10_000,
            max_system_key_bytes: 30_000,
            max_value_bytes: 100_000,
            max_transaction_bytes: 10_000_000,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_key_bytes: 16,
            max_system_key_bytes: 32,
            max_value_bytes: 64,
            max_transaction_bytes: 256,
        }
    }

    /// Validate a key length.
    ///
    /// Keys starting with `0xFF` are checked against the system-key limit.
    pub fn validate_key(&self, key: &[u8]) -> StoreResult<()> {
        let max = if key.first() == Some(&0xFF) {
            self.max_system_key_bytes
        } else {
            self.max_key_bytes
        };
        if key.len() > max {
            return Err(StoreError::new(code::KEY_TOO_LARGE));
        }
        Ok(())
    }

    /// Validate a value length
    pub fn validate_value(&self, value: &[u8]) -> StoreResult<()> {
        if value.len() > self.max_value_bytes {
            return Err(StoreError::new(code::VALUE_TOO_LARGE));
        }
        Ok(())
    }

    /// Validate the accumulated size of a transaction
    pub fn validate_transaction_size(&self, bytes: usize) -> StoreResult<()> {
        if bytes > self.max_transaction_bytes {
            return Err(StoreError::new(code::TRANSACTION_TOO_LARGE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_key_bytes, 10_000);
        assert_eq!(limits.max_value_bytes, 100_000);
        assert_eq!(limits.max_transaction_bytes, 10_000_000);
    }

    #[test]
    fn test_key_too_large() {
        let limits = Limits::with_small_limits();
        assert!(limits.validate_key(&[b'a'; 16]).is_ok());
        let err = limits.validate_key(&[b'a'; 17]).unwrap_err();
        assert_eq!(err.code(), code::KEY_TOO_LARGE);
    }

    #[test]
    fn test_system_key_uses_larger_limit() {
        let limits = Limits::with_small_limits();
        let mut key = vec![0xFF];
        key.extend_from_slice(&[b'a'; 30]);
        assert!(limits.validate_key(&key).is_ok());
    }

    #[test]
    fn test_value_and_transaction_limits() {
        let limits = Limits::with_small_limits();
        assert_eq!(
            limits.validate_value(&[0; 65]).unwrap_err().code(),
            code::VALUE_TOO_LARGE
        );
        assert_eq!(
            limits.validate_transaction_size(257).unwrap_err().code(),
            code::TRANSACTION_TOO_LARGE
        );
        assert!(limits.validate_transaction_size(256).is_ok());
    }
}
