//! Error types for the store contract and the tuple codec
//!
//! This module defines:
//! - StoreError: a fault reported by the key-value store, identified by a
//!   numeric code with a fixed retryability classification
//! - code: the error codes the store contract defines
//! - TupleError: malformed encodings and version-stamp packing outcomes
//!
//! Store faults are values: callers classify them with the predicates on
//! [`StoreError`] rather than matching on message text.

use std::fmt;
use thiserror::Error;

/// Error codes defined by the store contract.
pub mod code {
    /// Generic failure
    pub const OPERATION_FAILED: i32 = 1000;
    /// Read version is older than the store's retained window
    pub const TRANSACTION_TOO_OLD: i32 = 1007;
    /// Requested read version is newer than any committed version
    pub const FUTURE_VERSION: i32 = 1009;
    /// Conflict detected at commit
    pub const NOT_COMMITTED: i32 = 1020;
    /// Commit outcome is unknown
    pub const COMMIT_UNKNOWN_RESULT: i32 = 1021;
    /// Operation issued on a cancelled transaction
    pub const TRANSACTION_CANCELLED: i32 = 1025;
    /// Transaction exceeded its timeout
    pub const TRANSACTION_TIMED_OUT: i32 = 1031;
    /// Read of a key whose value depends on the commit versionstamp
    pub const ACCESSED_UNREADABLE: i32 = 1036;
    /// Storage server fell behind
    pub const PROCESS_BEHIND: i32 = 1037;
    /// Asynchronous operation cancelled
    pub const OPERATION_CANCELLED: i32 = 1101;
    /// Result was consumed or released before it was read
    pub const FUTURE_RELEASED: i32 = 1102;
    /// Transaction throttled by tag
    pub const TAG_THROTTLED: i32 = 1213;
    /// Invalid operation for the client state
    pub const CLIENT_INVALID_OPERATION: i32 = 2000;
    /// Key outside the legal range
    pub const KEY_OUTSIDE_LEGAL_RANGE: i32 = 2004;
    /// Range begin is after range end
    pub const INVERTED_RANGE: i32 = 2005;
    /// Option value out of range
    pub const INVALID_OPTION_VALUE: i32 = 2006;
    /// Option not recognized
    pub const INVALID_OPTION: i32 = 2007;
    /// Version is not valid
    pub const VERSION_INVALID: i32 = 2011;
    /// Result was never produced
    pub const FUTURE_NOT_SET: i32 = 2015;
    /// Operation issued while a commit is in flight
    pub const USED_DURING_COMMIT: i32 = 2017;
    /// Read-only transaction has no commit version
    pub const NO_COMMIT_VERSION: i32 = 2021;
    /// Transaction exceeds the size limit
    pub const TRANSACTION_TOO_LARGE: i32 = 2101;
    /// Key exceeds the size limit
    pub const KEY_TOO_LARGE: i32 = 2102;
    /// Value exceeds the size limit
    pub const VALUE_TOO_LARGE: i32 = 2103;
    /// Client API version not supported
    pub const API_VERSION_NOT_SUPPORTED: i32 = 2203;

    /// Codes the client library uses for result-lifecycle bookkeeping.
    ///
    /// These never reach user code as failures of a real operation; a test
    /// driver that asks for them explicitly must treat them specially.
    pub const RESOURCE_LIFECYCLE: [i32; 2] = [FUTURE_RELEASED, FUTURE_NOT_SET];

    /// Human-readable description of a code.
    pub fn describe(code: i32) -> &'static str {
        match code {
            OPERATION_FAILED => "Operation failed",
            TRANSACTION_TOO_OLD => "Transaction is too old to perform reads or be committed",
            FUTURE_VERSION => "Request for future version",
            NOT_COMMITTED => "Transaction not committed due to conflict with another transaction",
            COMMIT_UNKNOWN_RESULT => "Transaction may or may not have committed",
            TRANSACTION_CANCELLED => "Operation aborted because the transaction was cancelled",
            TRANSACTION_TIMED_OUT => "Operation aborted because the transaction timed out",
            ACCESSED_UNREADABLE => "Read or wrote an unreadable key",
            PROCESS_BEHIND => "Storage process does not have recent mutations",
            OPERATION_CANCELLED => "Asynchronous operation cancelled",
            FUTURE_RELEASED => "Future has been released",
            TAG_THROTTLED => "Transaction tag is being throttled",
            CLIENT_INVALID_OPERATION => "Invalid API call",
            KEY_OUTSIDE_LEGAL_RANGE => "Key outside legal range",
            INVERTED_RANGE => "Range begin key larger than end key",
            INVALID_OPTION_VALUE => "Option set with an invalid value",
            INVALID_OPTION => "Option not valid in this context",
            VERSION_INVALID => "Version not valid",
            FUTURE_NOT_SET => "Future not ready",
            USED_DURING_COMMIT => "Operation issued while a commit was outstanding",
            NO_COMMIT_VERSION => "Transaction is read-only and therefore does not have a commit version",
            TRANSACTION_TOO_LARGE => "Transaction exceeds byte limit",
            KEY_TOO_LARGE => "Key length exceeds limit",
            VALUE_TOO_LARGE => "Value length exceeds limit",
            API_VERSION_NOT_SUPPORTED => "API version not supported",
            _ => "Unknown error",
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A fault reported by the store, identified by its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreError {
    code: i32,
}

impl StoreError {
    /// Create an error carrying `code`.
    pub fn new(code: i32) -> Self {
        StoreError { code }
    }

    /// The numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Description from the contract's code table.
    pub fn message(&self) -> &'static str {
        code::describe(self.code)
    }

    /// Whether a retry loop should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            code::TRANSACTION_TOO_OLD
                | code::FUTURE_VERSION
                | code::NOT_COMMITTED
                | code::COMMIT_UNKNOWN_RESULT
                | code::PROCESS_BEHIND
                | code::TAG_THROTTLED
        )
    }

    /// Whether the failed commit may nevertheless have been applied.
    pub fn is_maybe_committed(&self) -> bool {
        self.code == code::COMMIT_UNKNOWN_RESULT
    }

    /// Retryable and known not to have committed.
    pub fn is_retryable_not_committed(&self) -> bool {
        self.is_retryable() && !self.is_maybe_committed()
    }

    /// Whether this is one of the result-lifecycle bookkeeping codes.
    pub fn is_resource_lifecycle(&self) -> bool {
        code::RESOURCE_LIFECYCLE.contains(&self.code)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code)
    }
}

impl std::error::Error for StoreError {}

/// Tuple codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    /// Encoding ended in the middle of an element
    #[error("truncated tuple encoding at offset {offset}")]
    Truncated {
        /// Offset where more bytes were expected
        offset: usize,
    },

    /// Unknown type code
    #[error("unknown type code 0x{code:02x} at offset {offset}")]
    UnknownTypeCode {
        /// The offending code
        code: u8,
        /// Offset of the code
        offset: usize,
    },

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 in string element at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the element
        offset: usize,
    },

    /// Integer magnitude does not fit the codec's length byte
    #[error("integer of {bytes} bytes exceeds the 255-byte encoding limit")]
    IntegerTooLarge {
        /// Magnitude length in bytes
        bytes: usize,
    },

    /// Versionstamp packing requested with no placeholder present
    #[error("No incomplete versionstamp included in tuple")]
    NoIncompleteVersionstamp,

    /// Versionstamp packing requested with more than one placeholder
    #[error("Multiple incomplete versionstamps ({count}) included in tuple")]
    MultipleIncompleteVersionstamps {
        /// Number of placeholders found
        count: usize,
    },

    /// Placeholder position does not fit the 2-byte offset
    #[error("versionstamp offset {offset} does not fit in two bytes")]
    VersionstampOffsetOverflow {
        /// Byte position of the placeholder
        offset: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::new(code::NOT_COMMITTED).is_retryable());
        assert!(StoreError::new(code::TRANSACTION_TOO_OLD).is_retryable());
        assert!(!StoreError::new(10).is_retryable());
        assert!(!StoreError::new(code::TRANSACTION_CANCELLED).is_retryable());
    }

    #[test]
    fn test_maybe_committed() {
        let err = StoreError::new(code::COMMIT_UNKNOWN_RESULT);
        assert!(err.is_retryable());
        assert!(err.is_maybe_committed());
        assert!(!err.is_retryable_not_committed());
        assert!(StoreError::new(code::NOT_COMMITTED).is_retryable_not_committed());
    }

    #[test]
    fn test_resource_lifecycle_codes() {
        assert!(StoreError::new(code::FUTURE_RELEASED).is_resource_lifecycle());
        assert!(StoreError::new(code::FUTURE_NOT_SET).is_resource_lifecycle());
        assert!(!StoreError::new(code::NOT_COMMITTED).is_resource_lifecycle());
    }

    #[test]
    fn test_store_error_display() {
        let msg = StoreError::new(code::NOT_COMMITTED).to_string();
        assert!(msg.contains("conflict"));
        assert!(msg.contains("1020"));
        assert!(StoreError::new(4242).to_string().contains("Unknown error"));
    }

    #[test]
    fn test_tuple_error_display() {
        let err = TupleError::UnknownTypeCode { code: 0x99, offset: 3 };
        assert!(err.to_string().contains("0x99"));
        assert!(TupleError::NoIncompleteVersionstamp
            .to_string()
            .starts_with("No incomplete"));
    }
}
