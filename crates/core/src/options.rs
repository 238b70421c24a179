//! Atomic mutation types and database/transaction options

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Atomic read-modify-write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationType {
    /// Little-endian integer addition
    Add,
    /// Bitwise AND (also named `AND`)
    BitAnd,
    /// Bitwise OR (also named `OR`)
    BitOr,
    /// Bitwise XOR (also named `XOR`)
    BitXor,
    /// Append the parameter if the result stays within the value limit
    AppendIfFits,
    /// Little-endian unsigned maximum
    Max,
    /// Little-endian unsigned minimum
    Min,
    /// Set a key whose bytes embed the commit versionstamp
    SetVersionstampedKey,
    /// Set a value whose bytes embed the commit versionstamp
    SetVersionstampedValue,
    /// Lexicographic minimum
    ByteMin,
    /// Lexicographic maximum
    ByteMax,
}

impl MutationType {
    /// Canonical operand name
    pub fn name(&self) -> &'static str {
        match self {
            MutationType::Add => "ADD",
            MutationType::BitAnd => "BIT_AND",
            MutationType::BitOr => "BIT_OR",
            MutationType::BitXor => "BIT_XOR",
            MutationType::AppendIfFits => "APPEND_IF_FITS",
            MutationType::Max => "MAX",
            MutationType::Min => "MIN",
            MutationType::SetVersionstampedKey => "SET_VERSIONSTAMPED_KEY",
            MutationType::SetVersionstampedValue => "SET_VERSIONSTAMPED_VALUE",
            MutationType::ByteMin => "BYTE_MIN",
            MutationType::ByteMax => "BYTE_MAX",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized mutation type name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mutation type: {0}")]
pub struct UnknownMutationType(pub String);

impl FromStr for MutationType {
    type Err = UnknownMutationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(MutationType::Add),
            "AND" | "BIT_AND" => Ok(MutationType::BitAnd),
            "OR" | "BIT_OR" => Ok(MutationType::BitOr),
            "XOR" | "BIT_XOR" => Ok(MutationType::BitXor),
            "APPEND_IF_FITS" => Ok(MutationType::AppendIfFits),
            "MAX" => Ok(MutationType::Max),
            "MIN" => Ok(MutationType::Min),
            "SET_VERSIONSTAMPED_KEY" => Ok(MutationType::SetVersionstampedKey),
            "SET_VERSIONSTAMPED_VALUE" => Ok(MutationType::SetVersionstampedValue),
            "BYTE_MIN" => Ok(MutationType::ByteMin),
            "BYTE_MAX" => Ok(MutationType::ByteMax),
            other => Err(UnknownMutationType(other.to_string())),
        }
    }
}

/// Options settable on a database handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseOption {
    /// Client-side location cache size
    LocationCacheSize(i64),
    /// Maximum outstanding watches
    MaxWatches(i64),
    /// Machine identifier used for locality
    MachineId(String),
    /// Datacenter identifier used for locality
    DatacenterId(String),
}

/// Options settable on a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOption {
    /// Highest priority, for system operations
    PrioritySystemImmediate,
    /// Lowest priority, for background work
    PriorityBatch,
    /// Allow reads that may not be causally consistent
    CausalReadRisky,
    /// Allow writes that may not be causally consistent
    CausalWriteRisky,
    /// Reads do not see this transaction's own writes
    ReadYourWritesDisable,
    /// Disable read-ahead caching
    ReadAheadDisable,
    /// Allow reads of keys at or above `0xFF`
    ReadSystemKeys,
    /// Allow reads and writes of keys at or above `0xFF`
    AccessSystemKeys,
    /// Test-only durability mode
    DurabilityDevNullIsWebScale,
    /// Fail with `TRANSACTION_TIMED_OUT` after the given milliseconds (0 disables)
    Timeout(i64),
    /// Maximum `on_error` retries (-1 for unlimited)
    RetryLimit(i64),
    /// Upper bound on the `on_error` backoff in milliseconds
    MaxRetryDelay(i64),
    /// Disable protection against use while a commit is in flight
    UsedDuringCommitProtectionDisable,
    /// Enable transaction logging under an identifier
    TransactionLoggingEnable(String),
    /// The next write adds no write conflict range
    NextWriteNoWriteConflictRange,
}
