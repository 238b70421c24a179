//! Value types of the store contract
//!
//! This module defines the plain data exchanged with a store:
//! - KeySelector: a key reference resolved relative to the keyspace
//! - KeyValue: one entry of a range read
//! - StreamingMode: prefetch hint for range reads
//! - RangeOptions / RangePage: range read parameters and one page of results
//! - ConflictRangeType: which conflict set a manual range is added to

use std::fmt;

use crate::key::key_after;

// =============================================================================
// Key selectors
// =============================================================================

/// A key reference resolved by the store.
///
/// The selector names the last key less than (or equal to, when `or_equal`
/// is set) `key`, then moves `offset` keys forward from there. An offset of
/// 1 therefore means "the first key after the base".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySelector {
    /// Reference key
    pub key: Vec<u8>,
    /// Whether the base includes `key` itself
    pub or_equal: bool,
    /// Number of keys to move from the base
    pub offset: i32,
}

impl KeySelector {
    /// Build a selector from its three parts.
    pub fn new(key: impl Into<Vec<u8>>, or_equal: bool, offset: i32) -> Self {
        KeySelector {
            key: key.into(),
            or_equal,
            offset,
        }
    }

    /// Last key strictly less than `key`.
    pub fn last_less_than(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, false, 0)
    }

    /// Last key less than or equal to `key`.
    pub fn last_less_or_equal(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, true, 0)
    }

    /// First key strictly greater than `key`.
    pub fn first_greater_than(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, true, 1)
    }

    /// First key greater than or equal to `key`.
    pub fn first_greater_or_equal(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, false, 1)
    }

    /// Selector moved `delta` keys further along.
    pub fn add(&self, delta: i32) -> Self {
        Self::new(self.key.clone(), self.or_equal, self.offset + delta)
    }

    /// For a plain `first_greater_or_equal`/`first_greater_than` selector, the
    /// concrete lower bound it denotes.
    pub fn as_lower_bound(&self) -> Option<Vec<u8>> {
        match (self.or_equal, self.offset) {
            (false, 1) => Some(self.key.clone()),
            (true, 1) => Some(key_after(&self.key)),
            _ => None,
        }
    }
}

impl fmt::Display for KeySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeySelector({}, {}, {})",
            crate::key::printable(&self.key),
            self.or_equal,
            self.offset
        )
    }
}

// =============================================================================
// Range reads
// =============================================================================

/// One key/value entry returned by a range read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    /// Key bytes
    pub key: Vec<u8>,
    /// Value bytes
    pub value: Vec<u8>,
}

impl KeyValue {
    /// Create an entry
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Prefetch hint for range reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamingMode {
    /// Return the whole range in as few batches as possible
    WantAll,
    /// Grow batch sizes as the caller keeps iterating
    #[default]
    Iterator,
    /// Return exactly `limit` entries in one batch
    Exact,
    /// Small batches
    Small,
    /// Medium batches
    Medium,
    /// Large batches
    Large,
    /// Batches sized for a single serial consumer
    Serial,
}

impl StreamingMode {
    /// Decode a mode from its integer code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -2 => Some(StreamingMode::WantAll),
            -1 => Some(StreamingMode::Iterator),
            0 => Some(StreamingMode::Exact),
            1 => Some(StreamingMode::Small),
            2 => Some(StreamingMode::Medium),
            3 => Some(StreamingMode::Large),
            4 => Some(StreamingMode::Serial),
            _ => None,
        }
    }

    /// Integer code of the mode
    pub fn code(&self) -> i64 {
        match self {
            StreamingMode::WantAll => -2,
            StreamingMode::Iterator => -1,
            StreamingMode::Exact => 0,
            StreamingMode::Small => 1,
            StreamingMode::Medium => 2,
            StreamingMode::Large => 3,
            StreamingMode::Serial => 4,
        }
    }

    /// Suggested page size for the `iteration`-th page (1-based).
    pub fn page_size(&self, iteration: u32) -> usize {
        match self {
            StreamingMode::WantAll | StreamingMode::Serial => 10_000,
            StreamingMode::Exact => usize::MAX,
            StreamingMode::Small => 10,
            StreamingMode::Medium => 100,
            StreamingMode::Large => 1_000,
            StreamingMode::Iterator => {
                let shift = iteration.saturating_sub(1).min(10);
                (10usize << shift).min(10_000)
            }
        }
    }
}

/// Parameters of a range read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeOptions {
    /// Maximum number of entries, 0 for unlimited
    pub limit: usize,
    /// Return entries in descending key order
    pub reverse: bool,
    /// Prefetch hint
    pub mode: StreamingMode,
    /// 1-based page number, used with `StreamingMode::Iterator`
    pub iteration: u32,
}

impl RangeOptions {
    /// Options with an explicit limit, direction and mode
    pub fn new(limit: usize, reverse: bool, mode: StreamingMode) -> Self {
        RangeOptions {
            limit,
            reverse,
            mode,
            iteration: 1,
        }
    }
}

/// One page of a range read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangePage {
    /// Entries in read order
    pub entries: Vec<KeyValue>,
    /// Whether the range may hold more entries past this page
    pub more: bool,
}

// =============================================================================
// Conflict ranges
// =============================================================================

/// Conflict set a manually added range belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictRangeType {
    /// Read conflict: commit fails if another transaction wrote the range
    Read,
    /// Write conflict: other readers of the range fail when this commits
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_constructors() {
        assert_eq!(
            KeySelector::first_greater_or_equal(b"k".to_vec()),
            KeySelector::new(b"k".to_vec(), false, 1)
        );
        assert_eq!(
            KeySelector::first_greater_than(b"k".to_vec()),
            KeySelector::new(b"k".to_vec(), true, 1)
        );
        assert_eq!(
            KeySelector::last_less_than(b"k".to_vec()),
            KeySelector::new(b"k".to_vec(), false, 0)
        );
        assert_eq!(
            KeySelector::last_less_or_equal(b"k".to_vec()),
            KeySelector::new(b"k".to_vec(), true, 0)
        );
    }

    #[test]
    fn test_selector_lower_bound() {
        assert_eq!(
            KeySelector::first_greater_than(b"k".to_vec()).as_lower_bound(),
            Some(b"k\x00".to_vec())
        );
        assert_eq!(
            KeySelector::first_greater_or_equal(b"k".to_vec()).as_lower_bound(),
            Some(b"k".to_vec())
        );
        assert_eq!(KeySelector::last_less_than(b"k".to_vec()).as_lower_bound(), None);
    }

    #[test]
    fn test_streaming_mode_codes() {
        for code in -2..=4 {
            let mode = StreamingMode::from_code(code).unwrap();
            assert_eq!(mode.code(), code);
        }
        assert!(StreamingMode::from_code(5).is_none());
        assert_eq!(StreamingMode::default(), StreamingMode::Iterator);
    }

    #[test]
    fn test_iterator_page_size_grows() {
        let mode = StreamingMode::Iterator;
        assert!(mode.page_size(1) < mode.page_size(2));
        assert_eq!(mode.page_size(50), 10_000);
    }
}
