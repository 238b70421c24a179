//! Multi-version ordered key/value map
//!
//! `VersionedStore` keeps every key's recent history in a `VersionChain` so
//! readers can observe the keyspace as of any retained commit version.
//!
//! # Design
//!
//! - `BTreeMap` ordered by key bytes, for range scans in either direction
//! - `parking_lot::RwLock` around the map: reads share, commits exclude
//! - `AtomicU64` holding the latest committed version
//! - Version chains keep tombstones so a clear is itself a version
//!
//! Commits are applied whole under the write lock, so a reader never sees a
//! partially applied batch.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use stacktester_core::KeyValue;
use tracing::debug;

use crate::stored_value::StoredValue;

// ============================================================================
// Version chain
// ============================================================================

/// Versions of one key, newest first
///
/// Uses VecDeque for O(1) push_front, since the newest version is both the
/// common read target and the only insertion point.
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<StoredValue>,
}

impl VersionChain {
    /// Create a chain with a single version
    pub fn new(value: StoredValue) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(value);
        Self { versions }
    }

    /// Add a version newer than every existing one
    #[inline]
    pub fn push(&mut self, value: StoredValue) {
        debug_assert!(
            self.latest().map_or(true, |v| v.version() <= value.version()),
            "version chain must grow newest-first"
        );
        self.versions.push_front(value);
    }

    /// The entry visible at `max_version`
    pub fn get_at_version(&self, max_version: u64) -> Option<&StoredValue> {
        self.versions.iter().find(|sv| sv.version() <= max_version)
    }

    /// The newest entry
    #[inline]
    pub fn latest(&self) -> Option<&StoredValue> {
        self.versions.front()
    }

    /// Drop versions no reader at or above `min_version` can observe.
    ///
    /// The newest version at or below `min_version` is kept, since it is what
    /// a read at `min_version` sees.
    pub fn gc(&mut self, min_version: u64) {
        while self.versions.len() > 1 {
            let second_oldest = self.versions.len() - 2;
            if self.versions[second_oldest].version() <= min_version {
                self.versions.pop_back();
            } else {
                break;
            }
        }
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Whether the chain holds only a tombstone old enough to forget
    fn is_dead_before(&self, min_version: u64) -> bool {
        self.versions.len() == 1
            && self
                .latest()
                .map_or(true, |v| v.is_tombstone() && v.version() <= min_version)
    }
}

// ============================================================================
// Write operations
// ============================================================================

/// One mutation in a committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Write `value` to `key`
    Set {
        /// Target key
        key: Vec<u8>,
        /// New value
        value: Vec<u8>,
    },
    /// Remove `key`
    Clear {
        /// Target key
        key: Vec<u8>,
    },
    /// Remove every key in `[begin, end)`
    ClearRange {
        /// Inclusive start
        begin: Vec<u8>,
        /// Exclusive end
        end: Vec<u8>,
    },
}

// ============================================================================
// Store
// ============================================================================

/// Ordered multi-version key/value map
#[derive(Debug, Default)]
pub struct VersionedStore {
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
    version: AtomicU64,
    oldest: AtomicU64,
}

impl VersionedStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Oldest version still readable
    #[inline]
    pub fn oldest_version(&self) -> u64 {
        self.oldest.load(Ordering::Acquire)
    }

    /// Number of keys with a live value at the latest version
    pub fn len(&self) -> usize {
        self.data
            .read()
            .values()
            .filter(|chain| chain.latest().map_or(false, |v| !v.is_tombstone()))
            .count()
    }

    /// Whether no key has a live value at the latest version
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of `key` as of `version`
    pub fn get(&self, key: &[u8], version: u64) -> Option<Vec<u8>> {
        self.data
            .read()
            .get(key)
            .and_then(|chain| chain.get_at_version(version))
            .and_then(|sv| sv.value().map(<[u8]>::to_vec))
    }

    /// Live entries in `[begin, end)` as of `version`.
    ///
    /// # Arguments
    /// * `begin` - Inclusive start key
    /// * `end` - Exclusive end key
    /// * `version` - Read version
    /// * `reverse` - Scan from the end of the range
    /// * `limit` - Maximum entries, 0 for unlimited
    pub fn scan(
        &self,
        begin: &[u8],
        end: &[u8],
        version: u64,
        reverse: bool,
        limit: usize,
    ) -> Vec<KeyValue> {
        if begin >= end {
            return Vec::new();
        }
        let data = self.data.read();
        let range = data.range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)));
        let visible = |(key, chain): (&Vec<u8>, &VersionChain)| {
            chain
                .get_at_version(version)
                .and_then(|sv| sv.value())
                .map(|value| KeyValue::new(key.clone(), value.to_vec()))
        };
        let take = if limit == 0 { usize::MAX } else { limit };
        if reverse {
            range.rev().filter_map(visible).take(take).collect()
        } else {
            range.filter_map(visible).take(take).collect()
        }
    }

    /// Apply a batch atomically and return its commit version.
    pub fn apply(&self, ops: &[WriteOp]) -> u64 {
        let mut data = self.data.write();
        let version = self.version() + 1;

        for op in ops {
            match op {
                WriteOp::Set { key, value } => {
                    Self::push(&mut data, key.clone(), StoredValue::live(value.clone(), version));
                }
                WriteOp::Clear { key } => {
                    if data.contains_key(key) {
                        Self::push(&mut data, key.clone(), StoredValue::tombstone(version));
                    }
                }
                WriteOp::ClearRange { begin, end } => {
                    if begin >= end {
                        continue;
                    }
                    let keys: Vec<Vec<u8>> = data
                        .range::<[u8], _>((Bound::Included(&begin[..]), Bound::Excluded(&end[..])))
                        .filter(|(_, chain)| chain.latest().map_or(false, |v| !v.is_tombstone()))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in keys {
                        Self::push(&mut data, key, StoredValue::tombstone(version));
                    }
                }
            }
        }

        self.version.store(version, Ordering::Release);
        version
    }

    fn push(data: &mut BTreeMap<Vec<u8>, VersionChain>, key: Vec<u8>, value: StoredValue) {
        match data.get_mut(&key) {
            Some(chain) => chain.push(value),
            None => {
                data.insert(key, VersionChain::new(value));
            }
        }
    }

    /// Forget history that no read at or above `min_version` can observe.
    ///
    /// Reads below `min_version` are no longer served after this call.
    pub fn gc(&self, min_version: u64) {
        let min_version = min_version.min(self.version());
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, chain| {
            chain.gc(min_version);
            !chain.is_dead_before(min_version)
        });
        self.oldest.fetch_max(min_version, Ordering::AcqRel);
        debug!(
            min_version,
            removed = before - data.len(),
            "Pruned version history"
        );
    }

    /// Every live entry at the latest version, in key order
    pub fn latest_entries(&self) -> Vec<KeyValue> {
        let data = self.data.read();
        data.iter()
            .filter_map(|(key, chain)| {
                chain
                    .latest()
                    .and_then(|sv| sv.value())
                    .map(|value| KeyValue::new(key.clone(), value.to_vec()))
            })
            .collect()
    }

    /// Replace the contents with `entries` written at `version`.
    ///
    /// History is discarded; `version` becomes both the latest and the
    /// oldest readable version.
    pub fn load(&self, entries: Vec<KeyValue>, version: u64) {
        let mut data = self.data.write();
        data.clear();
        for kv in entries {
            data.insert(kv.key, VersionChain::new(StoredValue::live(kv.value, version)));
        }
        self.version.store(version, Ordering::Release);
        self.oldest.store(version, Ordering::Release);
    }
}
