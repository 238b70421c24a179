//! Buffered writes with read-your-writes
//!
//! Mutations are buffered per key until commit. Reads consult the buffer
//! first, so a transaction observes its own sets, clears, range clears and
//! atomic operations layered over the store's snapshot.
//!
//! Atomic operations on keys the transaction has not written keep the store
//! as their base. They are evaluated against the snapshot for reads and
//! against the latest committed value at commit, without adding a read
//! conflict.

use std::collections::BTreeMap;
use std::ops::Bound;

use stacktester_core::{code, KeyValue, MutationType, StoreError, StoreResult};
use stacktester_storage::WriteOp;

use crate::atomic;

/// Trailing offset bytes on a versionstamped key or value
const OFFSET_BYTES: usize = 2;
/// Length of the store-assigned part of a versionstamp
const STAMP_BYTES: usize = 10;

#[derive(Debug, Clone)]
enum Base {
    /// The transaction knows the value (`None` once cleared)
    Known(Option<Vec<u8>>),
    /// The value comes from the store
    Store,
}

#[derive(Debug, Clone)]
enum Entry {
    Readable {
        base: Base,
        atomics: Vec<(MutationType, Vec<u8>)>,
    },
    /// Value embeds the commit versionstamp and cannot be read back
    Unreadable { value: Vec<u8> },
}

#[derive(Debug, Clone)]
struct VersionstampedKey {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Range clears issued before this write
    clears_before: usize,
}

/// Per-transaction write buffer
#[derive(Debug, Default, Clone)]
pub struct WriteBuffer {
    entries: BTreeMap<Vec<u8>, Entry>,
    cleared: Vec<(Vec<u8>, Vec<u8>)>,
    versionstamped_keys: Vec<VersionstampedKey>,
    size: usize,
}

impl WriteBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.cleared.is_empty() && self.versionstamped_keys.is_empty()
    }

    /// Approximate bytes buffered
    pub fn size(&self) -> usize {
        self.size
    }

    /// Buffer a set
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.size += key.len() + value.len();
        self.entries.insert(
            key.to_vec(),
            Entry::Readable {
                base: Base::Known(Some(value.to_vec())),
                atomics: Vec::new(),
            },
        );
    }

    /// Buffer a clear of one key
    pub fn clear(&mut self, key: &[u8]) {
        self.size += key.len();
        self.entries.insert(
            key.to_vec(),
            Entry::Readable {
                base: Base::Known(None),
                atomics: Vec::new(),
            },
        );
    }

    /// Buffer a clear of `[begin, end)`
    pub fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        self.size += begin.len() + end.len();
        let doomed: Vec<Vec<u8>> = self
            .entries
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.entries.remove(&key);
        }
        self.cleared.push((begin.to_vec(), end.to_vec()));
    }

    /// Buffer an atomic mutation.
    ///
    /// # Errors
    ///
    /// - `CLIENT_INVALID_OPERATION` for a versionstamped operand whose
    ///   offset does not leave room for the stamp
    /// - `ACCESSED_UNREADABLE` when modifying a key holding a versionstamped value
    pub fn atomic_op(&mut self, op: MutationType, key: &[u8], param: &[u8]) -> StoreResult<()> {
        self.size += key.len() + param.len();
        match op {
            MutationType::SetVersionstampedKey => {
                check_versionstamp_offset(key)?;
                self.versionstamped_keys.push(VersionstampedKey {
                    key: key.to_vec(),
                    value: param.to_vec(),
                    clears_before: self.cleared.len(),
                });
                Ok(())
            }
            MutationType::SetVersionstampedValue => {
                check_versionstamp_offset(param)?;
                self.entries.insert(
                    key.to_vec(),
                    Entry::Unreadable {
                        value: param.to_vec(),
                    },
                );
                Ok(())
            }
            _ => {
                let in_cleared = self.is_cleared(key);
                let entry = self
                    .entries
                    .entry(key.to_vec())
                    .or_insert_with(|| Entry::Readable {
                        base: if in_cleared {
                            Base::Known(None)
                        } else {
                            Base::Store
                        },
                        atomics: Vec::new(),
                    });
                match entry {
                    Entry::Readable { atomics, .. } => {
                        atomics.push((op, param.to_vec()));
                        Ok(())
                    }
                    Entry::Unreadable { .. } => Err(StoreError::new(code::ACCESSED_UNREADABLE)),
                }
            }
        }
    }

    fn is_cleared(&self, key: &[u8]) -> bool {
        self.cleared
            .iter()
            .any(|(b, e)| b.as_slice() <= key && key < e.as_slice())
    }

    fn cleared_since(&self, key: &[u8], since: usize) -> bool {
        self.cleared[since..]
            .iter()
            .any(|(b, e)| b.as_slice() <= key && key < e.as_slice())
    }

    fn resolve(
        entry: &Entry,
        store_value: impl FnOnce() -> Option<Vec<u8>>,
        max_value_bytes: usize,
    ) -> StoreResult<Option<Vec<u8>>> {
        match entry {
            Entry::Unreadable { .. } => Err(StoreError::new(code::ACCESSED_UNREADABLE)),
            Entry::Readable { base, atomics } => {
                let mut value = match base {
                    Base::Known(v) => v.clone(),
                    Base::Store => store_value(),
                };
                for (op, param) in atomics {
                    value = Some(atomic::apply(*op, value.as_deref(), param, max_value_bytes));
                }
                Ok(value)
            }
        }
    }

    /// Value of `key` as this transaction sees it.
    ///
    /// `store_value` is consulted only when the buffer does not determine the
    /// value on its own.
    pub fn read(
        &self,
        key: &[u8],
        store_value: impl FnOnce() -> Option<Vec<u8>>,
        max_value_bytes: usize,
    ) -> StoreResult<Option<Vec<u8>>> {
        match self.entries.get(key) {
            Some(entry) => Self::resolve(entry, store_value, max_value_bytes),
            None if self.is_cleared(key) => Ok(None),
            None => Ok(store_value()),
        }
    }

    /// Layer the buffer over store entries read from `[begin, end)`.
    ///
    /// Returns the merged live entries in ascending key order.
    pub fn merge(
        &self,
        store_entries: Vec<KeyValue>,
        begin: &[u8],
        end: &[u8],
        max_value_bytes: usize,
    ) -> StoreResult<Vec<KeyValue>> {
        let store: BTreeMap<Vec<u8>, Vec<u8>> = store_entries
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .collect();

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = store
            .iter()
            .filter(|(k, _)| !self.entries.contains_key(*k) && !self.is_cleared(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if begin < end {
            for (key, entry) in self
                .entries
                .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            {
                if let Some(value) = Self::resolve(entry, || store.get(key).cloned(), max_value_bytes)? {
                    merged.insert(key.clone(), value);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect())
    }

    /// Turn the buffer into the batch applied at commit.
    ///
    /// # Arguments
    /// * `latest` - Latest committed value of a key, the base for atomic ops
    /// * `stamp` - The 10-byte versionstamp of this commit
    /// * `max_value_bytes` - Bound for `APPEND_IF_FITS`
    pub fn into_write_ops(
        self,
        latest: impl Fn(&[u8]) -> Option<Vec<u8>>,
        stamp: &[u8; STAMP_BYTES],
        max_value_bytes: usize,
    ) -> StoreResult<Vec<WriteOp>> {
        let mut ops: Vec<WriteOp> = self
            .cleared
            .iter()
            .map(|(begin, end)| WriteOp::ClearRange {
                begin: begin.clone(),
                end: end.clone(),
            })
            .collect();

        for (key, entry) in &self.entries {
            let value = match entry {
                Entry::Unreadable { value } => Some(substitute_versionstamp(value, stamp)),
                Entry::Readable { .. } => Self::resolve(entry, || latest(key), max_value_bytes)?,
            };
            ops.push(match value {
                Some(value) => WriteOp::Set {
                    key: key.clone(),
                    value,
                },
                None => WriteOp::Clear { key: key.clone() },
            });
        }

        for vk in &self.versionstamped_keys {
            let key = substitute_versionstamp(&vk.key, stamp);
            if self.cleared_since(&key, vk.clears_before) {
                continue;
            }
            ops.push(WriteOp::Set {
                key,
                value: vk.value.clone(),
            });
        }

        Ok(ops)
    }
}

fn versionstamp_offset(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < OFFSET_BYTES {
        return None;
    }
    let body = bytes.len() - OFFSET_BYTES;
    let offset = u16::from_le_bytes([bytes[body], bytes[body + 1]]) as usize;
    (offset + STAMP_BYTES <= body).then_some(offset)
}

/// Validate the trailing offset of a versionstamped operand.
pub fn check_versionstamp_offset(bytes: &[u8]) -> StoreResult<()> {
    versionstamp_offset(bytes)
        .map(|_| ())
        .ok_or_else(|| StoreError::new(code::CLIENT_INVALID_OPERATION))
}

/// Strip the trailing offset and write `stamp` at the position it names.
fn substitute_versionstamp(bytes: &[u8], stamp: &[u8; STAMP_BYTES]) -> Vec<u8> {
    let body = bytes.len().saturating_sub(OFFSET_BYTES);
    let mut out = bytes[..body].to_vec();
    if let Some(offset) = versionstamp_offset(bytes) {
        out[offset..offset + STAMP_BYTES].copy_from_slice(stamp);
    }
    out
}
