//! Range-based conflict detection
//!
//! A transaction records the key ranges it read and wrote. At commit its read
//! ranges are checked against the write ranges of every transaction that
//! committed after its read version; any intersection aborts it with
//! `NOT_COMMITTED`.
//!
//! Key rules:
//! - First committer wins, judged on read ranges, not write ranges
//! - Blind writes (writes without reads) never conflict
//! - Snapshot reads record no read range and so never conflict
//! - Write skew is allowed

use std::collections::VecDeque;

use stacktester_core::{code, key_after, StoreError, StoreResult};

/// Half-open key range `[begin, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRange {
    /// Inclusive start
    pub begin: Vec<u8>,
    /// Exclusive end
    pub end: Vec<u8>,
}

impl ConflictRange {
    /// Range `[begin, end)`
    pub fn new(begin: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Range holding exactly `key`
    pub fn single_key(key: &[u8]) -> Self {
        Self::new(key.to_vec(), key_after(key))
    }

    /// Whether the range holds no key
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// Whether the two ranges share at least one key
    pub fn intersects(&self, other: &ConflictRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.begin < other.end && other.begin < self.end
    }
}

/// Write ranges of recently committed transactions
///
/// Entries older than the retained window are pruned; a transaction whose
/// read version falls before the window can no longer be validated and is
/// rejected with `TRANSACTION_TOO_OLD`.
#[derive(Debug, Default)]
pub struct ConflictHistory {
    /// (commit version, write ranges), oldest first
    commits: VecDeque<(u64, Vec<ConflictRange>)>,
    /// Oldest read version that can still be validated
    oldest: u64,
}

impl ConflictHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest read version that can still be validated
    pub fn oldest_version(&self) -> u64 {
        self.oldest
    }

    /// Number of commits retained
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether no commit is retained
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Check `reads` made at `read_version` against later commits.
    ///
    /// # Errors
    ///
    /// - `TRANSACTION_TOO_OLD` if `read_version` precedes the window
    /// - `NOT_COMMITTED` if a later commit wrote a range that was read
    pub fn validate(&self, read_version: u64, reads: &[ConflictRange]) -> StoreResult<()> {
        if reads.is_empty() {
            return Ok(());
        }
        if read_version < self.oldest {
            return Err(StoreError::new(code::TRANSACTION_TOO_OLD));
        }
        let conflicted = self
            .commits
            .iter()
            .filter(|(version, _)| *version > read_version)
            .any(|(_, writes)| {
                writes
                    .iter()
                    .any(|w| reads.iter().any(|r| r.intersects(w)))
            });
        if conflicted {
            return Err(StoreError::new(code::NOT_COMMITTED));
        }
        Ok(())
    }

    /// Record the write ranges of a commit at `version`
    pub fn record(&mut self, version: u64, writes: Vec<ConflictRange>) {
        self.commits.push_back((version, writes));
    }

    /// Forget commits at or below `min_version`
    pub fn prune(&mut self, min_version: u64) {
        while let Some((version, _)) = self.commits.front() {
            if *version <= min_version {
                self.commits.pop_front();
            } else {
                break;
            }
        }
        self.oldest = self.oldest.max(min_version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects() {
        let a = ConflictRange::new(b"a".to_vec(), b"c".to_vec());
        let b = ConflictRange::new(b"b".to_vec(), b"d".to_vec());
        let c = ConflictRange::new(b"c".to_vec(), b"d".to_vec());
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&ConflictRange::new(b"z".to_vec(), b"a".to_vec())));
    }

    #[test]
    fn test_single_key_range() {
        let k = ConflictRange::single_key(b"k");
        assert!(k.intersects(&ConflictRange::single_key(b"k")));
        assert!(!k.intersects(&ConflictRange::single_key(b"k\x00")));
    }

    #[test]
    fn test_validate_detects_later_write() {
        let mut history = ConflictHistory::new();
        history.record(5, vec![ConflictRange::single_key(b"k")]);

        let reads = vec![ConflictRange::single_key(b"k")];
        assert!(history.validate(5, &reads).is_ok());
        let err = history.validate(4, &reads).unwrap_err();
        assert_eq!(err.code(), code::NOT_COMMITTED);
    }

    #[test]
    fn test_blind_writes_never_conflict() {
        let mut history = ConflictHistory::new();
        history.record(5, vec![ConflictRange::single_key(b"k")]);
        assert!(history.validate(0, &[]).is_ok());
    }

    #[test]
    fn test_prune_makes_old_reads_too_old() {
        let mut history = ConflictHistory::new();
        history.record(1, vec![]);
        history.record(2, vec![]);
        history.prune(1);

        assert_eq!(history.len(), 1);
        let reads = vec![ConflictRange::single_key(b"k")];
        assert_eq!(
            history.validate(0, &reads).unwrap_err().code(),
            code::TRANSACTION_TOO_OLD
        );
        assert!(history.validate(1, &reads).is_ok());
    }
}
