//! One version of a key
//!
//! A stored value is either live bytes or a tombstone left by a clear. Keeping
//! tombstones in the version chain lets reads at an older version still see
//! the value that was cleared later.

/// A value written at a commit version, or a tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    version: u64,
    value: Option<Vec<u8>>,
}

impl StoredValue {
    /// Live value written at `version`
    pub fn live(value: Vec<u8>, version: u64) -> Self {
        StoredValue {
            version,
            value: Some(value),
        }
    }

    /// Tombstone written at `version`
    pub fn tombstone(version: u64) -> Self {
        StoredValue {
            version,
            value: None,
        }
    }

    /// Commit version of this entry
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Value bytes, `None` for a tombstone
    #[inline]
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Whether this entry is a tombstone
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_and_tombstone() {
        let live = StoredValue::live(b"v".to_vec(), 3);
        assert_eq!(live.version(), 3);
        assert_eq!(live.value(), Some(&b"v"[..]));
        assert!(!live.is_tombstone());

        let dead = StoredValue::tombstone(4);
        assert!(dead.is_tombstone());
        assert_eq!(dead.value(), None);
    }
}
