//! Key helpers
//!
//! Byte-string utilities shared by the store contract and the interpreter:
//! - `strinc`: exclusive upper bound of all keys sharing a prefix
//! - `prefix_range`: the half-open range `[prefix, strinc(prefix))`
//! - `key_after`: the smallest key strictly greater than a key
//! - `printable`: an escaped rendering used for binding names and logs

use thiserror::Error;

/// Key helper errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The prefix is empty or made only of `0xFF` bytes, so no key bounds it
    #[error("Key must contain at least one byte not equal to 0xFF")]
    NoUpperBound,
}

/// Smallest key strictly greater than every key that starts with `prefix`.
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte is
/// incremented.
///
/// # Examples
///
/// ```
/// use stacktester_core::key::strinc;
///
/// assert_eq!(strinc(b"ab").unwrap(), b"ac".to_vec());
/// assert_eq!(strinc(b"a\xff\xff").unwrap(), b"b".to_vec());
/// assert!(strinc(b"\xff").is_err());
/// ```
pub fn strinc(prefix: &[u8]) -> Result<Vec<u8>, KeyError> {
    let keep = prefix
        .iter()
        .rposition(|&b| b != 0xFF)
        .ok_or(KeyError::NoUpperBound)?;
    let mut out = prefix[..=keep].to_vec();
    out[keep] += 1;
    Ok(out)
}

/// Range `[prefix, strinc(prefix))` covering every key with the prefix.
pub fn prefix_range(prefix: &[u8]) -> Result<(Vec<u8>, Vec<u8>), KeyError> {
    Ok((prefix.to_vec(), strinc(prefix)?))
}

/// Smallest key strictly greater than `key`.
pub fn key_after(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.extend_from_slice(key);
    out.push(0x00);
    out
}

/// Render bytes with printable ASCII kept and everything else as `\xNN`.
pub fn printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (32..127).contains(&b) && b != b'\\' {
            out.push(b as char);
        } else if b == b'\\' {
            out.push_str("\\\\");
        } else {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strinc_simple() {
        assert_eq!(strinc(b"a").unwrap(), b"b".to_vec());
        assert_eq!(strinc(b"\x00").unwrap(), b"\x01".to_vec());
    }

    #[test]
    fn test_strinc_drops_trailing_ff() {
        assert_eq!(strinc(b"x\xfe\xff").unwrap(), b"x\xff".to_vec());
    }

    #[test]
    fn test_strinc_rejects_unbounded() {
        assert_eq!(strinc(b""), Err(KeyError::NoUpperBound));
        assert_eq!(strinc(b"\xff\xff"), Err(KeyError::NoUpperBound));
    }

    #[test]
    fn test_prefix_range_contains_extensions() {
        let (begin, end) = prefix_range(b"app").unwrap();
        assert!(begin.as_slice() <= &b"app"[..]);
        assert!(&b"apple"[..] < end.as_slice());
        assert!(&b"aq"[..] >= end.as_slice());
    }

    #[test]
    fn test_key_after() {
        assert_eq!(key_after(b"k"), b"k\x00".to_vec());
        assert!(key_after(b"k").as_slice() > &b"k"[..]);
    }

    #[test]
    fn test_printable() {
        assert_eq!(printable(b"abc"), "abc");
        assert_eq!(printable(b"a\x00\xff"), "a\\x00\\xff");
        assert_eq!(printable(b"a\\b"), "a\\\\b");
    }
}
