//! Typed tuple elements
//!
//! This module defines:
//! - Element: the tagged union of every value the tuple codec can carry
//! - Versionstamp: a 12-byte monotonic identifier, complete or incomplete
//!
//! ## Ordering
//!
//! `Element` implements a total order that matches the unsigned byte order of
//! the packed encoding. Types are ranked by their type code:
//!
//! ```text
//! null < bytes < string < nested tuple < integer < float < double
//!      < bool < uuid < versionstamp
//! ```
//!
//! Within a type, integers compare numerically, byte strings and strings
//! compare bytewise (UTF-8 for strings), and floating point values compare by
//! their order-preserving bit pattern, so `-0.0 < 0.0` and every NaN has a
//! fixed position. Equality follows the same order: two NaNs with the same bit
//! pattern are equal, which keeps the round-trip law exact.

use num_bigint::BigInt;
use std::cmp::Ordering;
use uuid::Uuid;

/// Transaction-version bytes of an incomplete versionstamp.
const INCOMPLETE_TR_VERSION: [u8; 10] = [0xFF; 10];

/// A 12-byte versionstamp: 10 bytes of commit version assigned by the store
/// followed by a 2-byte big-endian user version.
///
/// A versionstamp whose 10-byte transaction version is all `0xFF` is
/// *incomplete*: a placeholder the store replaces at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Versionstamp {
    bytes: [u8; Versionstamp::LENGTH],
}

impl Versionstamp {
    /// Encoded length in bytes.
    pub const LENGTH: usize = 12;

    /// Length of the store-assigned transaction version.
    pub const TR_VERSION_LENGTH: usize = 10;

    /// Build a complete versionstamp from a store-assigned transaction version.
    pub fn complete(tr_version: [u8; 10], user_version: u16) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[..Self::TR_VERSION_LENGTH].copy_from_slice(&tr_version);
        bytes[Self::TR_VERSION_LENGTH..].copy_from_slice(&user_version.to_be_bytes());
        Versionstamp { bytes }
    }

    /// Build an incomplete placeholder carrying only a user version.
    pub fn incomplete(user_version: u16) -> Self {
        Self::complete(INCOMPLETE_TR_VERSION, user_version)
    }

    /// Rebuild from the 12 encoded bytes.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Versionstamp { bytes }
    }

    /// Whether the transaction version has been filled in.
    pub fn is_complete(&self) -> bool {
        self.bytes[..Self::TR_VERSION_LENGTH] != INCOMPLETE_TR_VERSION
    }

    /// The 10-byte transaction version.
    pub fn transaction_version(&self) -> &[u8] {
        &self.bytes[..Self::TR_VERSION_LENGTH]
    }

    /// The 2-byte user version.
    pub fn user_version(&self) -> u16 {
        u16::from_be_bytes([self.bytes[10], self.bytes[11]])
    }

    /// All 12 bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.bytes
    }
}

/// A single tuple element.
///
/// Every element has a fixed or length-delimited binary layout in the tuple
/// codec (see [`crate::tuple`]). Integers are arbitrary precision; the codec
/// accepts magnitudes of up to 255 bytes.
#[derive(Debug, Clone)]
pub enum Element {
    /// Null
    Null,
    /// Raw byte string
    Bytes(Vec<u8>),
    /// Unicode string
    String(String),
    /// Nested tuple
    Tuple(Vec<Element>),
    /// Signed integer
    Int(BigInt),
    /// IEEE-754 single precision
    Float(f32),
    /// IEEE-754 double precision
    Double(f64),
    /// Boolean
    Bool(bool),
    /// RFC 4122 UUID
    Uuid(Uuid),
    /// Complete or incomplete versionstamp
    Versionstamp(Versionstamp),
}

impl Element {
    /// Type code that ranks this element in the cross-type order.
    ///
    /// All integers share the zero-integer code and both booleans share the
    /// `false` code; their values order them within the rank.
    pub fn type_rank(&self) -> u8 {
        match self {
            Element::Null => 0x00,
            Element::Bytes(_) => 0x01,
            Element::String(_) => 0x02,
            Element::Tuple(_) => 0x05,
            Element::Int(_) => 0x14,
            Element::Float(_) => 0x20,
            Element::Double(_) => 0x21,
            Element::Bool(_) => 0x26,
            Element::Uuid(_) => 0x30,
            Element::Versionstamp(_) => 0x33,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Null => "Null",
            Element::Bytes(_) => "Bytes",
            Element::String(_) => "String",
            Element::Tuple(_) => "Tuple",
            Element::Int(_) => "Int",
            Element::Float(_) => "Float",
            Element::Double(_) => "Double",
            Element::Bool(_) => "Bool",
            Element::Uuid(_) => "Uuid",
            Element::Versionstamp(_) => "Versionstamp",
        }
    }

    /// Build a byte-string element.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Element::Bytes(value.into())
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Element::Null)
    }

    /// Borrow the payload of a byte-string element.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Element::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow the payload of a string element.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the payload of an integer element.
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Element::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Number of incomplete versionstamps in this element, nested tuples
    /// included.
    pub fn incomplete_versionstamps(&self) -> usize {
        match self {
            Element::Versionstamp(vs) if !vs.is_complete() => 1,
            Element::Tuple(items) => items.iter().map(Element::incomplete_versionstamps).sum(),
            _ => 0,
        }
    }
}

/// Order-preserving key for a single-precision float.
pub(crate) fn float_order_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000
    }
}

/// Order-preserving key for a double-precision float.
pub(crate) fn double_order_bits(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Element::Null, Element::Null) => Ordering::Equal,
            (Element::Bytes(a), Element::Bytes(b)) => a.cmp(b),
            (Element::String(a), Element::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::Tuple(a), Element::Tuple(b)) => a.cmp(b),
            (Element::Int(a), Element::Int(b)) => a.cmp(b),
            (Element::Float(a), Element::Float(b)) => {
                float_order_bits(*a).cmp(&float_order_bits(*b))
            }
            (Element::Double(a), Element::Double(b)) => {
                double_order_bits(*a).cmp(&double_order_bits(*b))
            }
            (Element::Bool(a), Element::Bool(b)) => a.cmp(b),
            (Element::Uuid(a), Element::Uuid(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::Versionstamp(a), Element::Versionstamp(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Element {}

impl From<Vec<u8>> for Element {
    fn from(value: Vec<u8>) -> Self {
        Element::Bytes(value)
    }
}

impl From<&[u8]> for Element {
    fn from(value: &[u8]) -> Self {
        Element::Bytes(value.to_vec())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::String(value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::String(value.to_string())
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::Int(BigInt::from(value))
    }
}

impl From<BigInt> for Element {
    fn from(value: BigInt) -> Self {
        Element::Int(value)
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Self {
        Element::Bool(value)
    }
}

impl From<f32> for Element {
    fn from(value: f32) -> Self {
        Element::Float(value)
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::Double(value)
    }
}

impl From<Uuid> for Element {
    fn from(value: Uuid) -> Self {
        Element::Uuid(value)
    }
}

impl From<Versionstamp> for Element {
    fn from(value: Versionstamp) -> Self {
        Element::Versionstamp(value)
    }
}

impl From<Vec<Element>> for Element {
    fn from(value: Vec<Element>) -> Self {
        Element::Tuple(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_type_order_follows_type_codes() {
        let ordered = vec![
            Element::Null,
            Element::bytes(b"zzz".to_vec()),
            Element::from("a"),
            Element::Tuple(vec![]),
            Element::from(-5i64),
            Element::from(1.0f32),
            Element::from(-1.0f64),
            Element::from(false),
            Element::from(true),
            Element::Uuid(Uuid::nil()),
            Element::Versionstamp(Versionstamp::incomplete(0)),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should sort before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_integers_compare_numerically() {
        assert!(Element::from(-300i64) < Element::from(-2i64));
        assert!(Element::from(-1i64) < Element::from(0i64));
        assert!(Element::from(255i64) < Element::from(256i64));
    }

    #[test]
    fn test_float_order_is_total() {
        assert!(Element::from(-0.0f64) < Element::from(0.0f64));
        assert!(Element::from(f64::NEG_INFINITY) < Element::from(-1e300f64));
        assert!(Element::from(f64::INFINITY) < Element::from(f64::NAN));
        assert_eq!(Element::from(f32::NAN), Element::from(f32::NAN));
    }

    #[test]
    fn test_shorter_tuple_sorts_first() {
        let short = Element::Tuple(vec![Element::from(1i64)]);
        let long = Element::Tuple(vec![Element::from(1i64), Element::Null]);
        assert!(short < long);
    }

    #[test]
    fn test_payload_accessors_match_variant() {
        assert_eq!(Element::from("a").as_str(), Some("a"));
        assert_eq!(Element::bytes(b"a".to_vec()).as_str(), None);
        assert_eq!(Element::from(5i64).as_int(), Some(&BigInt::from(5)));
        assert_eq!(Element::from("5").as_int(), None);
    }

    #[test]
    fn test_versionstamp_accessors() {
        let vs = Versionstamp::complete([1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 0x0102);
        assert!(vs.is_complete());
        assert_eq!(vs.transaction_version(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(vs.user_version(), 0x0102);

        let placeholder = Versionstamp::incomplete(7);
        assert!(!placeholder.is_complete());
        assert_eq!(placeholder.user_version(), 7);
    }

    #[test]
    fn test_incomplete_versionstamps_counts_nested() {
        let tuple = Element::Tuple(vec![
            Element::Versionstamp(Versionstamp::incomplete(0)),
            Element::Tuple(vec![Element::Versionstamp(Versionstamp::incomplete(1))]),
            Element::Versionstamp(Versionstamp::complete([0; 10], 0)),
        ]);
        assert_eq!(tuple.incomplete_versionstamps(), 2);
    }
}
