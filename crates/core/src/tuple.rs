//! Tuple codec
//!
//! Encodes a sequence of [`Element`]s into a self-describing byte string whose
//! unsigned lexicographic order matches the elements' own order.
//!
//! ## Layout
//!
//! | Code | Element | Payload |
//! |------|---------|---------|
//! | 0x00 | null | none (`0x00 0xFF` inside a nested tuple) |
//! | 0x01 | bytes | escaped bytes, `0x00` terminator |
//! | 0x02 | string | escaped UTF-8, `0x00` terminator |
//! | 0x05 | nested tuple | nested elements, `0x00` terminator |
//! | 0x0b | negative integer > 8 bytes | complemented length, complemented magnitude |
//! | 0x0c-0x13 | negative integer 8..1 bytes | complemented magnitude |
//! | 0x14 | zero | none |
//! | 0x15-0x1c | positive integer 1..8 bytes | magnitude |
//! | 0x1d | positive integer > 8 bytes | length, magnitude |
//! | 0x20 | float | 4 bytes, sign-adjusted |
//! | 0x21 | double | 8 bytes, sign-adjusted |
//! | 0x26/0x27 | false/true | none |
//! | 0x30 | uuid | 16 bytes |
//! | 0x33 | versionstamp | 12 bytes |
//!
//! Inside byte and string payloads every `0x00` is escaped as `0x00 0xFF`.
//! Floating point values are stored big-endian with the sign bit flipped for
//! non-negative values and every bit flipped for negative values.

use byteorder::{BigEndian, ByteOrder};
use num_bigint::{BigInt, Sign};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::element::{double_order_bits, float_order_bits, Element, Versionstamp};
use crate::error::TupleError;

const NULL_CODE: u8 = 0x00;
const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const NESTED_CODE: u8 = 0x05;
const NEG_INT_START: u8 = 0x0b;
const INT_ZERO_CODE: u8 = 0x14;
const POS_INT_END: u8 = 0x1d;
const FLOAT_CODE: u8 = 0x20;
const DOUBLE_CODE: u8 = 0x21;
const FALSE_CODE: u8 = 0x26;
const TRUE_CODE: u8 = 0x27;
const UUID_CODE: u8 = 0x30;
const VERSIONSTAMP_CODE: u8 = 0x33;

const ESCAPE: u8 = 0xFF;

/// Largest integer magnitude the length byte can describe.
pub const MAX_INT_BYTES: usize = 255;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, TupleError>;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a tuple.
///
/// # Errors
///
/// Returns [`TupleError::IntegerTooLarge`] for integers wider than
/// [`MAX_INT_BYTES`].
pub fn pack(elements: &[Element]) -> Result<Vec<u8>> {
    pack_with_prefix(&[], elements)
}

/// Encode a tuple after `prefix`.
pub fn pack_with_prefix(prefix: &[u8], elements: &[Element]) -> Result<Vec<u8>> {
    let mut out = prefix.to_vec();
    let mut placeholders = Vec::new();
    for element in elements {
        encode_element(&mut out, element, false, &mut placeholders)?;
    }
    Ok(out)
}

/// Encode a tuple containing exactly one incomplete versionstamp.
///
/// The result is `prefix ++ pack(elements) ++ offset`, where `offset` is the
/// 2-byte little-endian position of the placeholder's transaction version
/// within the result. The store overwrites those 10 bytes at commit.
///
/// # Errors
///
/// - [`TupleError::NoIncompleteVersionstamp`] when no placeholder is present
/// - [`TupleError::MultipleIncompleteVersionstamps`] when more than one is
/// - [`TupleError::VersionstampOffsetOverflow`] when the position exceeds
///   `u16::MAX`
pub fn pack_with_versionstamp(prefix: &[u8], elements: &[Element]) -> Result<Vec<u8>> {
    let mut out = prefix.to_vec();
    let mut placeholders = Vec::new();
    for element in elements {
        encode_element(&mut out, element, false, &mut placeholders)?;
    }

    match placeholders.as_slice() {
        [] => Err(TupleError::NoIncompleteVersionstamp),
        [position] => {
            let offset = u16::try_from(*position)
                .map_err(|_| TupleError::VersionstampOffsetOverflow { offset: *position })?;
            out.extend_from_slice(&offset.to_le_bytes());
            Ok(out)
        }
        many => Err(TupleError::MultipleIncompleteVersionstamps { count: many.len() }),
    }
}

/// Half-open key range covering every tuple that has `elements` as a prefix.
///
/// Returns `(pack ++ 0x00, pack ++ 0xFF)`.
pub fn range(elements: &[Element]) -> Result<(Vec<u8>, Vec<u8>)> {
    let packed = pack(elements)?;
    let mut begin = packed.clone();
    begin.push(0x00);
    let mut end = packed;
    end.push(0xFF);
    Ok((begin, end))
}

/// Compare two encodings; consistent with the order of the decoded tuples.
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn encode_element(
    out: &mut Vec<u8>,
    element: &Element,
    nested: bool,
    placeholders: &mut Vec<usize>,
) -> Result<()> {
    match element {
        Element::Null => {
            out.push(NULL_CODE);
            if nested {
                out.push(ESCAPE);
            }
        }
        Element::Bytes(bytes) => {
            out.push(BYTES_CODE);
            write_escaped(out, bytes);
        }
        Element::String(s) => {
            out.push(STRING_CODE);
            write_escaped(out, s.as_bytes());
        }
        Element::Tuple(items) => {
            out.push(NESTED_CODE);
            for item in items {
                encode_element(out, item, true, placeholders)?;
            }
            out.push(0x00);
        }
        Element::Int(value) => encode_int(out, value)?,
        Element::Float(value) => {
            out.push(FLOAT_CODE);
            let mut buf = [0u8; 4];
            BigEndian::write_u32(&mut buf, float_order_bits(*value));
            out.extend_from_slice(&buf);
        }
        Element::Double(value) => {
            out.push(DOUBLE_CODE);
            let mut buf = [0u8; 8];
            BigEndian::write_u64(&mut buf, double_order_bits(*value));
            out.extend_from_slice(&buf);
        }
        Element::Bool(value) => out.push(if *value { TRUE_CODE } else { FALSE_CODE }),
        Element::Uuid(uuid) => {
            out.push(UUID_CODE);
            out.extend_from_slice(uuid.as_bytes());
        }
        Element::Versionstamp(vs) => {
            out.push(VERSIONSTAMP_CODE);
            if !vs.is_complete() {
                placeholders.push(out.len());
            }
            out.extend_from_slice(vs.as_bytes());
        }
    }
    Ok(())
}

fn write_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(ESCAPE);
        }
    }
    out.push(0x00);
}

fn encode_int(out: &mut Vec<u8>, value: &BigInt) -> Result<()> {
    let (sign, magnitude) = value.to_bytes_be();
    if sign == Sign::NoSign {
        out.push(INT_ZERO_CODE);
        return Ok(());
    }

    let len = magnitude.len();
    if len > MAX_INT_BYTES {
        return Err(TupleError::IntegerTooLarge { bytes: len });
    }

    if sign == Sign::Plus {
        if len <= 8 {
            out.push(INT_ZERO_CODE + len as u8);
        } else {
            out.push(POS_INT_END);
            out.push(len as u8);
        }
        out.extend_from_slice(&magnitude);
    } else {
        // Ones' complement keeps larger magnitudes sorting first.
        if len <= 8 {
            out.push(INT_ZERO_CODE - len as u8);
        } else {
            out.push(NEG_INT_START);
            out.push(!(len as u8));
        }
        out.extend(magnitude.iter().map(|b| !b));
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a tuple.
///
/// # Errors
///
/// Returns an error for truncated input, unknown type codes, or invalid
/// UTF-8 in string elements.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Element>> {
    let mut decoder = Decoder { bytes, pos: 0 };
    let mut elements = Vec::new();
    while decoder.pos < bytes.len() {
        elements.push(decoder.element(false)?);
    }
    Ok(elements)
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self, at: usize) -> Option<u8> {
        self.bytes.get(self.pos + at).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(TupleError::Truncated { offset: self.bytes.len() });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn element(&mut self, nested: bool) -> Result<Element> {
        let offset = self.pos;
        let code = self.take(1)?[0];
        match code {
            NULL_CODE => {
                if nested && self.peek(0) == Some(ESCAPE) {
                    self.pos += 1;
                }
                Ok(Element::Null)
            }
            BYTES_CODE => Ok(Element::Bytes(self.escaped()?)),
            STRING_CODE => {
                let raw = self.escaped()?;
                String::from_utf8(raw)
                    .map(Element::String)
                    .map_err(|_| TupleError::InvalidUtf8 { offset })
            }
            NESTED_CODE => {
                let mut items = Vec::new();
                loop {
                    match (self.peek(0), self.peek(1)) {
                        (None, _) => return Err(TupleError::Truncated { offset: self.pos }),
                        (Some(0x00), Some(ESCAPE)) => {
                            self.pos += 2;
                            items.push(Element::Null);
                        }
                        (Some(0x00), _) => {
                            self.pos += 1;
                            break;
                        }
                        _ => items.push(self.element(true)?),
                    }
                }
                Ok(Element::Tuple(items))
            }
            NEG_INT_START => {
                let len = !self.take(1)?[0] as usize;
                let complemented = self.take(len)?;
                let magnitude: Vec<u8> = complemented.iter().map(|b| !b).collect();
                Ok(Element::Int(BigInt::from_bytes_be(Sign::Minus, &magnitude)))
            }
            0x0c..=0x13 => {
                let len = (INT_ZERO_CODE - code) as usize;
                let magnitude: Vec<u8> = self.take(len)?.iter().map(|b| !b).collect();
                Ok(Element::Int(BigInt::from_bytes_be(Sign::Minus, &magnitude)))
            }
            INT_ZERO_CODE => Ok(Element::Int(BigInt::from(0))),
            0x15..=0x1c => {
                let len = (code - INT_ZERO_CODE) as usize;
                let magnitude = self.take(len)?;
                Ok(Element::Int(BigInt::from_bytes_be(Sign::Plus, magnitude)))
            }
            POS_INT_END => {
                let len = self.take(1)?[0] as usize;
                let magnitude = self.take(len)?;
                Ok(Element::Int(BigInt::from_bytes_be(Sign::Plus, magnitude)))
            }
            FLOAT_CODE => {
                let bits = BigEndian::read_u32(self.take(4)?);
                let bits = if bits & 0x8000_0000 != 0 { bits ^ 0x8000_0000 } else { !bits };
                Ok(Element::Float(f32::from_bits(bits)))
            }
            DOUBLE_CODE => {
                let bits = BigEndian::read_u64(self.take(8)?);
                let bits = if bits & 0x8000_0000_0000_0000 != 0 {
                    bits ^ 0x8000_0000_0000_0000
                } else {
                    !bits
                };
                Ok(Element::Double(f64::from_bits(bits)))
            }
            FALSE_CODE => Ok(Element::Bool(false)),
            TRUE_CODE => Ok(Element::Bool(true)),
            UUID_CODE => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(self.take(16)?);
                Ok(Element::Uuid(Uuid::from_bytes(raw)))
            }
            VERSIONSTAMP_CODE => {
                let mut raw = [0u8; Versionstamp::LENGTH];
                raw.copy_from_slice(self.take(Versionstamp::LENGTH)?);
                Ok(Element::Versionstamp(Versionstamp::from_bytes(raw)))
            }
            other => Err(TupleError::UnknownTypeCode { code: other, offset }),
        }
    }

    /// Read an escaped payload up to its unescaped `0x00` terminator.
    fn escaped(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.peek(0) {
                None => return Err(TupleError::Truncated { offset: self.pos }),
                Some(0x00) => {
                    if self.peek(1) == Some(ESCAPE) {
                        out.push(0x00);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(out);
                    }
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }
}
