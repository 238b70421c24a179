//! Atomic mutation arithmetic
//!
//! Integers are little-endian and unsigned; the operand's length sets the
//! result's length, with the existing value zero-extended or truncated to
//! match. An absent existing value yields the operand unchanged, except for
//! `APPEND_IF_FITS`, which treats it as empty.

use std::cmp::Ordering;

use stacktester_core::MutationType;

/// Apply `op` with operand `param` to the current value of a key.
///
/// `max_value_bytes` bounds `APPEND_IF_FITS`. Versionstamped mutations are
/// not read-modify-write operations and return the operand.
pub fn apply(
    op: MutationType,
    existing: Option<&[u8]>,
    param: &[u8],
    max_value_bytes: usize,
) -> Vec<u8> {
    if op == MutationType::AppendIfFits {
        let existing = existing.unwrap_or(&[]);
        if existing.len() + param.len() > max_value_bytes {
            return existing.to_vec();
        }
        let mut out = existing.to_vec();
        out.extend_from_slice(param);
        return out;
    }

    let existing = match existing {
        Some(existing) => existing,
        None => return param.to_vec(),
    };

    match op {
        MutationType::Add => add(existing, param),
        MutationType::BitAnd => bitwise(existing, param, |a, b| a & b),
        MutationType::BitOr => bitwise(existing, param, |a, b| a | b),
        MutationType::BitXor => bitwise(existing, param, |a, b| a ^ b),
        MutationType::Max => {
            let current = resize(existing, param.len());
            if compare_le(&current, param) == Ordering::Less {
                param.to_vec()
            } else {
                current
            }
        }
        MutationType::Min => {
            let current = resize(existing, param.len());
            if compare_le(&current, param) == Ordering::Greater {
                param.to_vec()
            } else {
                current
            }
        }
        MutationType::ByteMin => existing.min(param).to_vec(),
        MutationType::ByteMax => existing.max(param).to_vec(),
        MutationType::AppendIfFits
        | MutationType::SetVersionstampedKey
        | MutationType::SetVersionstampedValue => param.to_vec(),
    }
}

fn resize(value: &[u8], len: usize) -> Vec<u8> {
    let mut out = value[..value.len().min(len)].to_vec();
    out.resize(len, 0);
    out
}

fn add(existing: &[u8], param: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(param.len());
    let mut carry = 0u16;
    for (i, &b) in param.iter().enumerate() {
        let a = existing.get(i).copied().unwrap_or(0);
        let sum = a as u16 + b as u16 + carry;
        out.push(sum as u8);
        carry = sum >> 8;
    }
    out
}

fn bitwise(existing: &[u8], param: &[u8], f: impl Fn(u8, u8) -> u8) -> Vec<u8> {
    param
        .iter()
        .enumerate()
        .map(|(i, &b)| f(existing.get(i).copied().unwrap_or(0), b))
        .collect()
}

/// Compare equal-length little-endian unsigned integers.
fn compare_le(a: &[u8], b: &[u8]) -> Ordering {
    a.iter().rev().cmp(b.iter().rev())
}
