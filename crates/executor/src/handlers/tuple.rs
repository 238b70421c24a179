//! Tuple codec and float encoding handlers.
//!
//! Tuple operations pop an element count first and then that many elements,
//! which become the tuple in the order they were pushed.

use rand::Rng;
use stacktester_core::{tuple, Element, TupleError};

use super::{bytes_param, count_param, int_param, take};
use crate::context::Context;
use crate::pending::marker;
use crate::{Error, Result};

async fn pop_tuple(ctx: &mut Context, operation: &'static str) -> Result<Vec<Element>> {
    let count = count_param(operation, &ctx.pop_param().await?)?;
    ctx.pop_params(count).await
}

/// TUPLE_PACK: `PUSH e1, ..., PUSH en, PUSH n, TUPLE_PACK`.
pub async fn pack(ctx: &mut Context) -> Result<()> {
    let elements = pop_tuple(ctx, "TUPLE_PACK").await?;
    ctx.push(Element::Bytes(tuple::pack(&elements)?));
    Ok(())
}

/// TUPLE_PACK_WITH_VERSIONSTAMP: `PUSH e1, ..., PUSH en, PUSH prefix,
/// PUSH n, TUPLE_PACK_WITH_VERSIONSTAMP`.
///
/// Pushes `OK` and the packed key when the tuple holds exactly one
/// incomplete versionstamp, otherwise `ERROR: NONE` or `ERROR: MULTIPLE`.
/// A tuple without a placeholder is reported as `ERROR: NONE` without
/// packing at the configured skip probability.
pub async fn pack_with_versionstamp(ctx: &mut Context) -> Result<()> {
    const OP: &str = "TUPLE_PACK_WITH_VERSIONSTAMP";
    let [prefix, count] = take::<2>(OP, ctx.pop_params(2).await?)?;
    let prefix = bytes_param(OP, prefix)?;
    let count = count_param(OP, &count)?;
    let elements = ctx.pop_params(count).await?;

    let placeholders: usize = elements.iter().map(Element::incomplete_versionstamps).sum();
    let skip = ctx.config().versionstamp_skip_probability;
    if placeholders == 0 && ctx.rng().gen_bool(skip) {
        ctx.push(Element::bytes(marker::ERROR_NONE.to_vec()));
        return Ok(());
    }

    match tuple::pack_with_versionstamp(&prefix, &elements) {
        Ok(packed) => {
            ctx.push(Element::bytes(marker::OK.to_vec()));
            ctx.push(Element::Bytes(packed));
        }
        Err(TupleError::NoIncompleteVersionstamp) => {
            ctx.push(Element::bytes(marker::ERROR_NONE.to_vec()))
        }
        Err(TupleError::MultipleIncompleteVersionstamps { .. }) => {
            ctx.push(Element::bytes(marker::ERROR_MULTIPLE.to_vec()))
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// TUPLE_UNPACK: push each element of the popped tuple as a packed
/// one-element tuple.
pub async fn unpack(ctx: &mut Context) -> Result<()> {
    let packed = bytes_param("TUPLE_UNPACK", ctx.pop_param().await?)?;
    for element in tuple::unpack(&packed)? {
        ctx.push(Element::Bytes(tuple::pack(&[element])?));
    }
    Ok(())
}

/// TUPLE_RANGE: push the begin and then the end key of the tuple's range.
pub async fn range(ctx: &mut Context) -> Result<()> {
    let elements = pop_tuple(ctx, "TUPLE_RANGE").await?;
    let (begin, end) = tuple::range(&elements)?;
    ctx.push(Element::Bytes(begin));
    ctx.push(Element::Bytes(end));
    Ok(())
}

/// TUPLE_SORT: sort packed tuples by the codec order and push them back,
/// smallest first.
pub async fn sort(ctx: &mut Context) -> Result<()> {
    let items = pop_tuple(ctx, "TUPLE_SORT").await?;
    let mut packed = Vec::with_capacity(items.len());
    for item in items {
        let decoded = tuple::unpack(&bytes_param("TUPLE_SORT", item)?)?;
        packed.push(tuple::pack(&decoded)?);
    }
    packed.sort_by(|a, b| tuple::compare(a, b));
    for item in packed {
        ctx.push(Element::Bytes(item));
    }
    Ok(())
}

// =============================================================================
// Float encodings
// =============================================================================

/// ENCODE_FLOAT: 4 big-endian bytes to a float element.
pub async fn encode_float(ctx: &mut Context) -> Result<()> {
    let raw = fixed_bytes::<4>("ENCODE_FLOAT", ctx.pop_param().await?)?;
    ctx.push(Element::Float(f32::from_be_bytes(raw)));
    Ok(())
}

/// ENCODE_DOUBLE: 8 big-endian bytes to a double element.
pub async fn encode_double(ctx: &mut Context) -> Result<()> {
    let raw = fixed_bytes::<8>("ENCODE_DOUBLE", ctx.pop_param().await?)?;
    ctx.push(Element::Double(f64::from_be_bytes(raw)));
    Ok(())
}

/// DECODE_FLOAT: a float element to its 4 big-endian bytes.
pub async fn decode_float(ctx: &mut Context) -> Result<()> {
    let param = ctx.pop_param().await?;
    let value = match &param {
        Element::Float(value) => *value,
        Element::Double(value) => *value as f32,
        Element::Int(_) => int_param("DECODE_FLOAT", &param)? as f32,
        _ => return Err(not_a_number("DECODE_FLOAT", &param)),
    };
    ctx.push(Element::bytes(value.to_be_bytes().to_vec()));
    Ok(())
}

/// DECODE_DOUBLE: a double element to its 8 big-endian bytes.
pub async fn decode_double(ctx: &mut Context) -> Result<()> {
    let param = ctx.pop_param().await?;
    let value = match &param {
        Element::Double(value) => *value,
        Element::Float(value) => f64::from(*value),
        Element::Int(_) => int_param("DECODE_DOUBLE", &param)? as f64,
        _ => return Err(not_a_number("DECODE_DOUBLE", &param)),
    };
    ctx.push(Element::bytes(value.to_be_bytes().to_vec()));
    Ok(())
}

fn fixed_bytes<const N: usize>(operation: &'static str, element: Element) -> Result<[u8; N]> {
    let bytes = bytes_param(operation, element)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| Error::parameter(operation, format!("expected {N} bytes, found {len}")))
}

fn not_a_number(operation: &'static str, element: &Element) -> Error {
    Error::parameter(
        operation,
        format!("expected a number, found {}", element.type_name()),
    )
}
