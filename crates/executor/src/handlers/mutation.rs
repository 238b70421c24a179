//! Write, clear, atomic and conflict-range handlers.

use std::str::FromStr;

use stacktester_core::{
    key_after, prefix_range, ConflictRangeType, Element, MutationType, TransactionOption,
};

use super::{bytes_param, mutate, take};
use crate::context::Context;
use crate::operation::Target;
use crate::pending::marker;
use crate::{Error, Result};

/// SET: `PUSH key, PUSH value, SET`.
pub async fn set(ctx: &mut Context, target: Target) -> Result<()> {
    let [key, value] = take::<2>("SET", ctx.pop_params(2).await?)?;
    let key = bytes_param("SET", key)?;
    let value = bytes_param("SET", value)?;
    mutate(ctx, target, move |tr| tr.set(&key, &value)).await
}

/// CLEAR: `PUSH key, CLEAR`.
pub async fn clear(ctx: &mut Context, target: Target) -> Result<()> {
    let key = bytes_param("CLEAR", ctx.pop_param().await?)?;
    mutate(ctx, target, move |tr| tr.clear(&key)).await
}

/// CLEAR_RANGE: `PUSH begin, PUSH end, CLEAR_RANGE`.
pub async fn clear_range(ctx: &mut Context, target: Target) -> Result<()> {
    let [begin, end] = take::<2>("CLEAR_RANGE", ctx.pop_params(2).await?)?;
    let begin = bytes_param("CLEAR_RANGE", begin)?;
    let end = bytes_param("CLEAR_RANGE", end)?;
    mutate(ctx, target, move |tr| tr.clear_range(&begin, &end)).await
}

/// CLEAR_RANGE_STARTS_WITH: `PUSH prefix, CLEAR_RANGE_STARTS_WITH`.
pub async fn clear_range_starts_with(ctx: &mut Context, target: Target) -> Result<()> {
    const OP: &str = "CLEAR_RANGE_STARTS_WITH";
    let prefix = bytes_param(OP, ctx.pop_param().await?)?;
    let (begin, end) = prefix_range(&prefix).map_err(|e| Error::parameter(OP, e.to_string()))?;
    mutate(ctx, target, move |tr| tr.clear_range(&begin, &end)).await
}

/// ATOMIC_OP: `PUSH type, PUSH key, PUSH operand, ATOMIC_OP`.
///
/// The type is the mutation's name as a string, e.g. `"ADD"` or `"BYTE_MAX"`.
pub async fn atomic_op(ctx: &mut Context, target: Target) -> Result<()> {
    const OP: &str = "ATOMIC_OP";
    let [kind, key, param] = take::<3>(OP, ctx.pop_params(3).await?)?;
    let name = kind.as_str().ok_or_else(|| {
        Error::parameter(
            OP,
            format!("expected a mutation name, found {}", kind.type_name()),
        )
    })?;
    let kind = MutationType::from_str(name).map_err(|e| Error::parameter(OP, e.to_string()))?;
    let key = bytes_param(OP, key)?;
    let param = bytes_param(OP, param)?;
    mutate(ctx, target, move |tr| tr.atomic_op(kind, &key, &param)).await
}

// =============================================================================
// Conflict ranges
// =============================================================================

/// READ_CONFLICT_RANGE / WRITE_CONFLICT_RANGE: `PUSH begin, PUSH end, ...`.
pub async fn conflict_range(ctx: &mut Context, kind: ConflictRangeType) -> Result<()> {
    let op = conflict_op_name(kind, false);
    let [begin, end] = take::<2>(op, ctx.pop_params(2).await?)?;
    let begin = bytes_param(op, begin)?;
    let end = bytes_param(op, end)?;
    ctx.transaction().add_conflict_range(&begin, &end, kind)?;
    ctx.push(Element::bytes(marker::SET_CONFLICT_RANGE.to_vec()));
    Ok(())
}

/// READ_CONFLICT_KEY / WRITE_CONFLICT_KEY: a conflict range covering exactly
/// the popped key.
pub async fn conflict_key(ctx: &mut Context, kind: ConflictRangeType) -> Result<()> {
    let op = conflict_op_name(kind, true);
    let key = bytes_param(op, ctx.pop_param().await?)?;
    let end = key_after(&key);
    ctx.transaction().add_conflict_range(&key, &end, kind)?;
    ctx.push(Element::bytes(marker::SET_CONFLICT_KEY.to_vec()));
    Ok(())
}

/// DISABLE_WRITE_CONFLICT: the next write adds no write conflict range.
pub async fn disable_write_conflict(ctx: &mut Context) -> Result<()> {
    ctx.transaction()
        .set_option(TransactionOption::NextWriteNoWriteConflictRange)?;
    Ok(())
}

fn conflict_op_name(kind: ConflictRangeType, single_key: bool) -> &'static str {
    match (kind, single_key) {
        (ConflictRangeType::Read, false) => "READ_CONFLICT_RANGE",
        (ConflictRangeType::Read, true) => "READ_CONFLICT_KEY",
        (ConflictRangeType::Write, false) => "WRITE_CONFLICT_RANGE",
        (ConflictRangeType::Write, true) => "WRITE_CONFLICT_KEY",
    }
}
