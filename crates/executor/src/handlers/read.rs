//! Read handlers.
//!
//! Every read pushes a pending result. Range reads page through the whole
//! range and flatten it into one packed tuple of alternating keys and values.

use stacktester_core::{
    prefix_range, read_range, strinc, tuple, Element, KeySelector, KeyValue, RangeOptions,
};

use super::{bool_param, bytes_param, count_param, mode_param, read, selector_param, take};
use crate::context::Context;
use crate::operation::Target;
use crate::pending::PendingResult;
use crate::{Error, Result};

/// GET: `PUSH key, GET`.
pub async fn get(ctx: &mut Context, target: Target) -> Result<()> {
    let key = bytes_param("GET", ctx.pop_param().await?)?;
    let issued = read(ctx, target, move |tr, snapshot| tr.get(&key, snapshot));
    ctx.push_pending(PendingResult::spawn(async move {
        Ok(issued.await?.map(Element::Bytes))
    }));
    Ok(())
}

/// GET_KEY: `PUSH key, PUSH or_equal, PUSH offset, PUSH prefix, GET_KEY`.
///
/// The resolved key is clamped to the prefix, see [`clamp_to_prefix`].
pub async fn get_key(ctx: &mut Context, target: Target) -> Result<()> {
    let [key, or_equal, offset, prefix] = take::<4>("GET_KEY", ctx.pop_params(4).await?)?;
    let selector = selector_param("GET_KEY", key, &or_equal, &offset)?;
    let prefix = bytes_param("GET_KEY", prefix)?;

    let issued = read(ctx, target, move |tr, snapshot| tr.get_key(&selector, snapshot));
    ctx.push_pending(PendingResult::spawn(async move {
        let key = issued.await?;
        Ok(Some(Element::Bytes(clamp_to_prefix(key, &prefix)?)))
    }));
    Ok(())
}

/// Clamp `key` into the keys sharing `prefix`.
///
/// # Returns
/// - `key` itself if it starts with `prefix`
/// - `prefix` if `key` sorts before it
/// - `strinc(prefix)` otherwise
pub fn clamp_to_prefix(key: Vec<u8>, prefix: &[u8]) -> Result<Vec<u8>> {
    if key.starts_with(prefix) {
        Ok(key)
    } else if key.as_slice() < prefix {
        Ok(prefix.to_vec())
    } else {
        strinc(prefix).map_err(|e| Error::parameter("GET_KEY", e.to_string()))
    }
}

/// GET_RANGE: `PUSH begin, PUSH end, PUSH limit, PUSH reverse, PUSH mode,
/// GET_RANGE`.
pub async fn get_range(ctx: &mut Context, target: Target) -> Result<()> {
    let [begin, end, limit, reverse, mode] = take::<5>("GET_RANGE", ctx.pop_params(5).await?)?;
    let begin = KeySelector::first_greater_or_equal(bytes_param("GET_RANGE", begin)?);
    let end = KeySelector::first_greater_or_equal(bytes_param("GET_RANGE", end)?);
    let options = range_options("GET_RANGE", &limit, &reverse, &mode)?;
    push_range(ctx, target, begin, end, options, None);
    Ok(())
}

/// GET_RANGE_STARTS_WITH: `PUSH prefix, PUSH limit, PUSH reverse, PUSH mode,
/// GET_RANGE_STARTS_WITH`.
pub async fn get_range_starts_with(ctx: &mut Context, target: Target) -> Result<()> {
    const OP: &str = "GET_RANGE_STARTS_WITH";
    let [prefix, limit, reverse, mode] = take::<4>(OP, ctx.pop_params(4).await?)?;
    let (begin, end) =
        prefix_range(&bytes_param(OP, prefix)?).map_err(|e| Error::parameter(OP, e.to_string()))?;
    let options = range_options(OP, &limit, &reverse, &mode)?;
    push_range(
        ctx,
        target,
        KeySelector::first_greater_or_equal(begin),
        KeySelector::first_greater_or_equal(end),
        options,
        None,
    );
    Ok(())
}

/// GET_RANGE_SELECTOR: two selector triples, limit, reverse, mode and a
/// prefix filter, pushed in that order. A null prefix disables filtering.
pub async fn get_range_selector(ctx: &mut Context, target: Target) -> Result<()> {
    const OP: &str = "GET_RANGE_SELECTOR";
    let [begin_key, begin_or_equal, begin_offset, end_key, end_or_equal, end_offset, limit, reverse, mode, prefix] =
        take::<10>(OP, ctx.pop_params(10).await?)?;
    let begin = selector_param(OP, begin_key, &begin_or_equal, &begin_offset)?;
    let end = selector_param(OP, end_key, &end_or_equal, &end_offset)?;
    let options = range_options(OP, &limit, &reverse, &mode)?;
    let prefix = match prefix {
        Element::Null => None,
        other => Some(bytes_param(OP, other)?),
    };
    push_range(ctx, target, begin, end, options, prefix);
    Ok(())
}

fn range_options(
    operation: &'static str,
    limit: &Element,
    reverse: &Element,
    mode: &Element,
) -> Result<RangeOptions> {
    Ok(RangeOptions::new(
        count_param(operation, limit)?,
        bool_param(operation, reverse)?,
        mode_param(operation, mode)?,
    ))
}

fn push_range(
    ctx: &mut Context,
    target: Target,
    begin: KeySelector,
    end: KeySelector,
    options: RangeOptions,
    prefix: Option<Vec<u8>>,
) {
    let issued = read(ctx, target, move |tr, snapshot| {
        read_range(tr, begin.clone(), end.clone(), options.clone(), snapshot)
    });
    ctx.push_pending(PendingResult::spawn(async move {
        let entries = issued.await?;
        Ok(Some(Element::Bytes(pack_range(&entries, prefix.as_deref())?)))
    }));
}

/// Flatten entries into `pack((k1, v1, k2, v2, ...))`, keeping only keys
/// that start with `prefix` when one is given.
pub fn pack_range(entries: &[KeyValue], prefix: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut items = Vec::with_capacity(entries.len() * 2);
    for kv in entries {
        if prefix.map_or(true, |p| kv.key.starts_with(p)) {
            items.push(Element::bytes(kv.key.clone()));
            items.push(Element::bytes(kv.value.clone()));
        }
    }
    Ok(tuple::pack(&items)?)
}
