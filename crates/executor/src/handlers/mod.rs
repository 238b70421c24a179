//! Instruction handlers organized by operation group.
//!
//! | Module | Operations |
//! |--------|------------|
//! | `stack` | PUSH, POP, DUP, EMPTY_STACK, SWAP, WAIT_FUTURE, SUB, CONCAT |
//! | `transaction` | Transaction lifecycle, versions, ON_ERROR, WAIT_EMPTY |
//! | `read` | GET, GET_KEY and the range reads |
//! | `mutation` | Writes, clears, atomic ops and conflict ranges |
//! | `tuple` | Tuple codec and float encodings |
//! | `misc` | UNIT_TESTS, LOG_STACK |
//!
//! Shared here: operand conversion and the two ways an operation reaches
//! the store ([`read`] and [`mutate`]).

pub mod misc;
pub mod mutation;
pub mod read;
pub mod stack;
pub mod transaction;
pub mod tuple;

use futures::future;
use std::sync::Arc;

use stacktester_core::{
    retry, Element, KeySelector, StoreFuture, StoreResult, StreamingMode, Transaction,
};

use crate::context::Context;
use crate::operation::Target;
use crate::pending::marker;
use crate::{Error, Result};

// =============================================================================
// Operand conversion
// =============================================================================

/// A byte-string operand.
pub(crate) fn bytes_param(operation: &'static str, element: Element) -> Result<Vec<u8>> {
    match element {
        Element::Bytes(bytes) => Ok(bytes),
        other => Err(Error::parameter(
            operation,
            format!("expected bytes, found {}", other.type_name()),
        )),
    }
}

/// An integer operand that fits in an `i64`.
pub(crate) fn int_param(operation: &'static str, element: &Element) -> Result<i64> {
    if let Element::Bool(value) = element {
        return Ok(i64::from(*value));
    }
    let value = element.as_int().ok_or_else(|| {
        Error::parameter(
            operation,
            format!("expected an integer, found {}", element.type_name()),
        )
    })?;
    i64::try_from(value)
        .map_err(|_| Error::parameter(operation, format!("integer {value} out of range")))
}

/// A non-negative count or depth.
pub(crate) fn count_param(operation: &'static str, element: &Element) -> Result<usize> {
    let value = int_param(operation, element)?;
    usize::try_from(value)
        .map_err(|_| Error::parameter(operation, format!("expected a count, found {value}")))
}

/// A flag operand: any non-zero integer is true.
pub(crate) fn bool_param(operation: &'static str, element: &Element) -> Result<bool> {
    Ok(int_param(operation, element)? != 0)
}

/// A streaming mode code; null means the iterator mode.
pub(crate) fn mode_param(operation: &'static str, element: &Element) -> Result<StreamingMode> {
    if element.is_null() {
        return Ok(StreamingMode::Iterator);
    }
    let code = int_param(operation, element)?;
    StreamingMode::from_code(code)
        .ok_or_else(|| Error::parameter(operation, format!("unknown streaming mode {code}")))
}

/// A key selector from `(key, or_equal, offset)` operands.
pub(crate) fn selector_param(
    operation: &'static str,
    key: Element,
    or_equal: &Element,
    offset: &Element,
) -> Result<KeySelector> {
    let offset = i32::try_from(int_param(operation, offset)?)
        .map_err(|_| Error::parameter(operation, "selector offset out of range"))?;
    Ok(KeySelector::new(
        bytes_param(operation, key)?,
        bool_param(operation, or_equal)?,
        offset,
    ))
}

/// Split `count` popped parameters into a fixed-size array.
pub(crate) fn take<const N: usize>(operation: &'static str, params: Vec<Element>) -> Result<[Element; N]> {
    params
        .try_into()
        .map_err(|_| Error::parameter(operation, format!("expected {N} parameters")))
}

// =============================================================================
// Reaching the store
// =============================================================================

/// Issue a read against the target.
///
/// The database target runs `f` in a retry loop without committing; the
/// snapshot target passes `snapshot = true`.
pub(crate) fn read<T, F>(ctx: &Context, target: Target, mut f: F) -> StoreFuture<T>
where
    T: Send + 'static,
    F: FnMut(Arc<dyn Transaction>, bool) -> StoreFuture<T> + Send + 'static,
{
    match target {
        Target::Database => Box::pin(retry::read(ctx.database(), move |tr| f(tr, false))),
        Target::Transaction => f(ctx.transaction(), false),
        Target::Snapshot => f(ctx.transaction(), true),
    }
}

/// Apply a buffered write to the target and wait for it.
///
/// The database target runs `f` in a committing retry loop and pushes
/// `RESULT_NOT_PRESENT` once it succeeds; the transaction target applies
/// `f` to the bound transaction and pushes nothing.
pub(crate) async fn mutate<F>(ctx: &mut Context, target: Target, mut f: F) -> Result<()>
where
    F: FnMut(&dyn Transaction) -> StoreResult<()> + Send + 'static,
{
    match target {
        Target::Database => {
            retry::run(ctx.database(), move |tr| {
                Box::pin(future::ready(f(tr.as_ref())))
            })
            .await?;
            ctx.push(Element::bytes(marker::RESULT_NOT_PRESENT.to_vec()));
        }
        Target::Transaction | Target::Snapshot => f(ctx.transaction().as_ref())?,
    }
    Ok(())
}
