//! Client self-checks and stack logging.

use futures::future;
use num_bigint::BigInt;
use tracing::debug;

use stacktester_core::{
    retry, tuple, DatabaseOption, Element, StoreError, StoreResult, Transaction,
    TransactionOption,
};

use super::bytes_param;
use crate::context::Context;
use crate::{Error, Result};

/// UNIT_TESTS: exercise the option surface and the retryability predicate.
///
/// # Errors
///
/// Returns [`Error::UnitTests`] when any check fails; the run cannot trust a
/// client that fails them.
pub async fn unit_tests(ctx: &mut Context) -> Result<()> {
    let db = ctx.database();
    db.set_option(DatabaseOption::LocationCacheSize(100_001))
        .map_err(unit_test_failure)?;

    if !StoreError::new(1020).is_retryable() || StoreError::new(10).is_retryable() {
        return Err(Error::UnitTests {
            reason: "error predicate incorrect".into(),
        });
    }

    retry::run(db, |tr| {
        if let Err(e) = set_every_option(tr.as_ref()) {
            return Box::pin(future::ready(Err(e)));
        }
        let read = tr.get(b"\xff", false);
        Box::pin(async move { read.await.map(|_| ()) })
    })
    .await
    .map_err(unit_test_failure)
}

fn set_every_option(tr: &dyn Transaction) -> StoreResult<()> {
    for option in [
        TransactionOption::PrioritySystemImmediate,
        TransactionOption::PriorityBatch,
        TransactionOption::CausalReadRisky,
        TransactionOption::CausalWriteRisky,
        TransactionOption::ReadYourWritesDisable,
        TransactionOption::ReadAheadDisable,
        TransactionOption::ReadSystemKeys,
        TransactionOption::AccessSystemKeys,
        TransactionOption::DurabilityDevNullIsWebScale,
        TransactionOption::Timeout(60_000),
        TransactionOption::RetryLimit(50),
        TransactionOption::MaxRetryDelay(100),
        TransactionOption::UsedDuringCommitProtectionDisable,
        TransactionOption::TransactionLoggingEnable("my_transaction".into()),
    ] {
        tr.set_option(option)?;
    }
    Ok(())
}

fn unit_test_failure(e: StoreError) -> Error {
    Error::UnitTests {
        reason: e.to_string(),
    }
}

/// LOG_STACK: drain the whole stack into the store under the popped prefix.
///
/// Each entry is written at `prefix ++ pack((position, origin_index))`,
/// where position counts from the bottom of the stack, with value
/// `pack((value,))` cut to the configured maximum length. Entries are popped
/// from the top and committed in batches.
pub async fn log_stack(ctx: &mut Context) -> Result<()> {
    let prefix = bytes_param("LOG_STACK", ctx.pop_param().await?)?;
    let batch_size = ctx.config().log_stack_batch_size;
    let max_value = ctx.config().max_logged_value_bytes;

    while !ctx.stack().is_empty() {
        let mut batch = Vec::with_capacity(batch_size.min(ctx.stack().len()));
        while batch.len() < batch_size {
            let position = ctx.stack().len();
            let Ok(entry) = ctx.stack_mut().pop() else {
                break;
            };
            let position = position - 1;
            let value = entry.value.resolve().await?;

            let key = tuple::pack_with_prefix(
                &prefix,
                &[
                    Element::Int(BigInt::from(position)),
                    Element::Int(BigInt::from(entry.index)),
                ],
            )?;
            let mut packed = tuple::pack(&[value])?;
            packed.truncate(max_value);
            batch.push((key, packed));
        }

        debug!(entries = batch.len(), "Logging stack batch");
        retry::run(ctx.database(), move |tr| {
            let written = batch.iter().try_for_each(|(key, value)| tr.set(key, value));
            Box::pin(future::ready(written))
        })
        .await?;
    }
    Ok(())
}
