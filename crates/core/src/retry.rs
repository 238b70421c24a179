//! Retry loops over the on-error protocol
//!
//! `run` executes a closure in a transaction and commits it; `read` executes a
//! closure without committing. Both hand store errors to
//! [`Transaction::on_error`] and retry with the transaction it returns until
//! the closure succeeds or the error is not retryable.

use std::sync::Arc;

use tracing::warn;

use crate::error::StoreResult;
use crate::traits::{Database, StoreFuture, Transaction};

/// Run `f` in a transaction and commit, retrying retryable errors.
///
/// `f` may be invoked more than once; each invocation receives a fresh
/// transaction.
///
/// # Errors
///
/// Returns the first error the on-error protocol refuses to retry.
pub async fn run<T, F>(db: Arc<dyn Database>, mut f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnMut(Arc<dyn Transaction>) -> StoreFuture<T> + Send,
{
    let mut tr = db.create_transaction()?;
    loop {
        let outcome = match f(Arc::clone(&tr)).await {
            Ok(value) => tr.commit().await.map(|()| value),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(code = e.code(), "Retrying transaction after error: {}", e);
                tr = tr.on_error(e).await?;
            }
        }
    }
}

/// Run `f` in a transaction without committing, retrying retryable errors.
///
/// # Errors
///
/// Returns the first error the on-error protocol refuses to retry.
pub async fn read<T, F>(db: Arc<dyn Database>, mut f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnMut(Arc<dyn Transaction>) -> StoreFuture<T> + Send,
{
    let mut tr = db.create_transaction()?;
    loop {
        match f(Arc::clone(&tr)).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(code = e.code(), "Retrying read after error: {}", e);
                tr = tr.on_error(e).await?;
            }
        }
    }
}
