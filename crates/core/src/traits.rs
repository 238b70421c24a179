//! The store client contract
//!
//! This module defines the Database and Transaction traits the interpreter
//! drives. Any store whose client can express these operations can be put
//! under test by implementing them.
//!
//! Calls that talk to the store (reads, commit, on-error) are *issued* when
//! the method is called and return a [`StoreFuture`] for the outcome. The
//! request is in flight before anyone awaits it, so the order in which calls
//! are made is the order in which the store observes them.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{StoreError, StoreResult};
use crate::options::{DatabaseOption, MutationType, TransactionOption};
use crate::types::{ConflictRangeType, KeySelector, RangeOptions, RangePage};

/// An issued store request
pub type StoreFuture<T> = BoxFuture<'static, StoreResult<T>>;

/// A handle to a database
///
/// Thread safety: handles are shared by every execution context, so all
/// methods must be safe to call concurrently.
pub trait Database: Send + Sync {
    /// Create a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot start a transaction.
    fn create_transaction(&self) -> StoreResult<Arc<dyn Transaction>>;

    /// Set a database-wide option
    fn set_option(&self, option: DatabaseOption) -> StoreResult<()>;
}

/// A transaction against a database
///
/// Transactions use interior mutability: every method takes `&self` so one
/// transaction can be shared between an execution context and the pending
/// results issued against it.
pub trait Transaction: Send + Sync {
    /// Read the value of `key`, `None` if absent.
    ///
    /// Snapshot reads add no read conflict range.
    fn get(&self, key: &[u8], snapshot: bool) -> StoreFuture<Option<Vec<u8>>>;

    /// Resolve a key selector to a key
    fn get_key(&self, selector: &KeySelector, snapshot: bool) -> StoreFuture<Vec<u8>>;

    /// Read one page of the range between two selectors
    ///
    /// # Arguments
    /// * `begin` - Inclusive start selector
    /// * `end` - Exclusive end selector
    /// * `options` - Limit, direction, streaming mode and page number
    /// * `snapshot` - Skip adding a read conflict range
    ///
    /// # Returns
    /// A page of entries and whether more remain. Use
    /// [`crate::range::read_range`] to read a whole range.
    fn get_range(
        &self,
        begin: &KeySelector,
        end: &KeySelector,
        options: &RangeOptions,
        snapshot: bool,
    ) -> StoreFuture<RangePage>;

    /// Buffer a write of `value` to `key`
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Buffer a clear of `key`
    fn clear(&self, key: &[u8]) -> StoreResult<()>;

    /// Buffer a clear of every key in `[begin, end)`
    fn clear_range(&self, begin: &[u8], end: &[u8]) -> StoreResult<()>;

    /// Buffer an atomic mutation of `key` with operand `param`
    fn atomic_op(&self, op: MutationType, key: &[u8], param: &[u8]) -> StoreResult<()>;

    /// Add a conflict range `[begin, end)` of the given kind
    fn add_conflict_range(
        &self,
        begin: &[u8],
        end: &[u8],
        kind: ConflictRangeType,
    ) -> StoreResult<()>;

    /// Commit the buffered writes
    fn commit(&self) -> StoreFuture<()>;

    /// Cancel the transaction
    ///
    /// Outstanding and future operations fail with `TRANSACTION_CANCELLED`.
    fn cancel(&self);

    /// Discard all buffered state and start over
    fn reset(&self);

    /// Run the retry protocol for `error`.
    ///
    /// Resolves to a fresh transaction to retry with once any backoff has
    /// elapsed, or fails with `error` itself when it is not retryable or the
    /// retry limit is exhausted.
    fn on_error(&self, error: StoreError) -> StoreFuture<Arc<dyn Transaction>>;

    /// The read version, fixing it if not yet chosen
    fn get_read_version(&self) -> StoreFuture<i64>;

    /// Pin the read version
    fn set_read_version(&self, version: i64);

    /// Version at which this transaction committed
    ///
    /// `-1` until a commit with writes has succeeded, and for read-only
    /// commits.
    fn get_committed_version(&self) -> StoreResult<i64>;

    /// The 10-byte versionstamp this transaction will commit at
    ///
    /// Resolves only after a successful commit; fails if the transaction is
    /// cancelled, reset or dropped, or its commit fails.
    fn get_versionstamp(&self) -> StoreFuture<Vec<u8>>;

    /// Set a transaction option
    fn set_option(&self, option: TransactionOption) -> StoreResult<()>;
}

/// Whether two handles refer to the same transaction object.
pub fn same_transaction(a: &Arc<dyn Transaction>, b: &Arc<dyn Transaction>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
