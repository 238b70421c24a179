//! Optimistic transactions over the in-memory store
//!
//! A MemoryTransaction is created by [`crate::MemoryDatabase`]. It:
//! - Fixes a read version on first read (or takes a pinned one)
//! - Serves reads from the versioned store layered under its write buffer
//! - Records read ranges for non-snapshot reads and write ranges for writes
//! - Validates read ranges at commit (first-committer-wins)
//!
//! All work happens synchronously when a method is called; returned futures
//! are already resolved. Only the `on_error` backoff waits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::future::{ready, FutureExt};
use parking_lot::Mutex;
use stacktester_core::{
    code, key_after, printable, ConflictRangeType, KeySelector, KeyValue, MutationType,
    RangeOptions, RangePage, StoreError, StoreFuture, StoreResult, Transaction,
    TransactionOption,
};
use tracing::{debug, trace};

use crate::conflict::ConflictRange;
use crate::database::{versionstamp, Shared};
use crate::write_buffer::WriteBuffer;

/// First key of the system keyspace
const SYSTEM_BEGIN: &[u8] = b"\xff";
/// End of the keyspace reachable with system-key access
const SYSTEM_END: &[u8] = b"\xff\xff";

type StampSender = oneshot::Sender<StoreResult<Vec<u8>>>;

/// Options that change how a transaction behaves
#[derive(Debug, Clone, Default)]
struct TxOptions {
    read_your_writes_disable: bool,
    read_system_keys: bool,
    access_system_keys: bool,
    timeout: Option<Duration>,
    retry_limit: Option<u32>,
    max_retry_delay_ms: Option<u64>,
    log_id: Option<String>,
}

impl TxOptions {
    /// Options that survive `on_error`
    fn retained(&self) -> Self {
        TxOptions {
            timeout: self.timeout,
            retry_limit: self.retry_limit,
            max_retry_delay_ms: self.max_retry_delay_ms,
            ..TxOptions::default()
        }
    }
}

struct TxState {
    read_version: Option<u64>,
    buffer: WriteBuffer,
    reads: Vec<ConflictRange>,
    writes: Vec<ConflictRange>,
    options: TxOptions,
    next_write_no_conflict: bool,
    cancelled: bool,
    committed_version: i64,
    stamp: Option<Vec<u8>>,
    stamp_waiters: Vec<StampSender>,
    retries: u32,
    backoff_ms: u64,
    started: Instant,
}

impl TxState {
    fn new(initial_backoff_ms: u64) -> Self {
        TxState {
            read_version: None,
            buffer: WriteBuffer::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            options: TxOptions::default(),
            next_write_no_conflict: false,
            cancelled: false,
            committed_version: -1,
            stamp: None,
            stamp_waiters: Vec::new(),
            retries: 0,
            backoff_ms: initial_backoff_ms,
            started: Instant::now(),
        }
    }

    /// Fail if the transaction was cancelled or ran past its timeout
    fn check_usable(&self) -> StoreResult<()> {
        if self.cancelled {
            return Err(StoreError::new(code::TRANSACTION_CANCELLED));
        }
        if let Some(timeout) = self.options.timeout {
            if self.started.elapsed() >= timeout {
                return Err(StoreError::new(code::TRANSACTION_TIMED_OUT));
            }
        }
        Ok(())
    }

    /// End of the keyspace this transaction may read
    fn read_limit(&self) -> &'static [u8] {
        if self.options.read_system_keys || self.options.access_system_keys {
            SYSTEM_END
        } else {
            SYSTEM_BEGIN
        }
    }

    fn check_read_key(&self, key: &[u8]) -> StoreResult<()> {
        if key >= self.read_limit() {
            return Err(StoreError::new(code::KEY_OUTSIDE_LEGAL_RANGE));
        }
        Ok(())
    }

    fn write_limit(&self) -> &'static [u8] {
        if self.options.access_system_keys {
            SYSTEM_END
        } else {
            SYSTEM_BEGIN
        }
    }

    fn check_write_key(&self, key: &[u8]) -> StoreResult<()> {
        if key >= self.write_limit() {
            return Err(StoreError::new(code::KEY_OUTSIDE_LEGAL_RANGE));
        }
        Ok(())
    }

    fn add_write_conflict(&mut self, range: ConflictRange) {
        if self.next_write_no_conflict {
            self.next_write_no_conflict = false;
        } else {
            self.writes.push(range);
        }
    }

    fn log(&self, op: &str, key: &[u8]) {
        if let Some(id) = &self.options.log_id {
            debug!(txn = %id, op, key = %printable(key), "Transaction operation");
        }
    }

    /// Fail every pending versionstamp request
    fn fail_stamp_waiters(&mut self, error: StoreError) {
        for waiter in self.stamp_waiters.drain(..) {
            let _ = waiter.send(Err(error));
        }
    }
}

/// A transaction against a [`crate::MemoryDatabase`]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    id: u64,
    state: Mutex<TxState>,
}

impl MemoryTransaction {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let id = shared.next_txn_id();
        let state = TxState::new(shared.config.initial_backoff_ms);
        trace!(txn = id, "Created transaction");
        MemoryTransaction { shared, id, state: Mutex::new(state) }
    }

    /// Identifier used in log output
    pub fn id(&self) -> u64 {
        self.id
    }

    fn max_value_bytes(&self) -> usize {
        self.shared.limits.max_value_bytes
    }

    /// Read version for the next read, fixing it on first use.
    ///
    /// # Errors
    ///
    /// - `TRANSACTION_TOO_OLD` if the version has been pruned
    /// - `FUTURE_VERSION` if a pinned version is newer than the store
    fn read_version(&self, st: &mut TxState) -> StoreResult<u64> {
        let store = &self.shared.store;
        let version = *st.read_version.get_or_insert_with(|| store.version());
        if version < store.oldest_version() {
            return Err(StoreError::new(code::TRANSACTION_TOO_OLD));
        }
        if version > store.version() {
            return Err(StoreError::new(code::FUTURE_VERSION));
        }
        Ok(version)
    }

    /// Entries of `[begin, end)` as this transaction sees them.
    ///
    /// `limit` of 0 means unlimited. Results are in read order.
    fn visible_range(
        &self,
        st: &TxState,
        begin: &[u8],
        end: &[u8],
        version: u64,
        reverse: bool,
        limit: usize,
    ) -> StoreResult<Vec<KeyValue>> {
        let store = &self.shared.store;
        if st.options.read_your_writes_disable || st.buffer.is_empty() {
            return Ok(store.scan(begin, end, version, reverse, limit));
        }
        let mut merged = st.buffer.merge(
            store.scan(begin, end, version, false, 0),
            begin,
            end,
            self.max_value_bytes(),
        )?;
        if reverse {
            merged.reverse();
        }
        if limit > 0 {
            merged.truncate(limit);
        }
        Ok(merged)
    }

    /// Resolve a selector against this transaction's view.
    ///
    /// Resolution clamps to the empty key below the first key and to the end
    /// of the readable keyspace past the last.
    fn resolve(&self, st: &TxState, selector: &KeySelector, version: u64) -> StoreResult<Vec<u8>> {
        let limit = st.read_limit();
        let boundary = if selector.or_equal {
            key_after(&selector.key)
        } else {
            selector.key.clone()
        };

        if selector.offset >= 1 {
            let wanted = selector.offset as usize;
            if boundary.as_slice() >= limit {
                return Ok(limit.to_vec());
            }
            let found = self.visible_range(st, &boundary, limit, version, false, wanted)?;
            Ok(if found.len() == wanted {
                found[wanted - 1].key.clone()
            } else {
                limit.to_vec()
            })
        } else {
            let wanted = (1 - selector.offset as i64) as usize;
            let end = if boundary.as_slice() > limit {
                limit.to_vec()
            } else {
                boundary
            };
            let found = self.visible_range(st, b"", &end, version, true, wanted)?;
            Ok(if found.len() == wanted {
                found[wanted - 1].key.clone()
            } else {
                Vec::new()
            })
        }
    }

    fn do_get(&self, key: &[u8], snapshot: bool) -> StoreResult<Option<Vec<u8>>> {
        let mut st = self.state.lock();
        st.check_usable()?;
        st.check_read_key(key)?;
        st.log("get", key);
        let version = self.read_version(&mut st)?;
        let store = &self.shared.store;
        let value = if st.options.read_your_writes_disable {
            store.get(key, version)
        } else {
            st.buffer
                .read(key, || store.get(key, version), self.max_value_bytes())?
        };
        if !snapshot {
            st.reads.push(ConflictRange::single_key(key));
        }
        Ok(value)
    }

    fn do_get_key(&self, selector: &KeySelector, snapshot: bool) -> StoreResult<Vec<u8>> {
        let mut st = self.state.lock();
        st.check_usable()?;
        st.log("get_key", &selector.key);
        let version = self.read_version(&mut st)?;
        let key = self.resolve(&st, selector, version)?;
        if !snapshot {
            let (lo, hi) = if key <= selector.key {
                (key.clone(), selector.key.clone())
            } else {
                (selector.key.clone(), key.clone())
            };
            st.reads.push(ConflictRange::new(lo, key_after(&hi)));
        }
        Ok(key)
    }

    fn do_get_range(
        &self,
        begin: &KeySelector,
        end: &KeySelector,
        options: &RangeOptions,
        snapshot: bool,
    ) -> StoreResult<RangePage> {
        let mut st = self.state.lock();
        st.check_usable()?;
        st.log("get_range", &begin.key);
        let version = self.read_version(&mut st)?;
        let b = self.resolve(&st, begin, version)?;
        let e = self.resolve(&st, end, version)?;
        if b >= e {
            return Ok(RangePage::default());
        }

        let page_size = options.mode.page_size(options.iteration.max(1));
        let page = match options.limit {
            0 => page_size,
            limit => limit.min(page_size),
        };
        let mut entries =
            self.visible_range(&st, &b, &e, version, options.reverse, page.saturating_add(1))?;
        let more = entries.len() > page;
        entries.truncate(page);

        if !snapshot {
            let range = match (more, entries.last()) {
                (true, Some(last)) if options.reverse => ConflictRange::new(last.key.clone(), e),
                (true, Some(last)) => ConflictRange::new(b, key_after(&last.key)),
                _ => ConflictRange::new(b, e),
            };
            st.reads.push(range);
        }
        Ok(RangePage { entries, more })
    }

    fn do_commit(&self) -> StoreResult<()> {
        let mut st = self.state.lock();
        st.check_usable()?;

        if st.buffer.is_empty() && st.writes.is_empty() {
            st.committed_version = -1;
            st.fail_stamp_waiters(StoreError::new(code::NO_COMMIT_VERSION));
            trace!(txn = self.id, "Read-only commit");
            return Ok(());
        }

        let size = st.buffer.size()
            + st
                .writes
                .iter()
                .chain(st.reads.iter())
                .map(|r| r.begin.len() + r.end.len())
                .sum::<usize>();
        if let Err(e) = self.shared.limits.validate_transaction_size(size) {
            st.fail_stamp_waiters(e);
            return Err(e);
        }

        let read_version = st.read_version.unwrap_or_else(|| self.shared.store.version());
        let buffer = std::mem::take(&mut st.buffer);
        let reads = std::mem::take(&mut st.reads);
        let writes = std::mem::take(&mut st.writes);

        match self.shared.commit(read_version, &reads, writes, buffer) {
            Ok(version) => {
                let stamp = versionstamp(version).to_vec();
                st.committed_version = version as i64;
                for waiter in st.stamp_waiters.drain(..) {
                    let _ = waiter.send(Ok(stamp.clone()));
                }
                st.stamp = Some(stamp);
                if let Some(id) = &st.options.log_id {
                    debug!(txn = %id, version, "Transaction committed");
                }
                Ok(())
            }
            Err(e) => {
                st.fail_stamp_waiters(e);
                debug!(txn = self.id, code = e.code(), "Commit failed");
                Err(e)
            }
        }
    }

    fn do_write(
        &self,
        op: &str,
        key: &[u8],
        write: impl FnOnce(&mut TxState) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut st = self.state.lock();
        st.check_usable()?;
        st.check_write_key(key)?;
        self.shared.limits.validate_key(key)?;
        st.log(op, key);
        write(&mut *st)
    }
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &[u8], snapshot: bool) -> StoreFuture<Option<Vec<u8>>> {
        ready(self.do_get(key, snapshot)).boxed()
    }

    fn get_key(&self, selector: &KeySelector, snapshot: bool) -> StoreFuture<Vec<u8>> {
        ready(self.do_get_key(selector, snapshot)).boxed()
    }

    fn get_range(
        &self,
        begin: &KeySelector,
        end: &KeySelector,
        options: &RangeOptions,
        snapshot: bool,
    ) -> StoreFuture<RangePage> {
        ready(self.do_get_range(begin, end, options, snapshot)).boxed()
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.shared.limits.validate_value(value)?;
        self.do_write("set", key, |st| {
            st.buffer.set(key, value);
            st.add_write_conflict(ConflictRange::single_key(key));
            Ok(())
        })
    }

    fn clear(&self, key: &[u8]) -> StoreResult<()> {
        self.do_write("clear", key, |st| {
            st.buffer.clear(key);
            st.add_write_conflict(ConflictRange::single_key(key));
            Ok(())
        })
    }

    fn clear_range(&self, begin: &[u8], end: &[u8]) -> StoreResult<()> {
        if begin > end {
            return Err(StoreError::new(code::INVERTED_RANGE));
        }
        self.do_write("clear_range", begin, |st| {
            if end > st.write_limit() {
                return Err(StoreError::new(code::KEY_OUTSIDE_LEGAL_RANGE));
            }
            st.buffer.clear_range(begin, end);
            st.add_write_conflict(ConflictRange::new(begin.to_vec(), end.to_vec()));
            Ok(())
        })
    }

    fn atomic_op(&self, op: MutationType, key: &[u8], param: &[u8]) -> StoreResult<()> {
        self.shared.limits.validate_value(param)?;
        self.do_write(op.name(), key, |st| {
            st.buffer.atomic_op(op, key, param)?;
            // The final key is unknown until commit, so no write range
            if op == MutationType::SetVersionstampedKey {
                st.next_write_no_conflict = false;
            } else {
                st.add_write_conflict(ConflictRange::single_key(key));
            }
            Ok(())
        })
    }

    fn add_conflict_range(
        &self,
        begin: &[u8],
        end: &[u8],
        kind: ConflictRangeType,
    ) -> StoreResult<()> {
        if begin > end {
            return Err(StoreError::new(code::INVERTED_RANGE));
        }
        let mut st = self.state.lock();
        st.check_usable()?;
        let range = ConflictRange::new(begin.to_vec(), end.to_vec());
        match kind {
            ConflictRangeType::Read => st.reads.push(range),
            ConflictRangeType::Write => st.writes.push(range),
        }
        Ok(())
    }

    fn commit(&self) -> StoreFuture<()> {
        ready(self.do_commit()).boxed()
    }

    fn cancel(&self) {
        let mut st = self.state.lock();
        st.cancelled = true;
        st.fail_stamp_waiters(StoreError::new(code::TRANSACTION_CANCELLED));
        trace!(txn = self.id, "Cancelled transaction");
    }

    fn reset(&self) {
        let mut st = self.state.lock();
        st.fail_stamp_waiters(StoreError::new(code::TRANSACTION_CANCELLED));
        *st = TxState::new(self.shared.config.initial_backoff_ms);
        trace!(txn = self.id, "Reset transaction");
    }

    fn on_error(&self, error: StoreError) -> StoreFuture<Arc<dyn Transaction>> {
        let st = self.state.lock();
        if st.cancelled {
            return ready(Err(StoreError::new(code::TRANSACTION_CANCELLED))).boxed();
        }
        if !error.is_retryable() {
            return ready(Err(error)).boxed();
        }
        let retry_limit = st
            .options
            .retry_limit
            .or(self.shared.config.default_retry_limit);
        if retry_limit.map_or(false, |limit| st.retries >= limit) {
            debug!(txn = self.id, retries = st.retries, "Retry limit reached");
            return ready(Err(error)).boxed();
        }

        let max_delay = st
            .options
            .max_retry_delay_ms
            .unwrap_or(self.shared.config.max_retry_delay_ms);
        let delay = st.backoff_ms.min(max_delay);

        let next = MemoryTransaction::new(Arc::clone(&self.shared));
        {
            let mut next_st = next.state.lock();
            next_st.options = st.options.retained();
            next_st.retries = st.retries + 1;
            next_st.backoff_ms = st.backoff_ms.saturating_mul(2).min(max_delay);
            next_st.started = st.started;
        }
        debug!(
            txn = self.id,
            next = next.id,
            code = error.code(),
            delay_ms = delay,
            "Retrying after error"
        );
        drop(st);

        async move {
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(Arc::new(next) as Arc<dyn Transaction>)
        }
        .boxed()
    }

    fn get_read_version(&self) -> StoreFuture<i64> {
        let result = {
            let mut st = self.state.lock();
            st.check_usable()
                .and_then(|()| self.read_version(&mut st))
                .map(|v| v as i64)
        };
        ready(result).boxed()
    }

    fn set_read_version(&self, version: i64) {
        self.state.lock().read_version = Some(version.max(0) as u64);
    }

    fn get_committed_version(&self) -> StoreResult<i64> {
        Ok(self.state.lock().committed_version)
    }

    fn get_versionstamp(&self) -> StoreFuture<Vec<u8>> {
        let mut st = self.state.lock();
        if let Some(stamp) = &st.stamp {
            return ready(Ok(stamp.clone())).boxed();
        }
        if st.cancelled {
            return ready(Err(StoreError::new(code::TRANSACTION_CANCELLED))).boxed();
        }
        let (tx, rx) = oneshot::channel();
        st.stamp_waiters.push(tx);
        async move {
            match rx.await {
                Ok(result) => result,
                Err(oneshot::Canceled) => Err(StoreError::new(code::TRANSACTION_CANCELLED)),
            }
        }
        .boxed()
    }

    fn set_option(&self, option: TransactionOption) -> StoreResult<()> {
        let mut st = self.state.lock();
        match option {
            TransactionOption::ReadYourWritesDisable => st.options.read_your_writes_disable = true,
            TransactionOption::ReadSystemKeys => st.options.read_system_keys = true,
            TransactionOption::AccessSystemKeys => st.options.access_system_keys = true,
            TransactionOption::NextWriteNoWriteConflictRange => st.next_write_no_conflict = true,
            TransactionOption::Timeout(ms) => {
                if ms < 0 {
                    return Err(StoreError::new(code::INVALID_OPTION_VALUE));
                }
                st.options.timeout = (ms > 0).then(|| Duration::from_millis(ms as u64));
            }
            TransactionOption::RetryLimit(n) => {
                st.options.retry_limit = (n >= 0).then(|| n.min(u32::MAX as i64) as u32);
            }
            TransactionOption::MaxRetryDelay(ms) => {
                if ms < 0 {
                    return Err(StoreError::new(code::INVALID_OPTION_VALUE));
                }
                st.options.max_retry_delay_ms = Some(ms as u64);
            }
            TransactionOption::TransactionLoggingEnable(id) => {
                debug!(txn = self.id, log_id = %id, "Transaction logging enabled");
                st.options.log_id = Some(id);
            }
            other => trace!(txn = self.id, option = ?other, "Accepted transaction option"),
        }
        Ok(())
    }
}
