//! The in-memory database handle
//!
//! Provides the commit protocol shared by every transaction:
//! 1. Validation (first-committer-wins on read ranges)
//! 2. Versionstamp assignment
//! 3. Storage application (visibility)
//! 4. Conflict history bookkeeping and periodic pruning
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. lock conflict history (serializes commits)
//! 2. validate read ranges against later commits
//! 3. stamp = next commit version, batch 0
//! 4. resolve buffered writes into a batch, evaluating atomic ops on latest values
//! 5. apply batch to the versioned store
//! 6. record write ranges at the commit version
//! 7. every gc_interval commits, prune history older than the version window
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stacktester_core::{
    code, Database, DatabaseOption, Limits, StoreError, StoreResult, Transaction,
};
use stacktester_storage::VersionedStore;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::conflict::{ConflictHistory, ConflictRange};
use crate::transaction::MemoryTransaction;
use crate::write_buffer::WriteBuffer;

/// Versionstamp of the first (and only) batch committed at `version`
pub fn versionstamp(version: u64) -> [u8; 10] {
    let mut stamp = [0u8; 10];
    stamp[..8].copy_from_slice(&version.to_be_bytes());
    stamp
}

/// State shared by a database and its transactions
pub(crate) struct Shared {
    pub(crate) store: VersionedStore,
    /// Held for the whole commit sequence
    history: Mutex<ConflictHistory>,
    pub(crate) config: DatabaseConfig,
    pub(crate) limits: Limits,
    options: Mutex<Vec<DatabaseOption>>,
    next_txn_id: AtomicU64,
    commits: AtomicU64,
}

impl Shared {
    pub(crate) fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Run the commit sequence and return the commit version.
    ///
    /// # Errors
    ///
    /// - `NOT_COMMITTED` on a read-write conflict
    /// - `TRANSACTION_TOO_OLD` if `read_version` left the retained window
    pub(crate) fn commit(
        &self,
        read_version: u64,
        reads: &[ConflictRange],
        writes: Vec<ConflictRange>,
        buffer: WriteBuffer,
    ) -> StoreResult<u64> {
        let mut history = self.history.lock();
        history.validate(read_version, reads)?;

        let stamp = versionstamp(self.store.version() + 1);
        let ops = buffer.into_write_ops(
            |key| self.store.get(key, u64::MAX),
            &stamp,
            self.limits.max_value_bytes,
        )?;
        let version = self.store.apply(&ops);
        history.record(version, writes);

        let commits = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.gc_interval > 0 && commits % self.config.gc_interval == 0 {
            let min_version = version.saturating_sub(self.config.version_window);
            history.prune(min_version);
            self.store.gc(min_version);
        }

        debug!(version, ops = ops.len(), "Committed");
        Ok(version)
    }
}

/// Reference implementation of the store contract, held entirely in memory
///
/// Cloning yields another handle to the same keyspace.
#[derive(Clone)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new(config: DatabaseConfig) -> Self {
        let limits = config.limits();
        info!(
            version_window = config.version_window,
            gc_interval = config.gc_interval,
            "Opened in-memory database"
        );
        MemoryDatabase {
            shared: Arc::new(Shared {
                store: VersionedStore::new(),
                history: Mutex::new(ConflictHistory::new()),
                config,
                limits,
                options: Mutex::new(Vec::new()),
                next_txn_id: AtomicU64::new(0),
                commits: AtomicU64::new(0),
            }),
        }
    }

    /// The underlying keyspace, for snapshot save and load
    pub fn store(&self) -> &VersionedStore {
        &self.shared.store
    }

    /// Configuration the database was opened with
    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }

    /// Database options set so far, in order
    pub fn options(&self) -> Vec<DatabaseOption> {
        self.shared.options.lock().clone()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}

impl Database for MemoryDatabase {
    fn create_transaction(&self) -> StoreResult<Arc<dyn Transaction>> {
        Ok(Arc::new(MemoryTransaction::new(Arc::clone(&self.shared))))
    }

    fn set_option(&self, option: DatabaseOption) -> StoreResult<()> {
        match &option {
            DatabaseOption::LocationCacheSize(n) | DatabaseOption::MaxWatches(n) if *n < 0 => {
                return Err(StoreError::new(code::INVALID_OPTION_VALUE));
            }
            _ => {}
        }
        debug!(?option, "Set database option");
        self.shared.options.lock().push(option);
        Ok(())
    }
}
