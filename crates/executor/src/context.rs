//! Execution contexts.
//!
//! A [`Context`] is one "thread" of the instruction stream: it owns an
//! operand stack, a set of named transaction bindings, the last version it
//! read and a random source. The root context and every context spawned by
//! START_THREAD are independent; they never share a stack or a transaction.
//!
//! ## Bindings
//!
//! Each binding is a [`TransactionCell`]. A cell is never mutated through a
//! raw read-then-write: it is either replaced unconditionally (NEW_TRANSACTION,
//! RESET) or compare-and-swapped (ON_ERROR completing late). The old
//! transaction is dropped, not cancelled, so operations still in flight
//! against it resolve normally.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

use stacktester_core::{printable, same_transaction, Database, Element, StoreResult, Transaction};

use crate::pending::PendingResult;
use crate::stack::{Stack, StackEntry};
use crate::{Result, TesterConfig};

// ============================================================================
// Transaction cells
// ============================================================================

/// The transaction currently bound to one binding name.
pub struct TransactionCell {
    current: Mutex<Arc<dyn Transaction>>,
}

impl TransactionCell {
    /// Bind `tr`.
    pub fn new(tr: Arc<dyn Transaction>) -> Self {
        TransactionCell {
            current: Mutex::new(tr),
        }
    }

    /// The bound transaction.
    pub fn load(&self) -> Arc<dyn Transaction> {
        Arc::clone(&self.current.lock())
    }

    /// Bind `tr` unconditionally.
    pub fn replace(&self, tr: Arc<dyn Transaction>) {
        *self.current.lock() = tr;
    }

    /// Bind `new` only if `old` is still bound.
    ///
    /// # Returns
    /// Whether the swap happened.
    pub fn update_current(&self, old: &Arc<dyn Transaction>, new: Arc<dyn Transaction>) -> bool {
        let mut current = self.current.lock();
        if same_transaction(&current, old) {
            *current = new;
            true
        } else {
            false
        }
    }

    /// Bind a fresh transaction only if `old` is still bound.
    ///
    /// Used after a failed retry, so that a transaction some other
    /// instruction already replaced is left alone.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot create a transaction.
    pub fn renew(&self, db: &dyn Database, old: &Arc<dyn Transaction>) -> StoreResult<bool> {
        let mut current = self.current.lock();
        if !same_transaction(&current, old) {
            return Ok(false);
        }
        *current = db.create_transaction()?;
        Ok(true)
    }
}

// ============================================================================
// Context
// ============================================================================

/// One independent thread of instruction execution.
pub struct Context {
    db: Arc<dyn Database>,
    config: Arc<TesterConfig>,
    prefix: Vec<u8>,
    binding: Vec<u8>,
    current: Arc<TransactionCell>,
    transactions: HashMap<Vec<u8>, Arc<TransactionCell>>,
    stack: Stack,
    last_version: Option<i64>,
    instruction_index: usize,
    rng: StdRng,
}

impl Context {
    /// Create a context reading instructions under `prefix`.
    ///
    /// The default binding is named after the prefix and starts with a
    /// fresh transaction.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot create a transaction.
    pub fn new(db: Arc<dyn Database>, config: Arc<TesterConfig>, prefix: Vec<u8>) -> Result<Self> {
        let binding = printable(&prefix).into_bytes();
        let current = Arc::new(TransactionCell::new(db.create_transaction()?));
        let mut transactions = HashMap::new();
        transactions.insert(binding.clone(), Arc::clone(&current));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(context_seed(seed, &prefix)),
            None => StdRng::from_entropy(),
        };

        Ok(Context {
            db,
            config,
            prefix,
            binding,
            current,
            transactions,
            stack: Stack::new(),
            last_version: None,
            instruction_index: 0,
            rng,
        })
    }

    /// Instruction prefix of this context
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Name of the current binding
    pub fn binding(&self) -> &[u8] {
        &self.binding
    }

    /// The store handle
    pub fn database(&self) -> Arc<dyn Database> {
        Arc::clone(&self.db)
    }

    /// Interpreter settings
    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// The operand stack
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// The operand stack, mutably
    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Index of the instruction being executed
    pub fn instruction_index(&self) -> usize {
        self.instruction_index
    }

    /// Move on to the next instruction.
    pub(crate) fn advance(&mut self) {
        self.instruction_index += 1;
    }

    /// Last version read by GET_READ_VERSION or GET_COMMITTED_VERSION
    pub fn last_version(&self) -> Option<i64> {
        self.last_version
    }

    pub(crate) fn set_last_version(&mut self, version: i64) {
        self.last_version = Some(version);
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// The transaction bound to the current binding.
    pub fn transaction(&self) -> Arc<dyn Transaction> {
        self.current.load()
    }

    /// The cell of the current binding.
    pub(crate) fn cell(&self) -> Arc<TransactionCell> {
        Arc::clone(&self.current)
    }

    /// Bind a fresh transaction to the current binding.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot create a transaction.
    pub fn new_transaction(&mut self) -> Result<()> {
        self.current.replace(self.db.create_transaction()?);
        Ok(())
    }

    /// Make `name` the current binding, creating it with a fresh
    /// transaction if it has not been used before.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot create a transaction.
    pub fn switch_transaction(&mut self, name: Vec<u8>) -> Result<()> {
        let cell = match self.transactions.get(&name) {
            Some(cell) => Arc::clone(cell),
            None => {
                let cell = Arc::new(TransactionCell::new(self.db.create_transaction()?));
                self.transactions.insert(name.clone(), Arc::clone(&cell));
                cell
            }
        };
        self.binding = name;
        self.current = cell;
        Ok(())
    }

    // ========================================================================
    // Stack access
    // ========================================================================

    /// Push a ready element produced by the current instruction.
    pub fn push(&mut self, element: impl Into<Element>) {
        let index = self.instruction_index;
        self.stack.push(StackEntry::ready(index, element.into()));
    }

    /// Push an operation in flight produced by the current instruction.
    pub fn push_pending(&mut self, pending: PendingResult) {
        let index = self.instruction_index;
        self.stack.push(StackEntry::pending(index, pending));
    }

    /// Pop `count` parameters and resolve them, oldest first.
    ///
    /// Parameters are therefore named in the order they were pushed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyStack`] for a short stack and faults that
    /// are not store faults from resolution.
    pub async fn pop_params(&mut self, count: usize) -> Result<Vec<Element>> {
        let entries = self.stack.pop_n(count)?;
        let mut params = Vec::with_capacity(count);
        for entry in entries {
            params.push(entry.value.resolve().await?);
        }
        Ok(params)
    }

    /// Pop one parameter and resolve it.
    pub async fn pop_param(&mut self) -> Result<Element> {
        let entry = self.stack.pop()?;
        entry.value.resolve().await
    }
}

/// Derive a per-context seed so sibling contexts draw different sequences.
fn context_seed(seed: u64, prefix: &[u8]) -> u64 {
    prefix
        .iter()
        .fold(seed, |acc, &b| acc.rotate_left(8) ^ u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacktester_concurrency::{DatabaseConfig, MemoryDatabase};

    fn context() -> Context {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new(DatabaseConfig::for_testing()));
        Context::new(db, Arc::new(TesterConfig::default()), b"test".to_vec()).unwrap()
    }

    #[test]
    fn test_default_binding_is_printable_prefix() {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new(DatabaseConfig::for_testing()));
        let ctx = Context::new(db, Arc::new(TesterConfig::default()), vec![b'p', 0xff]).unwrap();
        assert_eq!(ctx.binding(), b"p\\xff");
    }

    #[test]
    fn test_new_transaction_replaces_binding() {
        let mut ctx = context();
        let before = ctx.transaction();
        ctx.new_transaction().unwrap();
        assert!(!same_transaction(&before, &ctx.transaction()));
    }

    #[test]
    fn test_switch_transaction_keeps_bindings_apart() {
        let mut ctx = context();
        let default_tr = ctx.transaction();

        ctx.switch_transaction(b"other".to_vec()).unwrap();
        let other_tr = ctx.transaction();
        assert!(!same_transaction(&default_tr, &other_tr));

        ctx.switch_transaction(b"test".to_vec()).unwrap();
        assert!(same_transaction(&default_tr, &ctx.transaction()));

        ctx.switch_transaction(b"other".to_vec()).unwrap();
        assert!(same_transaction(&other_tr, &ctx.transaction()));
    }

    #[test]
    fn test_update_current_is_compare_and_swap() {
        let ctx = context();
        let db = ctx.database();
        let cell = ctx.cell();
        let old = cell.load();
        let first = db.create_transaction().unwrap();
        let second = db.create_transaction().unwrap();

        assert!(cell.update_current(&old, Arc::clone(&first)));
        assert!(!cell.update_current(&old, Arc::clone(&second)));
        assert!(same_transaction(&cell.load(), &first));
    }

    #[test]
    fn test_renew_only_replaces_the_expected_transaction() {
        let ctx = context();
        let db = ctx.database();
        let cell = ctx.cell();
        let stale = db.create_transaction().unwrap();
        let bound = cell.load();

        assert!(!cell.renew(db.as_ref(), &stale).unwrap());
        assert!(same_transaction(&cell.load(), &bound));

        assert!(cell.renew(db.as_ref(), &bound).unwrap());
        assert!(!same_transaction(&cell.load(), &bound));
    }

    #[tokio::test]
    async fn test_pop_params_resolves_in_push_order() {
        let mut ctx = context();
        ctx.push(Element::from("key"));
        ctx.push_pending(PendingResult::ready(Ok(None)));
        let params = ctx.pop_params(2).await.unwrap();
        assert_eq!(
            params,
            vec![
                Element::from("key"),
                Element::bytes(b"RESULT_NOT_PRESENT".to_vec())
            ]
        );
    }

    #[test]
    fn test_context_seed_depends_on_prefix() {
        assert_ne!(context_seed(1, b"a"), context_seed(1, b"b"));
        assert_eq!(context_seed(1, b"a"), context_seed(1, b"a"));
    }
}
