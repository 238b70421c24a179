//! Test modules for the executor crate.

pub mod tuples;

use std::sync::Arc;

use stacktester_concurrency::{DatabaseConfig, MemoryDatabase};
use stacktester_core::{tuple, Database, Element};

use crate::{Context, Executor, Instruction, Result, TesterConfig};

// =============================================================================
// Test Helpers
// =============================================================================

/// Configuration with a fixed seed.
pub(crate) fn test_config() -> TesterConfig {
    TesterConfig {
        seed: Some(7),
        ..TesterConfig::default()
    }
}

pub(crate) fn bytes(value: &[u8]) -> Element {
    Element::bytes(value.to_vec())
}

pub(crate) fn op(name: &str) -> Vec<Element> {
    vec![Element::from(name)]
}

pub(crate) fn push(value: impl Into<Element>) -> Vec<Element> {
    vec![Element::from("PUSH"), value.into()]
}

/// Write `program` as the instruction stream of `prefix`.
pub(crate) async fn load_program(db: &Arc<dyn Database>, prefix: &[u8], program: &[Vec<Element>]) {
    let tr = db.create_transaction().unwrap();
    for (i, tokens) in program.iter().enumerate() {
        let key = tuple::pack(&[bytes(prefix), Element::from(i as i64)]).unwrap();
        tr.set(&key, &tuple::pack(tokens).unwrap()).unwrap();
    }
    tr.commit().await.unwrap();
}

pub(crate) async fn read_key(db: &Arc<dyn Database>, key: &[u8]) -> Option<Vec<u8>> {
    let tr = db.create_transaction().unwrap();
    tr.get(key, false).await.unwrap()
}

/// An executor and one context driven instruction by instruction.
pub(crate) struct Harness {
    pub memory: Arc<MemoryDatabase>,
    pub db: Arc<dyn Database>,
    pub executor: Arc<Executor>,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: TesterConfig) -> Self {
        Self::build(config, DatabaseConfig::for_testing())
    }

    /// A harness over a store with its own retry settings.
    pub fn with_store(store: DatabaseConfig) -> Self {
        Self::build(test_config(), store)
    }

    fn build(config: TesterConfig, store: DatabaseConfig) -> Self {
        let memory = Arc::new(MemoryDatabase::new(store));
        let db: Arc<dyn Database> = memory.clone();
        let executor = Executor::new(Arc::clone(&db), config);
        let ctx = Context::new(Arc::clone(&db), executor.config(), b"test".to_vec()).unwrap();
        Harness {
            memory,
            db,
            executor,
            ctx,
        }
    }

    /// Execute `program`, stopping at the first fatal fault.
    pub async fn run(&mut self, program: Vec<Vec<Element>>) -> Result<()> {
        for tokens in program {
            let instruction = Instruction::from_tokens(tokens)?;
            self.executor.execute(&mut self.ctx, &instruction).await?;
            self.ctx.advance();
        }
        Ok(())
    }

    /// Every stack entry resolved, bottom first.
    pub async fn resolved(&self) -> Vec<Element> {
        let mut out = Vec::new();
        for entry in self.ctx.stack().entries() {
            out.push(entry.value.resolve().await.unwrap());
        }
        out
    }

    pub async fn seed(&self, entries: &[(&[u8], &[u8])]) {
        let tr = self.db.create_transaction().unwrap();
        for (k, v) in entries {
            tr.set(k, v).unwrap();
        }
        tr.commit().await.unwrap();
    }
}
