//! Conformance Test Suite
//!
//! End-to-end runs of generated instruction streams: programs are written
//! into an in-memory store under their prefix, the executor runs them from
//! the root prefix, and the assertions read back what the run left in the
//! keyspace, the way a cross-client verifier would.
//!
//! ## Test Modules
//!
//! - `retry_loops`: conflicting transactions and the ON_ERROR protocol
//! - `threads`: START_THREAD fan-out with per-context logs
//! - `ranges`: tuple-keyed data read back through range instructions
//!
//! ## Running Tests
//!
//! ```bash
//! # All conformance tests
//! cargo test --test conformance
//!
//! # One module
//! cargo test --test conformance retry_loops
//! ```

mod ranges;
mod retry_loops;
mod threads;

use std::sync::Arc;

use num_bigint::BigInt;
use stacktester::{
    tuple, Database, DatabaseConfig, Element, Executor, MemoryDatabase, RunSummary, TesterConfig,
};

// =============================================================================
// Helpers
// =============================================================================

pub fn bytes(value: &[u8]) -> Element {
    Element::bytes(value.to_vec())
}

pub fn op(name: &str) -> Vec<Element> {
    vec![Element::from(name)]
}

pub fn push(value: impl Into<Element>) -> Vec<Element> {
    vec![Element::from("PUSH"), value.into()]
}

/// A fresh store with zero backoff.
pub fn database() -> Arc<dyn Database> {
    Arc::new(MemoryDatabase::new(DatabaseConfig::for_testing()))
}

/// Write `program` under `prefix`, one packed instruction per index.
pub async fn load_program(db: &Arc<dyn Database>, prefix: &[u8], program: &[Vec<Element>]) {
    let tr = db.create_transaction().unwrap();
    for (i, tokens) in program.iter().enumerate() {
        let key = tuple::pack(&[bytes(prefix), Element::from(i as i64)]).unwrap();
        tr.set(&key, &tuple::pack(tokens).unwrap()).unwrap();
    }
    tr.commit().await.unwrap();
}

/// Run from `root` with a seeded configuration.
pub async fn run(db: &Arc<dyn Database>, root: &[u8]) -> RunSummary {
    let config = TesterConfig {
        seed: Some(11),
        ..TesterConfig::default()
    };
    Executor::new(Arc::clone(db), config)
        .run(root.to_vec())
        .await
}

pub async fn read_key(db: &Arc<dyn Database>, key: &[u8]) -> Option<Vec<u8>> {
    let tr = db.create_transaction().unwrap();
    tr.get(key, false).await.unwrap()
}

/// The LOG_STACK record for stack `position` holding the result of
/// instruction `index`, decoded.
pub async fn logged(
    db: &Arc<dyn Database>,
    log_prefix: &[u8],
    position: usize,
    index: usize,
) -> Option<Element> {
    let key = tuple::pack_with_prefix(
        log_prefix,
        &[
            Element::Int(BigInt::from(position)),
            Element::Int(BigInt::from(index)),
        ],
    )
    .unwrap();
    let value = read_key(db, &key).await?;
    let mut items = tuple::unpack(&value).unwrap();
    assert_eq!(items.len(), 1);
    items.pop()
}

pub fn not_present() -> Element {
    bytes(b"RESULT_NOT_PRESENT")
}
