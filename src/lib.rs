//! Stacktester - a stack-machine conformance driver for transactional
//! key-value store clients
//!
//! A test generator writes encoded instructions into the store; the tester
//! executes them against an operand stack with real transactions and writes
//! its results back for a verifier to compare across clients.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use stacktester::{DatabaseConfig, Executor, MemoryDatabase, TesterConfig};
//!
//! let db = Arc::new(MemoryDatabase::new(DatabaseConfig::default()));
//! let executor = Executor::new(db, TesterConfig::default());
//! let summary = executor.run(b"test_spec".to_vec()).await;
//! assert!(summary.is_success());
//! ```
//!
//! # Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `stacktester-core` | Tuple codec, elements, error codes, the store client contract |
//! | `stacktester-storage` | Multi-version keyspace and snapshot files |
//! | `stacktester-concurrency` | In-memory reference store with optimistic transactions |
//! | `stacktester-executor` | The instruction interpreter |

pub use stacktester_concurrency::{DatabaseConfig, MemoryDatabase};
pub use stacktester_core::{tuple, Database, Element, StoreError, Transaction};
pub use stacktester_executor::*;
