//! # Stacktester Executor
//!
//! The stack-machine interpreter of the conformance tester. It reads encoded
//! instructions from the store under a prefix, executes them against an
//! operand stack with real transactions, and leaves results in the store for
//! an external verifier to compare across clients.
//!
//! ## Quick Start
//!
//! ```text
//! use stacktester_executor::{Executor, TesterConfig};
//!
//! let executor = Executor::new(db, TesterConfig::default());
//! let summary = executor.run(b"test_spec".to_vec()).await;
//! ```
//!
//! ## Layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `operation` | Opcodes, targets and instruction decoding |
//! | `stack` | Operand stack with origin indices |
//! | `pending` | Results in flight and their flattening into elements |
//! | `context` | Per-thread stack and transaction bindings |
//! | `executor` | Instruction dispatch and error-marker translation |
//! | `driver` | Reading a context's instruction stream |
//! | `group` | Tracking every spawned context of a run |
//! | `directory` | Extension point for `DIRECTORY_` instructions |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod directory;
mod driver;
mod error;
mod executor;
pub mod group;
mod handlers;
pub mod operation;
pub mod pending;
pub mod stack;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use config::{ConfigError, TesterConfig, MAX_API_VERSION};
pub use context::{Context, TransactionCell};
pub use directory::{DirectoryExtension, UnavailableDirectory};
pub use driver::run_context;
pub use error::Error;
pub use executor::Executor;
pub use group::{ContextFailure, RunSummary, TaskGroup};
pub use operation::{Instruction, InstructionKind, Operation, Target, DIRECTORY_PREFIX};
pub use pending::{error_marker, marker, PendingResult};
pub use stack::{Stack, StackEntry, StackValue};

/// Result type for instruction execution
pub type Result<T> = std::result::Result<T, Error>;
