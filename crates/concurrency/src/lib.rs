//! In-memory reference store
//!
//! This crate implements the store contract with optimistic concurrency
//! control (OCC):
//! - MemoryDatabase: shared keyspace and the commit protocol
//! - MemoryTransaction: read version, write buffer, conflict ranges
//! - WriteBuffer: read-your-writes over buffered sets, clears and atomic ops
//! - ConflictHistory: first-committer-wins validation of read ranges
//! - atomic: little-endian arithmetic for atomic mutations
//!
//! It backs the command-line tester and the interpreter's tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod config;
pub mod conflict;
pub mod database;
pub mod transaction;
pub mod write_buffer;

pub use config::DatabaseConfig;
pub use conflict::{ConflictHistory, ConflictRange};
pub use database::{versionstamp, MemoryDatabase};
pub use transaction::MemoryTransaction;
pub use write_buffer::WriteBuffer;
