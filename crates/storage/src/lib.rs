//! Storage layer for the in-memory store
//!
//! This crate implements the multi-version keyspace behind the reference
//! store:
//! - VersionedStore: BTreeMap of version chains behind a RwLock
//! - VersionChain: per-key history, newest first, with tombstones
//! - Version management with AtomicU64
//! - Snapshot files for seeding and inspecting a keyspace

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod snapshot;
pub mod stored_value;
pub mod versioned;

pub use snapshot::SnapshotError;
pub use stored_value::StoredValue;
pub use versioned::{VersionChain, VersionedStore, WriteOp};
