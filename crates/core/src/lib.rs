//! Core types and traits for the stack tester
//!
//! This crate defines the foundational pieces shared by the store and the
//! interpreter:
//! - Element: typed tuple elements with the codec's total order
//! - tuple: the ordered, self-describing tuple codec
//! - key: strinc, prefix ranges and printable keys
//! - Error: store error codes and tuple codec errors
//! - Traits: the Database/Transaction client contract
//! - Types: key selectors, range pages, streaming modes, options
//! - Limits: key, value and transaction size limits
//! - retry / range: retry loops and whole-range reads over the contract

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
pub mod error;
pub mod key;
pub mod limits;
pub mod options;
pub mod range;
pub mod retry;
pub mod traits;
pub mod tuple;
pub mod types;

pub use element::{Element, Versionstamp};
pub use error::{code, StoreError, StoreResult, TupleError};
pub use key::{key_after, prefix_range, printable, strinc, KeyError};
pub use limits::Limits;
pub use options::{DatabaseOption, MutationType, TransactionOption, UnknownMutationType};
pub use range::read_range;
pub use traits::{same_transaction, Database, StoreFuture, Transaction};
pub use types::{ConflictRangeType, KeySelector, KeyValue, RangeOptions, RangePage, StreamingMode};
