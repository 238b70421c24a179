//! Error types for instruction execution.
//!
//! All errors raised while interpreting an instruction stream are represented
//! by the [`Error`] enum. They fall into two groups:
//! - **Store faults**: `Error::Store`, reported by the store under test. These
//!   are recoverable: the interpreter records them on the stack as error
//!   markers for the verifier to compare.
//! - **Protocol faults**: every other variant. They mean the instruction
//!   stream is malformed or the interpreter has a bug, and they end the
//!   context that raised them.

use stacktester_core::{StoreError, TupleError};

/// Instruction execution errors.
///
/// # Categories
///
/// | Category | Variants | Handling |
/// |----------|----------|----------|
/// | Store | `Store` | Pushed as an error marker |
/// | Stack | `EmptyStack`, `StackIndex` | Fatal to the context |
/// | Stream | `UnknownOperation`, `InvalidInstruction`, `InvalidParameter` | Fatal to the context |
/// | State | `MissingReadVersion` | Fatal to the context |
/// | Codec | `Tuple` | Fatal to the context |
/// | Collaborators | `Directory`, `UnitTests`, `TaskFailed` | Fatal to the context |
///
/// # Example
///
/// ```ignore
/// match executor.execute(&mut ctx, &instruction).await {
///     Ok(()) => {}
///     Err(e) if e.store_error().is_some() => unreachable!("recorded on the stack"),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    // ==================== Store ====================
    /// Fault reported by the store
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    // ==================== Stack ====================
    /// Pop from a stack holding too few entries
    #[error("stack holds {len} entries, {requested} requested")]
    EmptyStack { requested: usize, len: usize },

    /// Swap depth outside the stack
    #[error("stack index {index} out of range for a stack of {len} entries")]
    StackIndex { index: usize, len: usize },

    // ==================== Stream ====================
    /// Opcode the interpreter does not implement
    #[error("unrecognized (or unimplemented) operation: {name}")]
    UnknownOperation { name: String },

    /// Instruction value that does not decode to an instruction
    #[error("invalid instruction: {reason}")]
    InvalidInstruction { reason: String },

    /// Operand of the wrong type or out of range
    #[error("invalid parameter for {operation}: {reason}")]
    InvalidParameter {
        operation: &'static str,
        reason: String,
    },

    // ==================== State ====================
    /// SET_READ_VERSION before any version was read
    #[error("read version has not been read")]
    MissingReadVersion,

    // ==================== Codec ====================
    /// Tuple encoding or decoding failed
    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),

    // ==================== Collaborators ====================
    /// Directory extension failure
    #[error("directory extension: {reason}")]
    Directory { reason: String },

    /// UNIT_TESTS found the client misbehaving
    #[error("unit tests failed: {reason}")]
    UnitTests { reason: String },

    /// A spawned task panicked or was aborted
    #[error("task failed: {reason}")]
    TaskFailed { reason: String },
}

impl Error {
    /// The store fault carried by this error, if it is one.
    ///
    /// This is the single point where the interpreter decides whether an
    /// error is recorded on the stack or ends the context.
    pub fn store_error(&self) -> Option<StoreError> {
        match self {
            Error::Store(e) => Some(*e),
            _ => None,
        }
    }

    pub(crate) fn parameter(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            operation,
            reason: reason.into(),
        }
    }
}
