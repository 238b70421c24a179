//! The instruction set.
//!
//! Every instruction is stored as a packed tuple whose first element is the
//! opcode name and whose optional second element is an immediate operand.
//! Opcodes are:
//! - **Closed**: each one is a variant of [`Operation`], so the dispatch
//!   table in the executor is checked for exhaustiveness
//! - **Targeted**: a `_DATABASE` or `_SNAPSHOT` suffix selects what the
//!   operation runs against, see [`Target`]
//! - **Routed**: names starting with `DIRECTORY_` belong to the directory
//!   extension and are handed over untouched

use stacktester_core::{tuple, Element};

use crate::{Error, Result};

/// Name prefix of instructions handled by the directory extension.
pub const DIRECTORY_PREFIX: &str = "DIRECTORY_";

const DATABASE_SUFFIX: &str = "_DATABASE";
const SNAPSHOT_SUFFIX: &str = "_SNAPSHOT";

/// An opcode of the stack machine.
///
/// # Operation Groups
///
/// | Group | Count | Description |
/// |-------|-------|-------------|
/// | Stack | 8 | Operand stack manipulation and arithmetic |
/// | Threads | 2 | Spawning contexts and waiting on a key prefix |
/// | Transactions | 10 | Transaction lifecycle and versions |
/// | Reads | 5 | Point, key selector and range reads |
/// | Mutations | 5 | Writes, clears and atomic operations |
/// | Conflicts | 5 | Manual conflict ranges |
/// | Tuples | 9 | Tuple codec and float encodings |
/// | Misc | 2 | Client self-checks and stack logging |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // ==================== Stack (8) ====================
    /// Push the immediate operand
    Push,
    /// Discard the top entry
    Pop,
    /// Duplicate the top entry
    Dup,
    /// Discard every entry
    EmptyStack,
    /// Exchange the top entry with the entry `depth` below it
    Swap,
    /// Resolve the top entry in place
    WaitFuture,
    /// Integer subtraction
    Sub,
    /// Byte or string concatenation
    Concat,

    // ==================== Threads (2) ====================
    /// Spawn a context reading instructions under a prefix
    StartThread,
    /// Wait until no key starts with a prefix
    WaitEmpty,

    // ==================== Transactions (10) ====================
    /// Bind a fresh transaction
    NewTransaction,
    /// Switch to a named binding
    UseTransaction,
    /// Commit the bound transaction
    Commit,
    /// Bind a fresh transaction in place of the current one
    Reset,
    /// Cancel the bound transaction
    Cancel,
    /// Run the retry protocol for an error code
    OnError,
    /// Read and remember the read version
    GetReadVersion,
    /// Pin the remembered read version
    SetReadVersion,
    /// Read and remember the committed version
    GetCommittedVersion,
    /// Push the pending versionstamp
    GetVersionstamp,

    // ==================== Reads (5) ====================
    /// Point read
    Get,
    /// Resolve a key selector, clamped to a prefix
    GetKey,
    /// Range read between two keys
    GetRange,
    /// Range read over every key with a prefix
    GetRangeStartsWith,
    /// Range read between two key selectors, filtered to a prefix
    GetRangeSelector,

    // ==================== Mutations (5) ====================
    /// Write a key
    Set,
    /// Clear a key
    Clear,
    /// Clear a key range
    ClearRange,
    /// Clear every key with a prefix
    ClearRangeStartsWith,
    /// Apply an atomic mutation
    AtomicOp,

    // ==================== Conflicts (5) ====================
    /// Add a read conflict range
    ReadConflictRange,
    /// Add a write conflict range
    WriteConflictRange,
    /// Add a read conflict on one key
    ReadConflictKey,
    /// Add a write conflict on one key
    WriteConflictKey,
    /// Skip the write conflict of the next write
    DisableWriteConflict,

    // ==================== Tuples (9) ====================
    /// Pack stack entries into a tuple
    TuplePack,
    /// Pack stack entries around an incomplete versionstamp
    TuplePackWithVersionstamp,
    /// Unpack a tuple into one-element tuples
    TupleUnpack,
    /// Push the key range of a tuple
    TupleRange,
    /// Sort packed tuples
    TupleSort,
    /// Four big-endian bytes to a float
    EncodeFloat,
    /// Eight big-endian bytes to a double
    EncodeDouble,
    /// A float to four big-endian bytes
    DecodeFloat,
    /// A double to eight big-endian bytes
    DecodeDouble,

    // ==================== Misc (2) ====================
    /// Exercise every client option and the retry predicate
    UnitTests,
    /// Write the whole stack to the store
    LogStack,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 46] = [
        Operation::Push,
        Operation::Pop,
        Operation::Dup,
        Operation::EmptyStack,
        Operation::Swap,
        Operation::WaitFuture,
        Operation::Sub,
        Operation::Concat,
        Operation::StartThread,
        Operation::WaitEmpty,
        Operation::NewTransaction,
        Operation::UseTransaction,
        Operation::Commit,
        Operation::Reset,
        Operation::Cancel,
        Operation::OnError,
        Operation::GetReadVersion,
        Operation::SetReadVersion,
        Operation::GetCommittedVersion,
        Operation::GetVersionstamp,
        Operation::Get,
        Operation::GetKey,
        Operation::GetRange,
        Operation::GetRangeStartsWith,
        Operation::GetRangeSelector,
        Operation::Set,
        Operation::Clear,
        Operation::ClearRange,
        Operation::ClearRangeStartsWith,
        Operation::AtomicOp,
        Operation::ReadConflictRange,
        Operation::WriteConflictRange,
        Operation::ReadConflictKey,
        Operation::WriteConflictKey,
        Operation::DisableWriteConflict,
        Operation::TuplePack,
        Operation::TuplePackWithVersionstamp,
        Operation::TupleUnpack,
        Operation::TupleRange,
        Operation::TupleSort,
        Operation::EncodeFloat,
        Operation::EncodeDouble,
        Operation::DecodeFloat,
        Operation::DecodeDouble,
        Operation::UnitTests,
        Operation::LogStack,
    ];

    /// Canonical opcode name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Push => "PUSH",
            Operation::Pop => "POP",
            Operation::Dup => "DUP",
            Operation::EmptyStack => "EMPTY_STACK",
            Operation::Swap => "SWAP",
            Operation::WaitFuture => "WAIT_FUTURE",
            Operation::Sub => "SUB",
            Operation::Concat => "CONCAT",
            Operation::StartThread => "START_THREAD",
            Operation::WaitEmpty => "WAIT_EMPTY",
            Operation::NewTransaction => "NEW_TRANSACTION",
            Operation::UseTransaction => "USE_TRANSACTION",
            Operation::Commit => "COMMIT",
            Operation::Reset => "RESET",
            Operation::Cancel => "CANCEL",
            Operation::OnError => "ON_ERROR",
            Operation::GetReadVersion => "GET_READ_VERSION",
            Operation::SetReadVersion => "SET_READ_VERSION",
            Operation::GetCommittedVersion => "GET_COMMITTED_VERSION",
            Operation::GetVersionstamp => "GET_VERSIONSTAMP",
            Operation::Get => "GET",
            Operation::GetKey => "GET_KEY",
            Operation::GetRange => "GET_RANGE",
            Operation::GetRangeStartsWith => "GET_RANGE_STARTS_WITH",
            Operation::GetRangeSelector => "GET_RANGE_SELECTOR",
            Operation::Set => "SET",
            Operation::Clear => "CLEAR",
            Operation::ClearRange => "CLEAR_RANGE",
            Operation::ClearRangeStartsWith => "CLEAR_RANGE_STARTS_WITH",
            Operation::AtomicOp => "ATOMIC_OP",
            Operation::ReadConflictRange => "READ_CONFLICT_RANGE",
            Operation::WriteConflictRange => "WRITE_CONFLICT_RANGE",
            Operation::ReadConflictKey => "READ_CONFLICT_KEY",
            Operation::WriteConflictKey => "WRITE_CONFLICT_KEY",
            Operation::DisableWriteConflict => "DISABLE_WRITE_CONFLICT",
            Operation::TuplePack => "TUPLE_PACK",
            Operation::TuplePackWithVersionstamp => "TUPLE_PACK_WITH_VERSIONSTAMP",
            Operation::TupleUnpack => "TUPLE_UNPACK",
            Operation::TupleRange => "TUPLE_RANGE",
            Operation::TupleSort => "TUPLE_SORT",
            Operation::EncodeFloat => "ENCODE_FLOAT",
            Operation::EncodeDouble => "ENCODE_DOUBLE",
            Operation::DecodeFloat => "DECODE_FLOAT",
            Operation::DecodeDouble => "DECODE_DOUBLE",
            Operation::UnitTests => "UNIT_TESTS",
            Operation::LogStack => "LOG_STACK",
        }
    }

    /// Look up an opcode by name, without any target suffix.
    ///
    /// `GET_RANGE_PREFIX` is accepted as an alias of `GET_RANGE_STARTS_WITH`.
    pub fn parse(name: &str) -> Option<Self> {
        let operation = match name {
            "PUSH" => Operation::Push,
            "POP" => Operation::Pop,
            "DUP" => Operation::Dup,
            "EMPTY_STACK" => Operation::EmptyStack,
            "SWAP" => Operation::Swap,
            "WAIT_FUTURE" => Operation::WaitFuture,
            "SUB" => Operation::Sub,
            "CONCAT" => Operation::Concat,
            "START_THREAD" => Operation::StartThread,
            "WAIT_EMPTY" => Operation::WaitEmpty,
            "NEW_TRANSACTION" => Operation::NewTransaction,
            "USE_TRANSACTION" => Operation::UseTransaction,
            "COMMIT" => Operation::Commit,
            "RESET" => Operation::Reset,
            "CANCEL" => Operation::Cancel,
            "ON_ERROR" => Operation::OnError,
            "GET_READ_VERSION" => Operation::GetReadVersion,
            "SET_READ_VERSION" => Operation::SetReadVersion,
            "GET_COMMITTED_VERSION" => Operation::GetCommittedVersion,
            "GET_VERSIONSTAMP" => Operation::GetVersionstamp,
            "GET" => Operation::Get,
            "GET_KEY" => Operation::GetKey,
            "GET_RANGE" => Operation::GetRange,
            "GET_RANGE_STARTS_WITH" => Operation::GetRangeStartsWith,
            "GET_RANGE_SELECTOR" => Operation::GetRangeSelector,
            "SET" => Operation::Set,
            "CLEAR" => Operation::Clear,
            "CLEAR_RANGE" => Operation::ClearRange,
            "CLEAR_RANGE_STARTS_WITH" => Operation::ClearRangeStartsWith,
            "ATOMIC_OP" => Operation::AtomicOp,
            "READ_CONFLICT_RANGE" => Operation::ReadConflictRange,
            "WRITE_CONFLICT_RANGE" => Operation::WriteConflictRange,
            "READ_CONFLICT_KEY" => Operation::ReadConflictKey,
            "WRITE_CONFLICT_KEY" => Operation::WriteConflictKey,
            "DISABLE_WRITE_CONFLICT" => Operation::DisableWriteConflict,
            "TUPLE_PACK" => Operation::TuplePack,
            "TUPLE_PACK_WITH_VERSIONSTAMP" => Operation::TuplePackWithVersionstamp,
            "TUPLE_UNPACK" => Operation::TupleUnpack,
            "TUPLE_RANGE" => Operation::TupleRange,
            "TUPLE_SORT" => Operation::TupleSort,
            "ENCODE_FLOAT" => Operation::EncodeFloat,
            "ENCODE_DOUBLE" => Operation::EncodeDouble,
            "DECODE_FLOAT" => Operation::DecodeFloat,
            "DECODE_DOUBLE" => Operation::DecodeDouble,
            "UNIT_TESTS" => Operation::UnitTests,
            "LOG_STACK" => Operation::LogStack,
            "GET_RANGE_PREFIX" => Operation::GetRangeStartsWith,
            _ => return None,
        };
        Some(operation)
    }
}

/// What an operation runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    /// The context's bound transaction
    #[default]
    Transaction,
    /// The database, through a retry loop (`_DATABASE` suffix)
    Database,
    /// The bound transaction, reading without conflicts (`_SNAPSHOT` suffix)
    Snapshot,
}

/// How an instruction is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// Handed to the directory extension
    Directory,
    /// Interpreted by the stack machine
    Stack {
        /// The opcode
        operation: Operation,
        /// What it runs against
        target: Target,
    },
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    name: String,
    kind: InstructionKind,
    tokens: Vec<Element>,
}

impl Instruction {
    /// Decode an instruction from a stored value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tuple`] when the value is not a packed tuple, and
    /// the errors of [`Instruction::from_tokens`].
    pub fn decode(value: &[u8]) -> Result<Self> {
        Self::from_tokens(tuple::unpack(value)?)
    }

    /// Build an instruction from its tuple elements.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInstruction`] when the first element is not a string
    /// - [`Error::UnknownOperation`] when the opcode is not implemented
    pub fn from_tokens(tokens: Vec<Element>) -> Result<Self> {
        let name = match tokens.first() {
            Some(Element::String(name)) => name.clone(),
            Some(other) => {
                return Err(Error::InvalidInstruction {
                    reason: format!("opcode must be a string, found {}", other.type_name()),
                })
            }
            None => {
                return Err(Error::InvalidInstruction {
                    reason: "empty instruction tuple".into(),
                })
            }
        };

        let kind = if name.starts_with(DIRECTORY_PREFIX) {
            InstructionKind::Directory
        } else {
            let (base, target) = split_target(&name);
            let operation = Operation::parse(base).ok_or_else(|| Error::UnknownOperation {
                name: name.clone(),
            })?;
            InstructionKind::Stack { operation, target }
        };

        Ok(Instruction { name, kind, tokens })
    }

    /// The full opcode name, suffix included
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the instruction is handled
    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// The immediate operand, if the tuple carries one
    pub fn operand(&self) -> Option<&Element> {
        self.tokens.get(1)
    }

    /// Every element of the instruction tuple
    pub fn tokens(&self) -> &[Element] {
        &self.tokens
    }
}

fn split_target(name: &str) -> (&str, Target) {
    if let Some(base) = name.strip_suffix(DATABASE_SUFFIX) {
        (base, Target::Database)
    } else if let Some(base) = name.strip_suffix(SNAPSHOT_SUFFIX) {
        (base, Target::Snapshot)
    } else {
        (name, Target::Transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str) -> Vec<Element> {
        vec![Element::from(name)]
    }

    #[test]
    fn test_every_name_parses_back() {
        for operation in Operation::ALL {
            assert_eq!(Operation::parse(operation.name()), Some(operation));
        }
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        assert_eq!(Operation::parse("push"), None);
        assert_eq!(Operation::parse("GET_DATABASE"), None);
        assert_eq!(Operation::parse("GET_RANGE_PREFIXES"), None);
        assert_eq!(Operation::parse(""), None);
    }

    #[test]
    fn test_suffix_selects_target() {
        let cases = [
            ("GET", Operation::Get, Target::Transaction),
            ("GET_DATABASE", Operation::Get, Target::Database),
            ("GET_RANGE_SNAPSHOT", Operation::GetRange, Target::Snapshot),
            ("SET_DATABASE", Operation::Set, Target::Database),
            ("GET_RANGE_PREFIX", Operation::GetRangeStartsWith, Target::Transaction),
        ];
        for (name, operation, target) in cases {
            let inst = Instruction::from_tokens(op(name)).unwrap();
            assert_eq!(inst.kind(), InstructionKind::Stack { operation, target }, "{name}");
        }
    }

    #[test]
    fn test_directory_instructions_are_routed_untouched() {
        let inst = Instruction::from_tokens(op("DIRECTORY_CREATE_SUBSPACE")).unwrap();
        assert_eq!(inst.kind(), InstructionKind::Directory);
        assert_eq!(inst.name(), "DIRECTORY_CREATE_SUBSPACE");
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let err = Instruction::from_tokens(op("FROBNICATE")).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation { name } if name == "FROBNICATE"));
    }

    #[test]
    fn test_opcode_must_be_a_string() {
        let err = Instruction::from_tokens(vec![Element::bytes(b"PUSH".to_vec())]).unwrap_err();
        assert!(matches!(err, Error::InvalidInstruction { .. }));
        assert!(Instruction::from_tokens(vec![]).is_err());
    }

    #[test]
    fn test_decode_reads_the_operand() {
        let packed = tuple::pack(&[Element::from("PUSH"), Element::from(7i64)]).unwrap();
        let inst = Instruction::decode(&packed).unwrap();
        assert_eq!(inst.operand(), Some(&Element::from(7i64)));
        assert_eq!(inst.tokens().len(), 2);
    }
}
