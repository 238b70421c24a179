//! The Executor - dispatches instructions to their handlers.
//!
//! One executor is shared by every context of a run. It owns the database
//! handle, the configuration, the directory extension and the task group
//! that tracks spawned contexts; all per-context state lives in
//! [`Context`].
//!
//! Error handling per instruction:
//! - A store fault becomes an error marker pushed at the instruction's index
//! - Every other fault propagates and ends the context

use std::sync::Arc;

use tracing::{debug, warn};

use stacktester_core::{printable, ConflictRangeType, Database};

use crate::config::TesterConfig;
use crate::context::Context;
use crate::directory::{DirectoryExtension, UnavailableDirectory};
use crate::driver;
use crate::group::{RunSummary, TaskGroup};
use crate::handlers::{bytes_param, misc, mutation, read, stack, transaction, tuple};
use crate::operation::{Instruction, InstructionKind, Operation, Target};
use crate::pending::error_marker;
use crate::{Error, Result};

/// The instruction executor.
///
/// # Thread Safety
///
/// Executor is `Send + Sync`; contexts running on different tasks share it
/// through an `Arc`.
///
/// # Example
///
/// ```ignore
/// use stacktester_executor::{Executor, TesterConfig};
///
/// let executor = Executor::new(db, TesterConfig::default());
/// let summary = executor.run(b"test_spec".to_vec()).await;
/// assert!(summary.is_success());
/// ```
pub struct Executor {
    db: Arc<dyn Database>,
    config: Arc<TesterConfig>,
    directory: Arc<dyn DirectoryExtension>,
    group: TaskGroup,
}

impl Executor {
    /// Create an executor without a directory layer.
    pub fn new(db: Arc<dyn Database>, config: TesterConfig) -> Arc<Self> {
        Self::with_directory(db, config, Arc::new(UnavailableDirectory))
    }

    /// Create an executor that routes `DIRECTORY_` instructions to
    /// `directory`.
    pub fn with_directory(
        db: Arc<dyn Database>,
        config: TesterConfig,
        directory: Arc<dyn DirectoryExtension>,
    ) -> Arc<Self> {
        Arc::new(Executor {
            db,
            config: Arc::new(config),
            directory,
            group: TaskGroup::new(),
        })
    }

    /// The database under test
    pub fn database(&self) -> Arc<dyn Database> {
        Arc::clone(&self.db)
    }

    /// The run configuration
    pub fn config(&self) -> Arc<TesterConfig> {
        Arc::clone(&self.config)
    }

    /// Start a context reading its instructions under `prefix`.
    ///
    /// The context runs on its own task and is tracked by the run's task
    /// group. Must be called from within a tokio runtime.
    pub fn spawn_context(self: &Arc<Self>, prefix: Vec<u8>) {
        let name = printable(&prefix);
        debug!(context = %name, "Spawning context");
        self.group
            .spawn(name, driver::run_context(Arc::clone(self), prefix));
    }

    /// Run the context at `prefix` and every context it starts.
    ///
    /// # Returns
    /// A summary with the number of contexts and the ones that failed.
    pub async fn run(self: &Arc<Self>, prefix: Vec<u8>) -> RunSummary {
        self.spawn_context(prefix);
        self.group.wait().await
    }

    /// Execute one instruction against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns every fault other than a store fault; store faults are pushed
    /// as error markers and the instruction counts as executed.
    pub async fn execute(self: &Arc<Self>, ctx: &mut Context, instruction: &Instruction) -> Result<()> {
        debug!(
            index = ctx.instruction_index(),
            stack = ctx.stack().len(),
            "{}",
            instruction.name()
        );

        let outcome = match instruction.kind() {
            InstructionKind::Directory => self.directory.process(ctx, instruction).await,
            InstructionKind::Stack { operation, target } => {
                self.dispatch(ctx, instruction, operation, target).await
            }
        };

        match outcome {
            Err(Error::Store(e)) => {
                warn!(
                    index = ctx.instruction_index(),
                    code = e.code(),
                    "{} failed: {}",
                    instruction.name(),
                    e
                );
                ctx.push(error_marker(e.code())?);
                Ok(())
            }
            other => other,
        }
    }

    async fn dispatch(
        self: &Arc<Self>,
        ctx: &mut Context,
        instruction: &Instruction,
        operation: Operation,
        target: Target,
    ) -> Result<()> {
        match operation {
            // Stack
            Operation::Push => stack::push(ctx, instruction).await,
            Operation::Pop => stack::pop(ctx).await,
            Operation::Dup => stack::dup(ctx).await,
            Operation::EmptyStack => stack::empty_stack(ctx).await,
            Operation::Swap => stack::swap(ctx).await,
            Operation::WaitFuture => stack::wait_future(ctx).await,
            Operation::Sub => stack::sub(ctx).await,
            Operation::Concat => stack::concat(ctx).await,

            // Threads
            Operation::StartThread => {
                let prefix = bytes_param("START_THREAD", ctx.pop_param().await?)?;
                self.spawn_context(prefix);
                Ok(())
            }
            Operation::WaitEmpty => transaction::wait_empty(ctx).await,

            // Transactions
            Operation::NewTransaction | Operation::Reset => {
                transaction::new_transaction(ctx).await
            }
            Operation::UseTransaction => transaction::use_transaction(ctx).await,
            Operation::Commit => transaction::commit(ctx).await,
            Operation::Cancel => transaction::cancel(ctx).await,
            Operation::OnError => transaction::on_error(ctx).await,
            Operation::GetReadVersion => transaction::get_read_version(ctx).await,
            Operation::SetReadVersion => transaction::set_read_version(ctx).await,
            Operation::GetCommittedVersion => transaction::get_committed_version(ctx).await,
            Operation::GetVersionstamp => transaction::get_versionstamp(ctx).await,

            // Reads
            Operation::Get => read::get(ctx, target).await,
            Operation::GetKey => read::get_key(ctx, target).await,
            Operation::GetRange => read::get_range(ctx, target).await,
            Operation::GetRangeStartsWith => read::get_range_starts_with(ctx, target).await,
            Operation::GetRangeSelector => read::get_range_selector(ctx, target).await,

            // Mutations
            Operation::Set => mutation::set(ctx, target).await,
            Operation::Clear => mutation::clear(ctx, target).await,
            Operation::ClearRange => mutation::clear_range(ctx, target).await,
            Operation::ClearRangeStartsWith => mutation::clear_range_starts_with(ctx, target).await,
            Operation::AtomicOp => mutation::atomic_op(ctx, target).await,

            // Conflicts
            Operation::ReadConflictRange => {
                mutation::conflict_range(ctx, ConflictRangeType::Read).await
            }
            Operation::WriteConflictRange => {
                mutation::conflict_range(ctx, ConflictRangeType::Write).await
            }
            Operation::ReadConflictKey => mutation::conflict_key(ctx, ConflictRangeType::Read).await,
            Operation::WriteConflictKey => {
                mutation::conflict_key(ctx, ConflictRangeType::Write).await
            }
            Operation::DisableWriteConflict => mutation::disable_write_conflict(ctx).await,

            // Tuples
            Operation::TuplePack => tuple::pack(ctx).await,
            Operation::TuplePackWithVersionstamp => tuple::pack_with_versionstamp(ctx).await,
            Operation::TupleUnpack => tuple::unpack(ctx).await,
            Operation::TupleRange => tuple::range(ctx).await,
            Operation::TupleSort => tuple::sort(ctx).await,
            Operation::EncodeFloat => tuple::encode_float(ctx).await,
            Operation::EncodeDouble => tuple::encode_double(ctx).await,
            Operation::DecodeFloat => tuple::decode_float(ctx).await,
            Operation::DecodeDouble => tuple::decode_double(ctx).await,

            // Misc
            Operation::UnitTests => misc::unit_tests(ctx).await,
            Operation::LogStack => misc::log_stack(ctx).await,
        }
    }
}
