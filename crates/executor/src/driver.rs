//! Context driver: reads a context's instruction stream and executes it.
//!
//! Instructions live in the store under the tuple range of `(prefix,)`, one
//! per key, in key order. They are read in batches with a retrying read and
//! executed one at a time; the next batch starts after the last key seen.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::info;

use stacktester_core::{
    printable, read_range, retry, tuple, Element, KeySelector, RangeOptions, StreamingMode,
};

use crate::context::Context;
use crate::executor::Executor;
use crate::operation::Instruction;
use crate::Result;

/// Run the context at `prefix` to the end of its instruction stream.
///
/// # Errors
///
/// Returns the first fatal fault; the context stops there.
pub fn run_context(executor: Arc<Executor>, prefix: Vec<u8>) -> BoxFuture<'static, Result<()>> {
    async move {
        let name = printable(&prefix);
        let (begin, end) = tuple::range(&[Element::Bytes(prefix.clone())])?;
        let mut ctx = Context::new(executor.database(), executor.config(), prefix)?;
        let batch_size = executor.config().instruction_batch_size;
        info!(context = %name, "Context started");

        let end = KeySelector::first_greater_or_equal(end);
        let mut begin = KeySelector::first_greater_or_equal(begin);
        loop {
            let batch = {
                let begin = begin.clone();
                let end = end.clone();
                let options = RangeOptions::new(batch_size, false, StreamingMode::WantAll);
                retry::read(executor.database(), move |tr| {
                    read_range(tr, begin.clone(), end.clone(), options.clone(), false)
                })
                .await?
            };
            let Some(last) = batch.last() else {
                break;
            };
            begin = KeySelector::first_greater_than(last.key.clone());

            for kv in &batch {
                let instruction = Instruction::decode(&kv.value)?;
                executor.execute(&mut ctx, &instruction).await?;
                ctx.advance();
            }
        }

        info!(
            context = %name,
            instructions = ctx.instruction_index(),
            "Context finished"
        );
        Ok(())
    }
    .boxed()
}
