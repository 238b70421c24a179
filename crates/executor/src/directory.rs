//! The directory-layer extension point.
//!
//! Instructions whose opcode starts with `DIRECTORY_` form a separate
//! instruction namespace. The executor hands them over untouched together
//! with the context, and never looks at what the extension does with them.

use futures::future::{self, BoxFuture, FutureExt};

use crate::context::Context;
use crate::operation::Instruction;
use crate::{Error, Result};

/// Handler for `DIRECTORY_` instructions.
pub trait DirectoryExtension: Send + Sync {
    /// Execute one directory instruction against `ctx`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        instruction: &'a Instruction,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Extension used when no directory layer is available.
///
/// Every directory instruction is a fatal fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDirectory;

impl DirectoryExtension for UnavailableDirectory {
    fn process<'a>(
        &'a self,
        _ctx: &'a mut Context,
        instruction: &'a Instruction,
    ) -> BoxFuture<'a, Result<()>> {
        future::ready(Err(Error::Directory {
            reason: format!("no directory layer available for {}", instruction.name()),
        }))
        .boxed()
    }
}
