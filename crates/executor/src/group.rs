//! Tracked task group for execution contexts.
//!
//! Contexts are fire-and-forget relative to the context that spawned them,
//! but a run is only finished when every context has finished. Spawning
//! registers the task's handle in the group; [`TaskGroup::wait`] drains the
//! registrations until none are left, including contexts spawned while it
//! was waiting.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::error;

use crate::{Error, Result};

struct Registration {
    name: String,
    handle: JoinHandle<Result<()>>,
}

/// A context that ended with a fatal fault.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFailure {
    /// Printable prefix of the context
    pub context: String,
    /// The fault
    pub error: Error,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Number of contexts that ran
    pub contexts: usize,
    /// Contexts that failed
    pub failures: Vec<ContextFailure>,
}

impl RunSummary {
    /// Whether every context finished cleanly
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registry of spawned context tasks.
pub struct TaskGroup {
    sender: UnboundedSender<Registration>,
    receiver: Mutex<UnboundedReceiver<Registration>>,
}

impl TaskGroup {
    /// Create an empty group
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        TaskGroup {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Spawn `task` on the runtime and register it under `name`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, name: String, task: BoxFuture<'static, Result<()>>) {
        let handle = tokio::spawn(task);
        // The group holds its own receiver, so the channel is never closed.
        let _ = self.sender.send(Registration { name, handle });
    }

    /// Wait for every registered task, including ones registered meanwhile.
    pub async fn wait(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        loop {
            let next = self.receiver.lock().try_recv();
            let Ok(Registration { name, handle }) = next else {
                break;
            };
            summary.contexts += 1;
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::TaskFailed {
                    reason: e.to_string(),
                }),
            };
            if let Err(e) = outcome {
                error!(context = %name, "Context failed: {}", e);
                summary.failures.push(ContextFailure {
                    context: name,
                    error: e,
                });
            }
        }
        summary
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}
