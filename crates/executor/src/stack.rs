//! The operand stack.
//!
//! Each entry remembers the index of the instruction that produced it, which
//! LOG_STACK writes next to the value. Entries hold either a ready element or
//! a [`PendingResult`]; pending entries are resolved where they are consumed.
//!
//! All operations are synchronous and the stack is owned by exactly one
//! context.

use stacktester_core::Element;

use crate::pending::PendingResult;
use crate::{Error, Result};

/// Payload of a stack entry.
#[derive(Debug, Clone)]
pub enum StackValue {
    /// A concrete element
    Ready(Element),
    /// An operation still in flight
    Pending(PendingResult),
}

impl StackValue {
    /// Resolve to an element, waiting for a pending operation if needed.
    ///
    /// # Errors
    ///
    /// Returns faults that are not store faults.
    pub async fn resolve(&self) -> Result<Element> {
        match self {
            StackValue::Ready(element) => Ok(element.clone()),
            StackValue::Pending(pending) => pending.resolve().await,
        }
    }

    /// The element, if this value is ready.
    pub fn as_ready(&self) -> Option<&Element> {
        match self {
            StackValue::Ready(element) => Some(element),
            StackValue::Pending(_) => None,
        }
    }
}

/// One stack entry.
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// Index of the instruction that produced the entry
    pub index: usize,
    /// The payload
    pub value: StackValue,
}

impl StackEntry {
    /// A ready entry.
    pub fn ready(index: usize, element: Element) -> Self {
        StackEntry {
            index,
            value: StackValue::Ready(element),
        }
    }

    /// A pending entry.
    pub fn pending(index: usize, pending: PendingResult) -> Self {
        StackEntry {
            index,
            value: StackValue::Pending(pending),
        }
    }

    /// Resolve the payload, keeping the origin index.
    pub async fn resolve(self) -> Result<StackEntry> {
        let element = self.value.resolve().await?;
        Ok(StackEntry::ready(self.index, element))
    }
}

/// Last-in-first-out operand stack.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    entries: Vec<StackEntry>,
}

impl Stack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from bottom to top.
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Push an entry on top.
    pub fn push(&mut self, entry: StackEntry) {
        self.entries.push(entry);
    }

    /// Pop the top entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyStack`] if the stack is empty.
    pub fn pop(&mut self) -> Result<StackEntry> {
        self.entries.pop().ok_or(Error::EmptyStack {
            requested: 1,
            len: 0,
        })
    }

    /// Pop the top `count` entries, returned oldest first.
    ///
    /// After `push(a); push(b)`, `pop_n(2)` returns `[a, b]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyStack`] without popping anything if fewer than
    /// `count` entries are present.
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<StackEntry>> {
        let len = self.entries.len();
        if count > len {
            return Err(Error::EmptyStack {
                requested: count,
                len,
            });
        }
        Ok(self.entries.split_off(len - count))
    }

    /// Exchange the top entry with the entry `depth` positions below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StackIndex`] if `depth >= len()`.
    pub fn swap(&mut self, depth: usize) -> Result<()> {
        let len = self.entries.len();
        if depth >= len {
            return Err(Error::StackIndex { index: depth, len });
        }
        self.entries.swap(len - 1, len - 1 - depth);
        Ok(())
    }

    /// Push a copy of the top entry, origin index included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyStack`] if the stack is empty.
    pub fn duplicate_top(&mut self) -> Result<()> {
        let top = self.entries.last().cloned().ok_or(Error::EmptyStack {
            requested: 1,
            len: 0,
        })?;
        self.entries.push(top);
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
