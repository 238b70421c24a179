//! Pending results and their resolution.
//!
//! Operations issued against the store push a [`PendingResult`] instead of a
//! value. The work behind it runs as its own task from the moment it is
//! created, so side effects attached to it (such as rebinding a transaction
//! after ON_ERROR) happen whether or not anyone ever pops the entry.
//!
//! Resolution flattens the outcome into an element:
//! - a value resolves to itself
//! - "no value" resolves to [`marker::RESULT_NOT_PRESENT`]
//! - a store fault resolves to its error marker, see [`error_marker`]
//! - any other fault is returned as an error

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;

use stacktester_core::{tuple, Element};

use crate::{Error, Result};

/// Byte-string markers pushed by the interpreter.
pub mod marker {
    /// A successful operation that produced no value
    pub const RESULT_NOT_PRESENT: &[u8] = b"RESULT_NOT_PRESENT";
    /// A conflict range was added
    pub const SET_CONFLICT_RANGE: &[u8] = b"SET_CONFLICT_RANGE";
    /// A conflict key was added
    pub const SET_CONFLICT_KEY: &[u8] = b"SET_CONFLICT_KEY";
    /// GET_READ_VERSION completed
    pub const GOT_READ_VERSION: &[u8] = b"GOT_READ_VERSION";
    /// GET_COMMITTED_VERSION completed
    pub const GOT_COMMITTED_VERSION: &[u8] = b"GOT_COMMITTED_VERSION";
    /// WAIT_EMPTY saw the prefix empty
    pub const WAITED_FOR_EMPTY: &[u8] = b"WAITED_FOR_EMPTY";
    /// Versionstamp packing succeeded
    pub const OK: &[u8] = b"OK";
    /// Versionstamp packing found no placeholder
    pub const ERROR_NONE: &[u8] = b"ERROR: NONE";
    /// Versionstamp packing found several placeholders
    pub const ERROR_MULTIPLE: &[u8] = b"ERROR: MULTIPLE";
}

/// The error marker for a store fault: the packed tuple
/// `(b"ERROR", b"<code>")`.
pub fn error_marker(code: i32) -> Result<Element> {
    let packed = tuple::pack(&[
        Element::bytes(b"ERROR".to_vec()),
        Element::bytes(code.to_string().into_bytes()),
    ])?;
    Ok(Element::Bytes(packed))
}

/// Raw outcome of a pending operation, before flattening.
pub type Outcome = Result<Option<Element>>;

/// Handle to an operation in flight.
///
/// Cloning is cheap and every clone observes the same outcome; this is what
/// DUP relies on.
#[derive(Clone)]
pub struct PendingResult {
    inner: Shared<BoxFuture<'static, Outcome>>,
}

impl PendingResult {
    /// Start `work` as a task and return a handle to its outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        let inner = async move {
            handle.await.map_err(|e| Error::TaskFailed {
                reason: e.to_string(),
            })?
        }
        .boxed()
        .shared();
        PendingResult { inner }
    }

    /// A handle whose outcome is already known.
    pub fn ready(outcome: Outcome) -> Self {
        PendingResult {
            inner: futures::future::ready(outcome).boxed().shared(),
        }
    }

    /// Wait for the raw outcome.
    pub async fn wait(&self) -> Outcome {
        self.inner.clone().await
    }

    /// Wait for the outcome and flatten it into an element.
    ///
    /// # Errors
    ///
    /// Returns only faults that are not store faults; store faults become
    /// error markers.
    pub async fn resolve(&self) -> Result<Element> {
        flatten(self.wait().await)
    }
}

impl fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peek() {
            Some(outcome) => f.debug_tuple("PendingResult").field(outcome).finish(),
            None => f.write_str("PendingResult(<in flight>)"),
        }
    }
}

/// Flatten a raw outcome into an element.
pub fn flatten(outcome: Outcome) -> Result<Element> {
    match outcome {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(Element::bytes(marker::RESULT_NOT_PRESENT.to_vec())),
        Err(e) => match e.store_error() {
            Some(store) => error_marker(store.code()),
            None => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacktester_core::{code, StoreError};

    #[test]
    fn test_error_marker_layout() {
        let marker = error_marker(1020).unwrap();
        let decoded = tuple::unpack(marker.as_bytes().unwrap()).unwrap();
        assert_eq!(
            decoded,
            vec![Element::bytes(b"ERROR".to_vec()), Element::bytes(b"1020".to_vec())]
        );
    }

    #[test]
    fn test_flatten_outcomes() {
        assert_eq!(flatten(Ok(Some(Element::from(3i64)))).unwrap(), Element::from(3i64));
        assert_eq!(
            flatten(Ok(None)).unwrap(),
            Element::bytes(marker::RESULT_NOT_PRESENT.to_vec())
        );
        assert_eq!(
            flatten(Err(StoreError::new(code::TRANSACTION_CANCELLED).into())).unwrap(),
            error_marker(1025).unwrap()
        );
        assert_eq!(
            flatten(Err(Error::MissingReadVersion)).unwrap_err(),
            Error::MissingReadVersion
        );
    }

    #[tokio::test]
    async fn test_clones_share_one_outcome() {
        let pending = PendingResult::spawn(async { Ok(Some(Element::from("done"))) });
        let copy = pending.clone();
        assert_eq!(pending.resolve().await.unwrap(), Element::from("done"));
        assert_eq!(copy.resolve().await.unwrap(), Element::from("done"));
    }

    #[tokio::test]
    async fn test_work_runs_without_being_awaited() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _pending = PendingResult::spawn(async move {
            let _ = tx.send(());
            Ok(None)
        });
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_is_a_fatal_fault() {
        fn explode() -> Outcome {
            panic!("boom")
        }
        let pending = PendingResult::spawn(async { explode() });
        assert!(matches!(
            pending.resolve().await,
            Err(Error::TaskFailed { .. })
        ));
    }
}
