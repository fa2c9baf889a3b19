//! Error types shared by promises, tasks and combinators.
//!
//! Every outcome in the library is a `Result<T, Error>`. Outcomes are read by
//! many listeners, so [`Error`] is cheap to clone: foreign errors are kept
//! behind an [`Arc`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a task was cancelled.
///
/// Cancellation is the "early finish" failure kind: it is produced only by the
/// cancellation protocol, timeouts and engine shutdown, and is never handed to
/// recovery functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// Cancelled explicitly through [`Task::cancel`](crate::Task::cancel).
    Requested,

    /// The task was scheduled through a parent's context and the parent
    /// finished before the task started.
    ParentCompleted,

    /// The task lost a race against a timeout timer.
    Timeout,

    /// A sibling in a fast-fail join failed first.
    SiblingFailed,

    /// The engine shut down before the task could finish.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CancelReason::Requested => "cancellation requested",
            CancelReason::ParentCompleted => "parent task finished early",
            CancelReason::Timeout => "timed out",
            CancelReason::SiblingFailed => "sibling task failed",
            CancelReason::Shutdown => "engine shut down",
        };

        f.write_str(reason)
    }
}

/// The error carried by a failed promise or task.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An error raised by user-supplied work.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// A plain failure message raised by user-supplied work.
    #[error("{0}")]
    Message(String),

    /// The task finished early through the cancellation protocol.
    #[error("early finish: {0}")]
    Cancelled(CancelReason),

    /// A timer fired before the guarded task committed its result.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A combinator's function produced no task.
    #[error("{0} returned no task")]
    Construction(String),

    /// The work function panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A blocking executor refused to accept work.
    #[error("blocking executor rejected work: {0}")]
    Rejected(String),

    /// The value of a promise was read before it was resolved.
    #[error("promise is not resolved yet")]
    Unresolved,
}

impl Error {
    /// Wraps any error type as an ordinary failure.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Failed(Arc::new(error))
    }

    /// Creates an ordinary failure from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Error::Message(message.to_string())
    }

    /// Returns `true` for the cancellation ("early finish") kind.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Returns `true` if this error was raised by a timeout timer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Returns the cancellation reason, if this is a cancellation.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Error::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Converts a caught panic payload into an error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Error::Panicked(message)
    }
}

impl From<CancelReason> for Error {
    fn from(reason: CancelReason) -> Self {
        Error::Cancelled(reason)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::new(error)
    }
}
