//! Combinators building new tasks around existing ones.
//!
//! Every combinator takes a description that becomes the new task's name and
//! leaves the receiver untouched: it returns a fresh [`Task`] that, once
//! activated, runs the receiver as a child and derives its own outcome from
//! the receiver's.
//!
//! The combinators fall into three groups:
//!
//! - [`propagate`]: cheap synchronous steps on the receiver's outcome (`map`,
//!   `and_then`, `recover`, `on_failure`, `to_try`, `transform`). These are
//!   *fused*: a chain of them over one source runs in a single activation.
//! - [`chain`]: steps that continue with another task (`flat_map`,
//!   `flatten`, `and_then_task`, `recover_with`, `transform_with`).
//! - [`side_effect`] and [`time`]: detached branches, sharing, timeouts and
//!   delays.
//!
//! Failure handlers never see cancellations. A cancelled receiver makes the
//! combinator's task fail with the same cancellation, untouched.

pub mod chain;
pub mod propagate;
pub mod side_effect;
pub mod time;

use crate::error::{Error, Result};
use crate::promise::Value;
use crate::task::Task;

/// Conversion from a user function's return value into a task.
///
/// Functions handed to task-producing combinators may return a [`Task`],
/// an `Option<Task>` or a `Result<Task>`. A missing task is a construction
/// failure naming the combinator, never a panic.
pub trait IntoTask {
    /// The value type of the produced task.
    type Value: Value;

    /// Converts `self` into a task, using `desc` to describe construction
    /// failures.
    fn into_task(self, desc: &str) -> Result<Task<Self::Value>>;
}

impl<T: Value> IntoTask for Task<T> {
    type Value = T;

    fn into_task(self, _desc: &str) -> Result<Task<T>> {
        Ok(self)
    }
}

impl<T: Value> IntoTask for Option<Task<T>> {
    type Value = T;

    fn into_task(self, desc: &str) -> Result<Task<T>> {
        self.ok_or_else(|| Error::Construction(desc.to_string()))
    }
}

impl<T: Value> IntoTask for Result<Task<T>> {
    type Value = T;

    fn into_task(self, _desc: &str) -> Result<Task<T>> {
        self
    }
}
