//! Tasks: named, prioritized, cancellable descriptions of deferred work.
//!
//! A [`Task`] is inert until an engine activates it. Building one only
//! records a work function; combinators build new tasks around existing ones.
//! Once activated, the task moves through `Created -> Running -> Done | Failed`
//! and publishes its outcome through an embedded [`Promise`].
//!
//! Cloning a task yields another handle to the same task, not a copy of the
//! work. Running the same task from two plans is legal but the first plan to
//! cancel it cancels it for both; use [`Task::shareable`] to isolate plans.

pub(crate) mod core;

mod id;
mod state;
mod trace;

pub mod priority;

pub use id::TaskId;
pub use state::TaskState;
pub use trace::{ShallowTrace, TaskType};

use self::core::{Body, Core, TaskCore, Work};
use crate::context::Context;
use crate::error::{CancelReason, Error, Result};
use crate::promise::{Promise, Value};

use std::fmt;
use std::sync::Arc;

/// A deferred computation producing a `T`.
pub struct Task<T> {
    pub(crate) core: Arc<Core<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Value> Task<T> {
    pub(crate) fn from_work(name: impl Into<String>, work: Work<T>, fused: bool) -> Self {
        Self {
            core: Arc::new(Core::new(name.into(), Body::new(work, fused))),
        }
    }

    /// Creates a task whose work function receives the activation's
    /// [`Context`] and returns the promise that will carry its result.
    ///
    /// This is the most general constructor; every combinator is built on it
    /// or on [`Task::apply`].
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let child = Task::value("child", 1);
    /// let parent = Task::with_context("parent", move |ctx| {
    ///     ctx.run(&child);
    ///     Ok(child.promise())
    /// });
    /// ```
    pub fn with_context<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&Context) -> Result<Promise<T>> + Send + 'static,
    {
        Self::from_work(name, Box::new(work), false)
    }

    /// Creates a task from a function returning a promise, typically one
    /// resolved later by a callback-based API.
    pub fn from_promise<F>(name: impl Into<String>, callable: F) -> Self
    where
        F: FnOnce() -> Result<Promise<T>> + Send + 'static,
    {
        Self::from_work(name, Box::new(move |_| callable()), false)
    }

    /// Creates a task that succeeds with `value`.
    pub fn value(name: impl Into<String>, value: T) -> Self {
        Self::from_work(name, Box::new(move |_| Ok(Promise::resolved(value))), true)
    }

    /// Creates a task that fails with `error`.
    pub fn failure(name: impl Into<String>, error: Error) -> Self {
        Self::from_work(name, Box::new(move |_| Ok(Promise::failed(error))), true)
    }

    /// Creates a task completing with `outcome`.
    pub fn from_result(name: impl Into<String>, outcome: Result<T>) -> Self {
        Self::from_work(
            name,
            Box::new(move |_| {
                Ok(match outcome {
                    Ok(value) => Promise::resolved(value),
                    Err(error) => Promise::failed(error),
                })
            }),
            true,
        )
    }

    /// Creates a task that computes its value synchronously.
    ///
    /// The callable must be cheap and must not block: it runs on an engine
    /// thread, possibly inline inside the activation of a dependent task.
    /// Use [`Task::blocking`] for anything else.
    pub fn callable<F>(name: impl Into<String>, callable: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self::from_work(
            name,
            Box::new(move |_| {
                Ok(match callable() {
                    Ok(value) => Promise::resolved(value),
                    Err(error) => Promise::failed(error),
                })
            }),
            true,
        )
    }

    /// Returns the task's unique ID.
    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    /// Returns the task's name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Returns the task's priority.
    pub fn priority(&self) -> i32 {
        self.core.priority()
    }

    /// Changes the task's priority.
    ///
    /// Returns `false` without changing anything if the task already started
    /// or `priority` lies outside [`priority::MIN`]`..=`[`priority::MAX`].
    pub fn set_priority(&self, priority: i32) -> bool {
        self.core.set_priority(priority)
    }

    pub fn state(&self) -> TaskState {
        self.core.state()
    }

    /// Returns `true` once the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.core.promise().is_done()
    }

    /// Returns `true` if the task failed, cancellation included.
    pub fn is_failed(&self) -> bool {
        self.core.promise().is_failed()
    }

    /// Returns the outcome, or [`Error::Unresolved`] while the task runs.
    pub fn get(&self) -> Result<T> {
        self.core.promise().get()
    }

    pub fn error(&self) -> Option<Error> {
        self.core.promise().error()
    }

    /// Returns a read handle to the task's result.
    pub fn promise(&self) -> Promise<T> {
        self.core.promise().clone()
    }

    /// Registers a listener on the task's result.
    ///
    /// See [`Promise::add_listener`].
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&Promise<T>) + Send + 'static,
    {
        self.core.promise().add_listener(listener);
    }

    /// Cancels the task.
    ///
    /// A task that has not started never runs. A running task's result is
    /// forced to a cancellation failure and whatever its work function
    /// produces later is ignored. Returns `false` if the task already
    /// finished.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested)
    }

    /// Cancels the task with an explicit reason.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        self.core.cancel(reason)
    }

    /// Returns a snapshot of the task's trace metadata.
    pub fn trace(&self) -> ShallowTrace {
        self.core.trace()
    }

    /// Marks the task as plumbing that trace renderers may hide.
    pub fn set_system_hidden(&self, hidden: bool) {
        self.core.update_trace(|trace| trace.system_hidden = hidden);
    }

    /// Tags the task with the kind of composition it represents.
    pub fn set_task_type(&self, task_type: TaskType) {
        self.core.update_trace(|trace| trace.task_type = Some(task_type));
    }

    /// Installs a function rendering the task's value in traces.
    pub fn set_value_serializer<F>(&self, serializer: F)
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.core.set_serializer(Arc::new(serializer));
    }

    pub(crate) fn core(&self) -> Arc<dyn TaskCore> {
        self.core.clone()
    }

    pub(crate) fn hidden(self, task_type: TaskType) -> Self {
        self.set_system_hidden(true);
        self.set_task_type(task_type);
        self
    }

    pub(crate) fn tagged(self, task_type: TaskType) -> Self {
        self.set_task_type(task_type);
        self
    }
}

impl Task<()> {
    /// Creates a task that runs `action` for its effect.
    ///
    /// The same restrictions as for [`Task::callable`] apply.
    pub fn action<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self::callable(name, action)
    }
}

impl<T: Value> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("state", &self.state())
            .finish()
    }
}
