//! The boundary between the task core and whatever executes tasks.
//!
//! The core never runs tasks on its own. A running task asks its
//! [`Context`](crate::Context) to start children or timers, and the context
//! forwards those requests to a [`Scheduler`] as [`Activation`]s. The engine
//! eventually calls [`Activation::run`], which is the only way a task starts.

use crate::error::CancelReason;
use crate::task::TaskId;
use crate::task::core::TaskCore;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Executes activations on behalf of the task core.
///
/// Implementations must eventually run or cancel every activation they
/// accept. An engine that is shutting down must cancel with
/// [`CancelReason::Shutdown`] instead of silently dropping work.
pub trait Scheduler: Send + Sync {
    /// Queues `activation` for execution as soon as possible.
    fn schedule(&self, activation: Activation);

    /// Queues `activation` for execution once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, activation: Activation);
}

/// A request to start one task.
///
/// Carries the task together with the causality recorded in its trace: the
/// task that scheduled it and the predecessors it waited for.
pub struct Activation {
    task: Arc<dyn TaskCore>,
    parent: Option<TaskId>,
    predecessors: Vec<TaskId>,
}

impl Activation {
    pub(crate) fn new(
        task: Arc<dyn TaskCore>,
        parent: Option<TaskId>,
        predecessors: Vec<TaskId>,
    ) -> Self {
        Self {
            task,
            parent,
            predecessors,
        }
    }

    /// ID of the task to start.
    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Name of the task to start.
    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    /// Priority of the task to start.
    pub fn priority(&self) -> i32 {
        self.task.priority()
    }

    /// Returns `true` if the task already finished, e.g. because it was
    /// cancelled while queued. Running such an activation is a no-op.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Starts the task.
    ///
    /// Idempotent: a task that already started or finished is left alone.
    pub fn run(self, scheduler: Arc<dyn Scheduler>) {
        self.task
            .context_run(scheduler, self.parent, self.predecessors);
    }

    /// Resolves the task with a cancellation failure instead of running it.
    pub fn cancel(self, reason: CancelReason) -> bool {
        self.task.cancel(reason)
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("task", &self.task.id())
            .field("name", &self.task.name())
            .field("priority", &self.task.priority())
            .field("parent", &self.parent)
            .finish()
    }
}
