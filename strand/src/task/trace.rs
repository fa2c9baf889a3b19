//! Observability metadata attached to every task.
//!
//! Combinators annotate the tasks they build (task type, system-hidden flag)
//! and the task core records timing and causality. None of it is read back to
//! make scheduling decisions.

use super::id::TaskId;
use super::state::TaskState;

use std::time::{Duration, Instant};

/// The kind of composition a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Fusion,
    Blocking,
    Future,
    Shareable,
    Flatten,
    WithSideEffect,
    Retry,
    WithRetry,
    Recover,
    WithRecover,
    Transform,
    WithTransform,
    Timeout,
    WithTimeout,
    WithDelay,
    Par,
}

impl TaskType {
    /// Returns the display name used by trace renderers.
    pub fn name(self) -> &'static str {
        match self {
            TaskType::Fusion => "fusion",
            TaskType::Blocking => "blocking",
            TaskType::Future => "future",
            TaskType::Shareable => "shareable",
            TaskType::Flatten => "flatten",
            TaskType::WithSideEffect => "withSideEffect",
            TaskType::Retry => "retry",
            TaskType::WithRetry => "withRetry",
            TaskType::Recover => "recover",
            TaskType::WithRecover => "withRecover",
            TaskType::Transform => "transform",
            TaskType::WithTransform => "withTransform",
            TaskType::Timeout => "timeout",
            TaskType::WithTimeout => "withTimeout",
            TaskType::WithDelay => "withDelay",
            TaskType::Par => "par",
        }
    }
}

/// Mutable trace record kept by the task core.
#[derive(Debug, Clone, Default)]
pub(crate) struct TraceBuilder {
    pub(crate) task_type: Option<TaskType>,
    pub(crate) system_hidden: bool,
    pub(crate) fused: bool,
    pub(crate) parent: Option<TaskId>,
    pub(crate) predecessors: Vec<TaskId>,
    pub(crate) start: Option<Instant>,
    pub(crate) end: Option<Instant>,
}

/// A point-in-time snapshot of a task's trace metadata.
#[derive(Debug, Clone)]
pub struct ShallowTrace {
    pub id: TaskId,
    pub name: String,
    pub priority: i32,
    pub state: TaskState,
    pub task_type: Option<TaskType>,

    /// Hidden tasks are plumbing created by combinators.
    pub system_hidden: bool,

    /// Set when the task ran inline inside another task's activation.
    pub fused: bool,

    pub parent: Option<TaskId>,
    pub predecessors: Vec<TaskId>,
    pub start: Option<Instant>,
    pub end: Option<Instant>,

    /// The result rendered by the task's value serializer, if one is set.
    pub value: Option<String>,

    pub error: Option<String>,
}

impl ShallowTrace {
    /// Time between start and end, once both are known.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}
