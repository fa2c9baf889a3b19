/// The work function has not been invoked yet.
///
/// Priority may still change and the task may be cancelled without ever
/// running.
pub(crate) const CREATED: u8 = 0;

/// The work function has been invoked and the result is not committed yet.
///
/// At most one activation can observe the transition into this state.
pub(crate) const RUNNING: u8 = 1;

/// The outcome has been committed.
///
/// Reached from `CREATED` (cancelled before start) or from `RUNNING`.
/// There is no transition out of this state.
pub(crate) const FINISHED: u8 = 2;

/// Observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Built but not started.
    Created,

    /// Started, result not yet known.
    Running,

    /// Finished with a value.
    Done,

    /// Finished with an error, including cancellation.
    Failed,
}

impl TaskState {
    /// Returns `true` for [`TaskState::Done`] and [`TaskState::Failed`].
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}
