//! Task priorities.
//!
//! Among tasks that are ready at the same time, the engine runs the one with
//! the larger priority first. Priorities are frozen once a task starts.

/// Lowest priority a task can have.
pub const MIN: i32 = i32::MIN + 1;

/// Highest priority a task can have.
///
/// Used for timeout tasks and the tasks they guard.
pub const MAX: i32 = i32::MAX - 1;

/// Priority of a freshly built task.
pub const DEFAULT: i32 = 0;

/// Returns `true` if `priority` lies within [`MIN`]..=[`MAX`].
pub fn is_valid(priority: i32) -> bool {
    (MIN..=MAX).contains(&priority)
}
