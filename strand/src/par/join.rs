//! The generic fan-in behind every `par` flavour.

use crate::error::{CancelReason, Error, Result};
use crate::promise::{Promise, Value};
use crate::task::core::TaskCore;
use crate::task::{Task, TaskType};

use parking_lot::Mutex;

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// How a join reacts to a member failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinMode {
    /// Fail with the first member error and cancel the other members.
    FastFail,

    /// Wait for every member and always succeed.
    BestEffort,
}

/// Builds a task that starts every member as a child and completes with
/// `collect()` once all of them finished.
///
/// In [`JoinMode::FastFail`] the first member failure completes the join
/// instead, and the remaining members are cancelled with
/// [`CancelReason::SiblingFailed`].
pub(crate) fn fan_in<R, C>(
    name: impl Into<String>,
    members: Vec<Arc<dyn TaskCore>>,
    mode: JoinMode,
    collect: C,
) -> Task<R>
where
    R: Value,
    C: FnOnce() -> Result<R> + Send + 'static,
{
    Task::with_context(name, move |ctx| {
        let result = Promise::settable();

        if members.is_empty() {
            result.complete(collect());
            return Ok(result.into_promise());
        }

        let members = Arc::new(members);
        let remaining = Arc::new(AtomicUsize::new(members.len()));
        let collect = Arc::new(Mutex::new(Some(collect)));
        let failed = Arc::new(AtomicBool::new(false));

        for member in members.iter() {
            let result = result.clone();
            let remaining = remaining.clone();
            let collect = collect.clone();
            let failed = failed.clone();
            let siblings = members.clone();

            member.add_completion_listener(Box::new(move |outcome| {
                if let (JoinMode::FastFail, Err(error)) = (mode, outcome) {
                    // Siblings are cancelled before the join is published.
                    // This member has not counted down yet, so `collect`
                    // cannot run in between.
                    if !failed.swap(true, Ordering::AcqRel) {
                        for sibling in siblings.iter() {
                            sibling.cancel(CancelReason::SiblingFailed);
                        }

                        result.fail(error);
                    }
                }

                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let collect = collect.lock().take();

                    if let Some(collect) = collect {
                        result.complete(collect());
                    }
                }
            }));
        }

        for member in members.iter() {
            ctx.run_core(member.clone());
        }

        Ok(result.into_promise())
    })
    .tagged(TaskType::Par)
}

/// Per-member outcomes of a best-effort join, in input order.
#[derive(Debug, Clone)]
pub struct ParResults<T> {
    outcomes: Vec<Result<T>>,
}

impl<T: Value> ParResults<T> {
    /// Returns every member's outcome.
    pub fn outcomes(&self) -> &[Result<T>] {
        &self.outcomes
    }

    /// Returns the values of the members that succeeded, in input order.
    pub fn successful(&self) -> Vec<T> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok().cloned())
            .collect()
    }

    /// Returns the errors of the members that failed, in input order.
    pub fn failures(&self) -> Vec<Error> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err().cloned())
            .collect()
    }

    /// Returns `true` if any member failed.
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.is_err())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn into_outcomes(self) -> Vec<Result<T>> {
        self.outcomes
    }
}

/// A best-effort join over a list of tasks of the same type.
///
/// Dereferences to the joining [`Task`], which is what gets run.
#[derive(Debug, Clone)]
pub struct ParTask<T: Value> {
    tasks: Vec<Task<T>>,
    join: Task<ParResults<T>>,
}

impl<T: Value> ParTask<T> {
    /// Returns the member tasks, in input order.
    pub fn tasks(&self) -> &[Task<T>] {
        &self.tasks
    }

    /// Returns the joining task.
    pub fn task(&self) -> &Task<ParResults<T>> {
        &self.join
    }

    pub fn into_task(self) -> Task<ParResults<T>> {
        self.join
    }
}

impl<T: Value> Deref for ParTask<T> {
    type Target = Task<ParResults<T>>;

    fn deref(&self) -> &Self::Target {
        &self.join
    }
}

/// Runs every task concurrently and joins their outcomes.
///
/// The join never fails because of a member: it waits until every member
/// reached a terminal state and succeeds with the ordered outcomes. An empty
/// list yields an immediately successful, empty result.
///
/// # Examples
///
/// ```rust,ignore
/// let all = strand::par::par(vec![a, b, c]);
/// let results = engine.block_on(&all)?;
/// let values = results.successful();
/// ```
pub fn par<T, I>(tasks: I) -> ParTask<T>
where
    T: Value,
    I: IntoIterator<Item = Task<T>>,
{
    let tasks: Vec<Task<T>> = tasks.into_iter().collect();
    let members = tasks.iter().map(Task::core).collect();
    let handles = tasks.clone();

    let join = fan_in("par", members, JoinMode::BestEffort, move || {
        Ok(ParResults {
            outcomes: handles.iter().map(Task::get).collect(),
        })
    });

    ParTask { tasks, join }
}
