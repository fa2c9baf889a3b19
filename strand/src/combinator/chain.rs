//! Combinators continuing with another task.

use super::IntoTask;
use crate::error::{Error, Result};
use crate::promise::{Promise, Value};
use crate::task::{Task, TaskType};

use std::panic::{AssertUnwindSafe, catch_unwind};

/// What a continuation decided once the source finished.
enum Next<R> {
    /// Settle with this outcome.
    Settle(Result<R>),

    /// Run this task and settle with its outcome.
    Run(Task<R>),
}

/// Builds a task that runs `source`, hands its outcome to `step` and then
/// either settles directly or continues with the task `step` produced.
///
/// The continuation task is a child of the new task.
fn continue_with<T, R, F>(
    source: &Task<T>,
    name: String,
    task_type: TaskType,
    step: F,
) -> Task<R>
where
    T: Value,
    R: Value,
    F: FnOnce(Result<T>, &str) -> Next<R> + Send + 'static,
{
    let source = source.clone();
    let desc = name.clone();

    Task::with_context(name, move |ctx| {
        let result = Promise::settable();
        let dst = result.clone();
        let context = ctx.clone();

        source.add_listener(move |src| {
            let outcome = src.get();

            let next = catch_unwind(AssertUnwindSafe(|| step(outcome, &desc)))
                .unwrap_or_else(|payload| Next::Settle(Err(Error::from_panic(payload))));

            match next {
                Next::Settle(outcome) => {
                    dst.complete(outcome);
                }
                Next::Run(task) => {
                    task.promise().propagate_to(&dst);
                    context.run(&task);
                }
            }
        });

        ctx.run_or_inline(source.core());
        Ok(result.into_promise())
    })
    .tagged(task_type)
}

impl<R: Value> Task<Task<R>> {
    /// Collapses a task producing a task into a task producing the inner
    /// task's value.
    ///
    /// The outer task runs first; its value is then run as a child. An outer
    /// failure fails the new task without running anything else.
    pub fn flatten(&self, desc: impl Into<String>) -> Task<R> {
        continue_with(self, desc.into(), TaskType::Flatten, |outcome, _| {
            match outcome {
                Ok(inner) => Next::Run(inner),
                Err(error) => Next::Settle(Err(error)),
            }
        })
    }
}

impl<T: Value> Task<T> {
    /// Continues a successful value with the task returned by `f`.
    ///
    /// Failures propagate without calling `f`. A missing task fails the new
    /// task with [`Error::Construction`].
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let user = Task::value("id", 42).flat_map("fetch user", |id| fetch_user(id));
    /// ```
    pub fn flat_map<I, F>(&self, desc: impl Into<String>, f: F) -> Task<I::Value>
    where
        I: IntoTask,
        F: FnOnce(T) -> I + Send + 'static,
    {
        let desc = desc.into();
        let name = desc.clone();

        let mapped = self.apply(format!("map: {desc}"), move |outcome, dst| {
            dst.complete(outcome.and_then(|value| f(value).into_task(&name)));
        });

        mapped.flatten(desc)
    }

    /// Runs `task` once this task finished, whatever its outcome, and
    /// completes with `task`'s outcome.
    ///
    /// If `task` completes before this task starts, this task is cancelled
    /// and never runs.
    pub fn and_then_task<R: Value>(&self, desc: impl Into<String>, task: &Task<R>) -> Task<R> {
        let that = self.clone();
        let next = task.clone();

        Task::with_context(desc, move |ctx| {
            let result = Promise::settable();

            ctx.after(&that).run(&next);
            next.promise().propagate_to(&result);
            ctx.run(&that);

            Ok(result.into_promise())
        })
    }

    /// Replaces an ordinary failure with the outcome of the task returned by
    /// `f`.
    ///
    /// Cancellations bypass `f`.
    pub fn recover_with<I, F>(&self, desc: impl Into<String>, f: F) -> Task<T>
    where
        I: IntoTask<Value = T>,
        F: FnOnce(Error) -> I + Send + 'static,
    {
        continue_with(self, desc.into(), TaskType::WithRecover, |outcome, desc| {
            match outcome {
                Err(error) if !error.is_cancellation() => match f(error).into_task(desc) {
                    Ok(task) => Next::Run(task),
                    Err(error) => Next::Settle(Err(error)),
                },
                outcome => Next::Settle(outcome),
            }
        })
    }

    /// Continues either outcome with the task returned by `f`.
    ///
    /// Cancellations bypass `f`.
    pub fn transform_with<I, F>(&self, desc: impl Into<String>, f: F) -> Task<I::Value>
    where
        I: IntoTask,
        F: FnOnce(Result<T>) -> I + Send + 'static,
    {
        continue_with(self, desc.into(), TaskType::WithTransform, |outcome, desc| {
            match outcome {
                Err(error) if error.is_cancellation() => Next::Settle(Err(error)),
                outcome => match f(outcome).into_task(desc) {
                    Ok(task) => Next::Run(task),
                    Err(error) => Next::Settle(Err(error)),
                },
            }
        })
    }
}
