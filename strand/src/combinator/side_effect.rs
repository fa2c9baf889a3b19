//! Detached branches and shared tasks.
//!
//! A side effect is started through [`Context::run_side_effect`]: it is not
//! pruned when the task that started it finishes, and its outcome never
//! reaches that task.
//!
//! [`Context::run_side_effect`]: crate::Context::run_side_effect

use super::IntoTask;
use crate::error::Error;
use crate::promise::{Promise, Value};
use crate::task::{Task, TaskType};

use std::panic::{AssertUnwindSafe, catch_unwind};

impl<T: Value> Task<T> {
    /// Starts the task returned by `f` as a side effect once this task
    /// succeeded.
    ///
    /// The new task completes with this task's outcome as soon as the side
    /// effect has been started; the side effect's own outcome is ignored.
    /// Nothing is started on failure or cancellation.
    ///
    /// If `f` fails to produce a task, the new task fails with that error.
    /// See [`Task::with_safe_side_effect`] for a variant that never affects
    /// the main outcome.
    pub fn with_side_effect<I, F>(&self, desc: impl Into<String>, f: F) -> Task<T>
    where
        I: IntoTask,
        F: FnOnce(&T) -> I + Send + 'static,
    {
        self.side_effect_after(desc.into(), f, false)
    }

    /// Like [`Task::with_side_effect`], but a failure to produce the side
    /// task is confined to the side branch.
    pub fn with_safe_side_effect<I, F>(&self, desc: impl Into<String>, f: F) -> Task<T>
    where
        I: IntoTask,
        F: FnOnce(&T) -> I + Send + 'static,
    {
        self.side_effect_after(desc.into(), f, true)
    }

    fn side_effect_after<I, F>(&self, desc: String, f: F, safe: bool) -> Task<T>
    where
        I: IntoTask,
        F: FnOnce(&T) -> I + Send + 'static,
    {
        let that = self.clone();
        let name = desc.clone();

        Task::with_context(desc, move |ctx| {
            let result = Promise::settable();
            let dst = result.clone();
            let context = ctx.clone();

            that.add_listener(move |src| {
                if let Ok(value) = src.get() {
                    let side = catch_unwind(AssertUnwindSafe(|| f(&value).into_task(&name)))
                        .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

                    match side {
                        Ok(side) => context.run_side_effect(&side),
                        Err(error) if safe => {
                            tracing::warn!(task.name = %name, %error, "side effect could not be built");
                            context.run_side_effect(&Task::<I::Value>::failure(name, error));
                        }
                        Err(error) => {
                            dst.fail(error);
                            return;
                        }
                    }
                }

                dst.complete(src.get());
            });

            ctx.run_or_inline(that.core());
            Ok(result.into_promise())
        })
        .tagged(TaskType::WithSideEffect)
    }

    /// Returns a task that completes with this task's outcome but whose
    /// cancellation never reaches this task.
    ///
    /// Each plan that wants to use one task instance should go through its
    /// own shareable wrapper.
    pub fn shareable(&self) -> Task<T> {
        let that = self.clone();

        Task::with_context("shareable", move |ctx| {
            ctx.run_side_effect(&that);
            Ok(that.promise())
        })
        .hidden(TaskType::Shareable)
    }
}

impl Task<()> {
    /// Creates a task that starts the task returned by `f` as a side effect
    /// and succeeds immediately.
    pub fn side_effect<I, F>(desc: impl Into<String>, f: F) -> Task<()>
    where
        I: IntoTask,
        F: FnOnce() -> I + Send + 'static,
    {
        let desc = desc.into();
        let name = desc.clone();

        Task::with_context(desc, move |ctx| {
            let side = f().into_task(&name)?;
            ctx.run_side_effect(&side);

            Ok(Promise::resolved(()))
        })
        .tagged(TaskType::WithSideEffect)
    }
}
