//! Fused combinators: synchronous steps applied to a task's outcome.
//!
//! All of them are built on [`Task::apply`]. The resulting task is fused: when
//! it is activated and its source is a fused task that has not started yet,
//! the source runs inline in the same activation instead of being scheduled.
//! Applied along a chain, `Task::value(..).map(..).map(..).recover(..)` costs a
//! single scheduling round while every step still settles its own promise.
//! The chain is unrolled by [`Context`](crate::Context) in a loop, so its
//! length does not grow the stack.

use crate::error::{Error, Result};
use crate::promise::{Promise, SettablePromise, Value};
use crate::task::{Task, TaskType};

use std::panic::{AssertUnwindSafe, catch_unwind};

impl<T: Value> Task<T> {
    /// Builds a fused task whose outcome is computed by `propagator` from
    /// this task's outcome.
    ///
    /// The propagator receives the source outcome and the new task's result
    /// cell and must resolve the latter. A panicking propagator fails the new
    /// task.
    pub fn apply<R, F>(&self, desc: impl Into<String>, propagator: F) -> Task<R>
    where
        R: Value,
        F: FnOnce(Result<T>, &SettablePromise<R>) + Send + 'static,
    {
        let source = self.clone();

        Task::from_work(
            desc,
            Box::new(move |ctx| {
                let result = Promise::settable();
                let dst = result.clone();

                source.add_listener(move |src| {
                    let outcome = src.get();

                    if let Err(payload) =
                        catch_unwind(AssertUnwindSafe(|| propagator(outcome, &dst)))
                    {
                        dst.fail(Error::from_panic(payload));
                    }
                });

                ctx.run_or_inline(source.core());
                Ok(result.into_promise())
            }),
            true,
        )
    }

    /// Transforms a successful value. Failures propagate unchanged.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let length = Task::value("greeting", "hello".to_string())
    ///     .map("length", |s| s.len());
    /// ```
    pub fn map<R, F>(&self, desc: impl Into<String>, f: F) -> Task<R>
    where
        R: Value,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.apply(desc, move |outcome, dst| {
            dst.complete(outcome.map(f));
        })
    }

    /// Runs `consumer` on a successful value and keeps the value.
    ///
    /// An error returned by the consumer fails the new task.
    pub fn and_then<F>(&self, desc: impl Into<String>, consumer: F) -> Task<T>
    where
        F: FnOnce(&T) -> Result<()> + Send + 'static,
    {
        self.apply(desc, move |outcome, dst| {
            dst.complete(outcome.and_then(|value| {
                consumer(&value)?;
                Ok(value)
            }));
        })
    }

    /// Replaces an ordinary failure with the value computed by `f`.
    ///
    /// Cancellations bypass `f`. An error returned by `f` fails the new
    /// task.
    pub fn recover<F>(&self, desc: impl Into<String>, f: F) -> Task<T>
    where
        F: FnOnce(Error) -> Result<T> + Send + 'static,
    {
        self.apply(desc, move |outcome, dst| match outcome {
            Err(error) if !error.is_cancellation() => {
                dst.complete(f(error));
            }
            outcome => {
                dst.complete(outcome);
            }
        })
        .tagged(TaskType::Recover)
    }

    /// Runs `consumer` on an ordinary failure, keeping the outcome as is.
    ///
    /// The consumer is diagnostic only: an error it returns, or a panic, is
    /// logged and discarded.
    pub fn on_failure<F>(&self, desc: impl Into<String>, consumer: F) -> Task<T>
    where
        F: FnOnce(&Error) -> Result<()> + Send + 'static,
    {
        let desc = desc.into();
        let name = desc.clone();

        self.apply(desc, move |outcome, dst| {
            if let Err(error) = &outcome {
                if !error.is_cancellation() {
                    match catch_unwind(AssertUnwindSafe(|| consumer(error))) {
                        Ok(Ok(())) => {}
                        Ok(Err(failure)) => {
                            tracing::error!(task.name = %name, error = %failure, "failure consumer returned an error");
                        }
                        Err(payload) => {
                            let failure = Error::from_panic(payload);
                            tracing::error!(task.name = %name, error = %failure, "failure consumer panicked");
                        }
                    }
                }
            }

            dst.complete(outcome);
        })
    }

    /// Materializes the outcome as a value.
    ///
    /// The new task succeeds with `Ok(value)` or `Err(error)`, except for
    /// cancellations which still fail it.
    pub fn to_try(&self, desc: impl Into<String>) -> Task<Result<T>> {
        self.apply(desc, |outcome, dst| match outcome {
            Err(error) if error.is_cancellation() => {
                dst.fail(error);
            }
            outcome => {
                dst.done(outcome);
            }
        })
    }

    /// Maps both outcomes through `f`. Cancellations bypass `f`.
    pub fn transform<R, F>(&self, desc: impl Into<String>, f: F) -> Task<R>
    where
        R: Value,
        F: FnOnce(Result<T>) -> Result<R> + Send + 'static,
    {
        self.apply(desc, move |outcome, dst| match outcome {
            Err(error) if error.is_cancellation() => {
                dst.fail(error);
            }
            outcome => {
                dst.complete(f(outcome));
            }
        })
        .tagged(TaskType::Transform)
    }
}
