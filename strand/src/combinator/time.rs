//! Time-based combinators.

use crate::error::{CancelReason, Error};
use crate::promise::{Promise, Value};
use crate::task::{Task, TaskType, priority};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

impl<T: Value> Task<T> {
    /// Races this task against a timer.
    ///
    /// If this task finishes first the new task completes with its outcome.
    /// If the timer fires first, this task is cancelled with
    /// [`CancelReason::Timeout`] and the new task fails with
    /// [`Error::Timeout`]. A single commit flag decides the winner.
    ///
    /// The guarded task and the timer run at [`priority::MAX`] so that a
    /// backlog of lower-priority work does not eat into the budget.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let guarded = fetch.with_timeout("fetch with timeout", Duration::from_millis(200));
    /// ```
    pub fn with_timeout(&self, desc: impl Into<String>, timeout: Duration) -> Task<T> {
        let that = self.clone();
        let desc = desc.into();
        let message = format!("{desc} did not complete within {timeout:?}");

        let task = Task::with_context(desc, move |ctx| {
            let committed = Arc::new(AtomicBool::new(false));
            let result = Promise::settable();

            let timer = {
                let committed = committed.clone();
                let result = result.clone();
                let that = that.clone();

                Task::action("timeoutTimer", move || {
                    if committed
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        tracing::debug!(task.id = %that.id(), task.name = %that.name(), ?timeout, "task timed out");

                        that.cancel_with(CancelReason::Timeout);
                        result.fail(Error::Timeout(message));
                    }

                    Ok(())
                })
                .hidden(TaskType::Timeout)
            };

            timer.set_priority(priority::MAX);
            ctx.create_timer(timeout, &timer);

            {
                let result = result.clone();

                that.add_listener(move |src| {
                    if committed
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        result.complete(src.get());
                    }
                });
            }

            that.set_priority(priority::MAX);
            ctx.run(&that);

            Ok(result.into_promise())
        })
        .tagged(TaskType::WithTimeout);

        task.set_priority(self.priority());
        task
    }

    /// Runs this task once `delay` has elapsed and completes with its
    /// outcome.
    ///
    /// The new task inherits this task's priority; the delayed task keeps
    /// its own.
    pub fn with_delay(&self, desc: impl Into<String>, delay: Duration) -> Task<T> {
        let that = self.clone();

        let task = Task::with_context(desc, move |ctx| {
            ctx.create_timer(delay, &that);
            Ok(that.promise())
        })
        .tagged(TaskType::WithDelay);

        task.set_priority(self.priority());
        task
    }
}
