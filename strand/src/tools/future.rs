use super::waker::make_waker;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::promise::{Promise, SettablePromise, Value};
use crate::task::{Task, TaskType};

use parking_lot::Mutex;

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Drives a future on behalf of a task.
///
/// Each wake schedules one poll through the owning task's context, so
/// polling happens on engine threads like any other work.
pub(crate) struct FutureDriver<T> {
    name: String,

    /// `None` once the future completed or was abandoned.
    future: Mutex<Option<BoxFuture<T>>>,

    result: SettablePromise<T>,
    context: Context,

    /// Set while a poll is queued, so that a burst of wakes costs one poll.
    queued: AtomicBool,
}

impl<T: Value> FutureDriver<T> {
    pub(crate) fn wake(self: Arc<Self>) {
        if self.queued.swap(true, Ordering::AcqRel) {
            return;
        }

        let driver = self.clone();
        let poll = Task::action(format!("poll: {}", self.name), move || {
            driver.poll();
            Ok(())
        })
        .hidden(TaskType::Future);

        self.context.run_side_effect(&poll);
    }

    fn poll(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);

        let mut slot = self.future.lock();

        // The owning task finished (cancelled or timed out): drop the future.
        if self.context.is_cancelled() {
            slot.take();
            return;
        }

        let Some(future) = slot.as_mut() else {
            return;
        };

        let waker = make_waker(self.clone());
        let mut cx = std::task::Context::from_waker(&waker);

        let outcome = match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => return,
            Ok(Poll::Ready(outcome)) => outcome,
            Err(payload) => Err(Error::from_panic(payload)),
        };

        slot.take();
        drop(slot);

        self.result.complete(outcome);
    }
}

impl<T: Value> Task<T> {
    /// Creates a task that completes with the output of the future returned
    /// by `make`.
    ///
    /// The future is built when the task starts and is polled on engine
    /// threads: once right away, then once per wake. It must not block.
    /// Cancelling the task drops the future at its next poll.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let task = Task::from_future("answer", || async { Ok(42) });
    /// ```
    pub fn from_future<F, Fut>(name: impl Into<String>, make: F) -> Task<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let name = name.into();
        let desc = name.clone();

        Task::with_context(name, move |ctx| {
            let result = Promise::settable();

            let driver = Arc::new(FutureDriver {
                name: desc,
                future: Mutex::new(Some(Box::pin(make()))),
                result: result.clone(),
                context: ctx.clone(),
                queued: AtomicBool::new(false),
            });

            driver.poll();

            Ok(result.into_promise())
        })
        .tagged(TaskType::Future)
    }
}
