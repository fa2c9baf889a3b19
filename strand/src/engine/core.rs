use super::current;
use super::queue::{Injector, ReadyQueue};
use super::timer::TimerHandle;
use super::worker::Worker;
use crate::error::{CancelReason, Error, Result};
use crate::promise::Value;
use crate::scheduler::{Activation, Scheduler};
use crate::task::Task;

use parking_lot::Mutex;

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// State shared by the engine handle, its workers and its timer thread.
///
/// This is the [`Scheduler`] every task run by the engine talks to.
pub(crate) struct Shared {
    /// Distinguishes engines in the worker thread-local.
    pub(crate) id: usize,

    pub(crate) injector: Arc<Injector>,

    /// One local queue per worker.
    pub(crate) locals: Vec<ReadyQueue>,

    timer: TimerHandle,
}

impl Scheduler for Shared {
    fn schedule(&self, activation: Activation) {
        let rejected = match current::worker_index(self.id) {
            Some(worker) => self.locals[worker].push(activation).map(|()| self.injector.notify()),
            None => self.injector.push(activation),
        };

        if let Err(activation) = rejected {
            activation.cancel(CancelReason::Shutdown);
        }
    }

    fn schedule_after(&self, delay: Duration, activation: Activation) {
        if self.injector.is_shutdown() {
            activation.cancel(CancelReason::Shutdown);
            return;
        }

        if let Err(activation) = self.timer.set_timer(delay, activation) {
            activation.cancel(CancelReason::Shutdown);
        }
    }
}

/// A multi-threaded engine running tasks.
///
/// `Engine` owns a set of worker threads sharing priority-ordered ready
/// queues, plus a timer thread for delayed activations. Tasks started with
/// [`run`](Self::run) or [`block_on`](Self::block_on) schedule their
/// children on the same engine.
///
/// Dropping the engine shuts it down: activations that did not start yet
/// fail with [`CancelReason::Shutdown`].
pub struct Engine {
    shared: Arc<Shared>,

    /// Worker and timer threads. Empty once shut down.
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub(crate) fn new(worker_threads: usize, thread_name: String) -> Self {
        static NEXT_ENGINE_ID: AtomicUsize = AtomicUsize::new(0);

        let injector = Arc::new(Injector::new());
        let (timer, timer_thread) =
            TimerHandle::start(injector.clone(), format!("{thread_name}-timer"));

        let shared = Arc::new(Shared {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            injector,
            locals: (0..worker_threads).map(|_| ReadyQueue::new()).collect(),
            timer,
        });

        let mut threads = Vec::with_capacity(worker_threads + 1);
        threads.push(timer_thread);

        for id in 0..worker_threads {
            let worker = Worker::new(id, shared.clone());

            let handle = thread::Builder::new()
                .name(format!("{thread_name}-{id}"))
                .spawn(move || worker.run());

            match handle {
                Ok(handle) => threads.push(handle),
                Err(error) => panic!("failed to spawn worker thread: {error}"),
            }
        }

        tracing::info!(engine = shared.id, worker_threads, "engine started");

        Self {
            shared,
            threads: Mutex::new(threads),
        }
    }

    /// Starts `task` as a root task.
    ///
    /// Does nothing if the task already started. After shutdown the task is
    /// cancelled instead.
    pub fn run<T: Value>(&self, task: &Task<T>) {
        self.shared
            .schedule(Activation::new(task.core(), None, Vec::new()));
    }

    /// Starts `task` and blocks the current thread until it finished.
    ///
    /// Must not be called from inside a task running on this engine.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let engine = EngineBuilder::new().build();
    /// let answer = engine.block_on(&Task::value("answer", 42))?;
    /// assert_eq!(answer, 42);
    /// ```
    pub fn block_on<T: Value>(&self, task: &Task<T>) -> Result<T> {
        let (transmitter, receiver) = mpsc::channel();

        task.add_listener(move |promise| {
            let _ = transmitter.send(promise.get());
        });

        self.run(task);

        receiver
            .recv()
            .unwrap_or(Err(Error::Cancelled(CancelReason::Shutdown)))
    }

    /// Returns the engine's scheduler.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.shared.clone()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shared.injector.is_shutdown()
    }

    /// Stops the engine.
    ///
    /// This performs the following steps:
    /// 1. Closes every queue, so later scheduling requests are cancelled
    /// 2. Stops the timer thread, cancelling armed timers
    /// 3. Cancels activations that were still queued
    /// 4. Joins all threads
    ///
    /// Tasks already running are not interrupted. Calling `shutdown` more
    /// than once is a no-op.
    pub fn shutdown(&self) {
        let threads = mem::take(&mut *self.threads.lock());

        if threads.is_empty() {
            return;
        }

        let mut pending = self.shared.injector.shutdown();
        for local in &self.shared.locals {
            pending.extend(local.close());
        }

        self.shared.timer.shutdown();

        tracing::info!(engine = self.shared.id, pending = pending.len(), "engine shutting down");

        for activation in pending {
            activation.cancel(CancelReason::Shutdown);
        }

        let current = thread::current().id();
        for handle in threads {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
