use crate::error::{Error, Result};
use crate::promise::{Promise, Value};
use crate::task::{Task, TaskType};

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

/// A unit of blocking work handed to a [`BlockingExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking jobs away from the engine's threads.
///
/// Implementations must either run the job on another thread eventually or
/// return an error. Running it synchronously on the calling thread, or
/// dropping it silently, stalls or loses the task waiting for it.
pub trait BlockingExecutor: Send + Sync {
    /// Accepts `job` for execution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] when the job cannot be accepted.
    fn execute(&self, job: Job) -> Result<()>;
}

/// Runs every job on a freshly spawned, named OS thread.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    name: String,
}

impl ThreadSpawner {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new("strand-blocking")
    }
}

impl BlockingExecutor for ThreadSpawner {
    fn execute(&self, job: Job) -> Result<()> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(job)
            .map(drop)
            .map_err(|error: io::Error| Error::Rejected(error.to_string()))
    }
}

impl<T: Value> Task<T> {
    /// Creates a task that runs `callable` on `executor`.
    ///
    /// The task stays running until the job finished. A rejected job fails
    /// the task with the executor's error; a panicking job fails it with
    /// [`Error::Panicked`]. The job is not interrupted if the task is
    /// cancelled; its result is discarded.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let executor = Arc::new(ThreadSpawner::default());
    /// let contents = Task::blocking("read config", || Ok(std::fs::read_to_string("app.toml")?), executor);
    /// ```
    pub fn blocking<F>(
        name: impl Into<String>,
        callable: F,
        executor: Arc<dyn BlockingExecutor>,
    ) -> Task<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Task::with_context(name, move |_| {
            let result = Promise::settable();
            let dst = result.clone();

            executor.execute(Box::new(move || {
                let outcome = catch_unwind(AssertUnwindSafe(callable))
                    .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

                dst.complete(outcome);
            }))?;

            Ok(result.into_promise())
        })
        .tagged(TaskType::Blocking)
    }
}
