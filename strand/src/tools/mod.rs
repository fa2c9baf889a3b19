//! Adapters bridging tasks to the outside world.
//!
//! - [`retry`]: re-running a task-producing function under a
//!   [`RetryPolicy`],
//! - [`blocking`]: handing blocking work to a [`BlockingExecutor`],
//! - [`future`]: driving a [`Future`](std::future::Future) as a task.

pub mod blocking;
pub mod future;
pub mod retry;

mod waker;

#[doc(inline)]
pub use blocking::{BlockingExecutor, Job, ThreadSpawner};

#[doc(inline)]
pub use retry::{LimitedRetries, RetryDecision, RetryPolicy};
