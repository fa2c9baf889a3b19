use crate::combinator::IntoTask;
use crate::context::Context;
use crate::error::Error;
use crate::promise::{Promise, SettablePromise, Value};
use crate::task::{Task, TaskType};

use parking_lot::Mutex;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start the next attempt right away.
    Retry,

    /// Start the next attempt once the delay elapsed.
    RetryAfter(Duration),

    /// Stop and fail with the last attempt's error.
    GiveUp,
}

/// Decides whether a failed attempt is retried.
///
/// The policy is consulted with the number of attempts made so far
/// (starting at 1 after the first failure) and the error of the latest
/// attempt. Cancellations are never shown to the policy.
pub trait RetryPolicy: Send + 'static {
    fn decide(&mut self, attempts: u32, error: &Error) -> RetryDecision;
}

impl<F> RetryPolicy for F
where
    F: FnMut(u32, &Error) -> RetryDecision + Send + 'static,
{
    fn decide(&mut self, attempts: u32, error: &Error) -> RetryDecision {
        self(attempts, error)
    }
}

/// Retries any failure up to a fixed number of times.
///
/// # Examples
///
/// ```rust,ignore
/// let policy = LimitedRetries::new(3).with_backoff(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LimitedRetries {
    retries: u32,
    backoff: Option<Duration>,
}

impl LimitedRetries {
    /// Allows `retries` attempts after the first one.
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: None,
        }
    }

    /// Waits `backoff` before every retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }
}

impl RetryPolicy for LimitedRetries {
    fn decide(&mut self, attempts: u32, _error: &Error) -> RetryDecision {
        if attempts > self.retries {
            return RetryDecision::GiveUp;
        }

        match self.backoff {
            Some(backoff) => RetryDecision::RetryAfter(backoff),
            None => RetryDecision::Retry,
        }
    }
}

struct Retry<P, F> {
    name: String,
    policy: Mutex<P>,
    supplier: Mutex<F>,
}

impl<P, F, I> Retry<P, F>
where
    P: RetryPolicy,
    F: FnMut(u32) -> I + Send + 'static,
    I: IntoTask,
{
    /// Builds and starts attempt `attempt` (0-based) after `delay`.
    fn attempt(
        self: Arc<Self>,
        context: Context,
        attempt: u32,
        delay: Option<Duration>,
        result: SettablePromise<I::Value>,
    ) {
        let built = catch_unwind(AssertUnwindSafe(|| {
            let mut supplier = self.supplier.lock();
            (*supplier)(attempt).into_task(&self.name)
        }))
        .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

        // A supplier that cannot build a task counts as a failed attempt.
        let task = built.unwrap_or_else(|error| Task::failure(self.name.clone(), error));

        let retry = self.clone();
        let ctx = context.clone();

        task.add_listener(move |src| {
            let error = match src.get() {
                Ok(value) => {
                    result.done(value);
                    return;
                }
                Err(error) => error,
            };

            if error.is_cancellation() {
                result.fail(error);
                return;
            }

            let attempts = attempt + 1;
            let decision = retry.policy.lock().decide(attempts, &error);

            tracing::debug!(task.name = %retry.name, attempt = attempts, %error, ?decision, "attempt failed");

            match decision {
                RetryDecision::Retry => retry.attempt(ctx, attempts, None, result),
                RetryDecision::RetryAfter(delay) => {
                    retry.attempt(ctx, attempts, Some(delay), result)
                }
                RetryDecision::GiveUp => {
                    result.fail(error);
                }
            }
        });

        match delay {
            Some(delay) => context.create_timer(delay, &task),
            None => context.run(&task),
        }
    }
}

impl<T: Value> Task<T> {
    /// Runs the task built by `supplier` and retries it under `policy`.
    ///
    /// `supplier` receives the 0-based attempt number. Each attempt runs as
    /// a child of the returned task. A failed attempt is reported to the
    /// policy, which decides whether to retry, possibly after a delay; when
    /// it gives up the returned task fails with the last attempt's error.
    /// Cancelled attempts are never retried.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let task = Task::with_retry_policy("fetch", LimitedRetries::new(2), |attempt| {
    ///     fetch(attempt)
    /// });
    /// ```
    pub fn with_retry_policy<P, F, I>(name: impl Into<String>, policy: P, supplier: F) -> Task<T>
    where
        P: RetryPolicy,
        F: FnMut(u32) -> I + Send + 'static,
        I: IntoTask<Value = T>,
    {
        let name = name.into();

        let retry = Arc::new(Retry {
            name: name.clone(),
            policy: Mutex::new(policy),
            supplier: Mutex::new(supplier),
        });

        Task::with_context(name, move |ctx| {
            let result = Promise::settable();
            retry.attempt(ctx.clone(), 0, None, result.clone());

            Ok(result.into_promise())
        })
        .tagged(TaskType::WithRetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_retries_gives_up_after_budget() {
        let mut policy = LimitedRetries::new(2);
        let error = Error::msg("nope");

        assert_eq!(policy.decide(1, &error), RetryDecision::Retry);
        assert_eq!(policy.decide(2, &error), RetryDecision::Retry);
        assert_eq!(policy.decide(3, &error), RetryDecision::GiveUp);
    }

    #[test]
    fn backoff_turns_retries_into_delayed_retries() {
        let mut policy = LimitedRetries::new(1).with_backoff(Duration::from_millis(5));
        let error = Error::msg("nope");

        assert_eq!(
            policy.decide(1, &error),
            RetryDecision::RetryAfter(Duration::from_millis(5))
        );
    }

    #[test]
    fn closures_are_policies() {
        let mut policy = |attempts: u32, error: &Error| {
            if attempts < 2 && !error.is_timeout() {
                RetryDecision::Retry
            } else {
                RetryDecision::GiveUp
            }
        };

        assert_eq!(policy.decide(1, &Error::msg("x")), RetryDecision::Retry);
        assert_eq!(policy.decide(2, &Error::msg("x")), RetryDecision::GiveUp);
    }
}
