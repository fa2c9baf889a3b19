//! Write-once result cells.
//!
//! A [`Promise`] decouples the producer of a value from its consumers. It is
//! resolved at most once, either with a value or with an [`Error`], and keeps an
//! ordered list of listeners that run exactly once when the outcome is known.
//!
//! The write half is [`SettablePromise`]. Resolution races between threads are
//! arbitrated by a single compare-and-exchange on the promise state: the first
//! writer wins and every later attempt is a no-op returning `false`.
//!
//! Listeners run synchronously on the resolving thread, in registration order.
//! Registering a listener on a resolved promise runs it before
//! [`Promise::add_listener`] returns, so listener code must not block.
//!
//! A promise resolved from inside a listener notifies its own listeners once
//! the current listener batch is done, still before the outermost resolution
//! returns. Long chains of dependent promises therefore settle without
//! growing the stack.

mod notify;
mod state;

use crate::error::{Error, Result};
use state::{COMPLETING, PENDING, RESOLVED};

use parking_lot::Mutex;

use std::fmt;
use std::ops::Deref;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Types that can flow through promises and tasks.
///
/// Outcomes are shared by every consumer, so values are cloned on read.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

type Listener<T> = Box<dyn FnOnce(&Promise<T>) + Send>;

struct Inner<T> {
    /// Arbitrates concurrent resolution attempts.
    state: AtomicU8,

    /// The outcome, written once by the winning resolver.
    outcome: OnceLock<Result<T>>,

    /// Pending listeners. `None` once the queue has been drained.
    listeners: Mutex<Option<Vec<Listener<T>>>>,
}

/// The read half of a write-once result cell.
///
/// Cloning a `Promise` yields another handle to the same cell.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Promise<T> {
    /// Creates an unresolved promise together with its write half.
    pub fn settable() -> SettablePromise<T> {
        SettablePromise {
            promise: Promise {
                inner: Arc::new(Inner {
                    state: AtomicU8::new(PENDING),
                    outcome: OnceLock::new(),
                    listeners: Mutex::new(Some(Vec::new())),
                }),
            },
        }
    }

    /// Creates a promise already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let promise = Self::settable();
        promise.done(value);
        promise.into_promise()
    }

    /// Creates a promise already failed with `error`.
    pub fn failed(error: Error) -> Self {
        let promise = Self::settable();
        promise.fail(error);
        promise.into_promise()
    }

    /// Returns `true` once the promise holds an outcome.
    pub fn is_done(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    /// Returns `true` if the promise resolved with an error.
    pub fn is_failed(&self) -> bool {
        matches!(self.inner.outcome.get(), Some(Err(_)))
    }

    /// Returns the outcome.
    ///
    /// Reading a pending promise yields [`Error::Unresolved`].
    pub fn get(&self) -> Result<T> {
        match self.inner.outcome.get() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::Unresolved),
        }
    }

    /// Returns the value if the promise resolved successfully.
    pub fn value(&self) -> Option<T> {
        match self.inner.outcome.get() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the error if the promise failed.
    pub fn error(&self) -> Option<Error> {
        match self.inner.outcome.get() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Registers a completion listener.
    ///
    /// The listener runs once, synchronously, when the promise resolves. If the
    /// promise is already resolved it runs immediately, before this call
    /// returns.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&Promise<T>) + Send + 'static,
    {
        let mut listeners = self.inner.listeners.lock();

        if let Some(queue) = listeners.as_mut() {
            queue.push(Box::new(listener));
            return;
        }

        drop(listeners);
        self.notify(Box::new(listener));
    }

    /// Forwards this promise's outcome to `dst` once it is known.
    pub fn propagate_to(&self, dst: &SettablePromise<T>) {
        let dst = dst.clone();
        self.add_listener(move |src| {
            dst.complete(src.get());
        });
    }

    /// Returns `true` if both handles point to the same cell.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn resolve(&self, outcome: Result<T>) -> bool {
        if self
            .inner
            .state
            .compare_exchange(PENDING, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let _ = self.inner.outcome.set(outcome);
        self.inner.state.store(RESOLVED, Ordering::Release);

        let listeners = self.inner.listeners.lock().take().unwrap_or_default();

        if !listeners.is_empty() {
            let promise = self.clone();
            notify::deliver(Box::new(move || {
                for listener in listeners {
                    promise.notify(listener);
                }
            }));
        }

        true
    }

    /// Runs one listener, containing panics so the remaining listeners
    /// still observe the outcome.
    fn notify(&self, listener: Listener<T>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(self))) {
            tracing::error!(
                error = %Error::from_panic(payload),
                "promise listener panicked"
            );
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.outcome.get() {
            None => "pending",
            Some(Ok(_)) => "done",
            Some(Err(_)) => "failed",
        };

        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// The write half of a promise.
///
/// Dereferences to the [`Promise`] it resolves, so it can be read and
/// listened to directly.
pub struct SettablePromise<T> {
    promise: Promise<T>,
}

impl<T> Clone for SettablePromise<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T: Value> SettablePromise<T> {
    /// Resolves the promise with a value.
    ///
    /// Returns `false` if the promise was already resolved; the earlier
    /// outcome is kept.
    pub fn done(&self, value: T) -> bool {
        self.promise.resolve(Ok(value))
    }

    /// Resolves the promise with an error.
    ///
    /// Returns `false` if the promise was already resolved.
    pub fn fail(&self, error: Error) -> bool {
        self.promise.resolve(Err(error))
    }

    /// Resolves the promise with an outcome.
    ///
    /// Returns `false` if the promise was already resolved.
    pub fn complete(&self, outcome: Result<T>) -> bool {
        self.promise.resolve(outcome)
    }

    /// Returns a read handle to the promise.
    pub fn promise(&self) -> Promise<T> {
        self.promise.clone()
    }

    /// Consumes the write half, returning the read handle.
    pub fn into_promise(self) -> Promise<T> {
        self.promise
    }
}

impl<T> Deref for SettablePromise<T> {
    type Target = Promise<T>;

    fn deref(&self) -> &Promise<T> {
        &self.promise
    }
}

impl<T> From<SettablePromise<T>> for Promise<T> {
    fn from(settable: SettablePromise<T>) -> Self {
        settable.promise
    }
}

impl<T> fmt::Debug for SettablePromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.promise.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn first_writer_wins() {
        let promise = Promise::settable();

        assert!(promise.done(1));
        assert!(!promise.done(2));
        assert!(!promise.fail(Error::msg("late")));
        assert_eq!(promise.get().unwrap(), 1);
    }

    #[test]
    fn pending_promise_reports_unresolved() {
        let promise = Promise::<u8>::settable();

        assert!(!promise.is_done());
        assert!(matches!(promise.get(), Err(Error::Unresolved)));
        assert_eq!(promise.value(), None);
        assert!(promise.error().is_none());
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let promise = Promise::settable();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            promise.add_listener(move |_| order.lock().push(i));
        }

        assert!(order.lock().is_empty());
        promise.done("x");

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn listener_on_resolved_promise_runs_before_returning() {
        let promise = Promise::resolved(7);
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        promise.add_listener(move |p| {
            s.store(p.get().unwrap(), Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn concurrent_resolution_settles_exactly_once() {
        for _ in 0..50 {
            let promise = Promise::settable();
            let observed = Arc::new(Mutex::new(Vec::new()));

            for _ in 0..3 {
                let observed = observed.clone();
                promise.add_listener(move |p| observed.lock().push(p.get().unwrap()));
            }

            let winners = Arc::new(AtomicUsize::new(0));
            let handles: Vec<_> = (0..8usize)
                .map(|i| {
                    let promise = promise.clone();
                    let winners = winners.clone();
                    thread::spawn(move || {
                        if promise.done(i) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);

            let observed = observed.lock();
            assert_eq!(observed.len(), 3);
            assert!(observed.iter().all(|v| *v == observed[0]));
            assert_eq!(promise.get().unwrap(), observed[0]);
        }
    }

    #[test]
    fn panicking_listener_does_not_starve_others() {
        let promise = Promise::settable();
        let ran = Arc::new(AtomicUsize::new(0));

        promise.add_listener(|_| panic!("listener bug"));
        let r = ran.clone();
        promise.add_listener(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        promise.done(());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn propagation_copies_failures() {
        let src = Promise::<u32>::settable();
        let dst = Promise::settable();

        src.propagate_to(&dst);
        src.fail(Error::msg("nope"));

        assert!(dst.is_failed());
        assert_eq!(dst.error().unwrap().to_string(), "nope");
    }

    #[test]
    fn long_propagation_chain_settles_every_link() {
        let head = Promise::<u32>::settable();
        let mut tail = head.clone();

        for _ in 0..100_000 {
            let next = Promise::settable();
            tail.propagate_to(&next);
            tail = next;
        }

        assert!(head.done(7));
        assert_eq!(tail.get().unwrap(), 7);
    }
}
