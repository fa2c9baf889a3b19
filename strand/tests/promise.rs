use strand::{Error, Promise};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_concurrent_resolution_has_one_winner() {
    for _ in 0..50 {
        let promise = Promise::<usize>::settable();
        let wins = Arc::new(AtomicUsize::new(0));
        let notified = Arc::new(AtomicUsize::new(0));

        {
            let notified = notified.clone();
            promise.add_listener(move |_| {
                notified.fetch_add(1, Ordering::SeqCst);
            });
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let promise = promise.clone();
                let wins = wins.clone();

                thread::spawn(move || {
                    let won = if i % 2 == 0 {
                        promise.done(i)
                    } else {
                        promise.fail(Error::msg(format!("writer {i}")))
                    };

                    if won {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(promise.is_done());
    }
}

#[test]
fn test_listener_on_resolved_promise_runs_immediately() {
    let promise = Promise::resolved(7);
    let seen = Arc::new(AtomicUsize::new(0));

    {
        let seen = seen.clone();
        promise.add_listener(move |p| {
            seen.store(p.get().unwrap(), Ordering::SeqCst);
        });
    }

    // No scheduling in between: the listener already ran.
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

#[test]
fn test_listeners_added_concurrently_with_resolution_each_run_once() {
    let promise = Promise::<u32>::settable();
    let calls = Arc::new(AtomicUsize::new(0));

    let adders: Vec<_> = (0..4)
        .map(|_| {
            let promise = promise.promise();
            let calls = calls.clone();

            thread::spawn(move || {
                for _ in 0..100 {
                    let calls = calls.clone();
                    promise.add_listener(move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();

    promise.done(1);

    for handle in adders {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 400);
}

#[test]
fn test_unresolved_promise_reports_unresolved() {
    let promise = Promise::<u32>::settable();

    assert!(!promise.is_done());
    assert!(matches!(promise.get(), Err(Error::Unresolved)));
    assert_eq!(promise.value(), None);
}

#[test]
fn test_propagate_to_copies_failure() {
    let source = Promise::<u32>::settable();
    let target = Promise::<u32>::settable();

    source.promise().propagate_to(&target);
    source.fail(Error::msg("broken"));

    assert!(target.is_failed());
    assert_eq!(target.error().unwrap().to_string(), "broken");
}
