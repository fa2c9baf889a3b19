use strand::{CancelReason, Context, Promise, SettablePromise, Task, TaskState, Value};

use parking_lot::Mutex;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A task that stays running until the returned promise is completed.
fn pending<T: Value>(name: &str) -> (Task<T>, SettablePromise<T>) {
    let source = Promise::settable();
    let promise = source.promise();

    (Task::from_promise(name, move || Ok(promise)), source)
}

fn wait_for_state<T: Value>(task: &Task<T>, state: TaskState) {
    let deadline = Instant::now() + Duration::from_secs(5);

    while task.state() != state {
        assert!(Instant::now() < deadline, "{} never reached {state:?}", task.name());
        thread::sleep(Duration::from_millis(1));
    }
}

#[strand::test]
fn test_parent_completion_cancels_pending_child() {
    let ran = Arc::new(AtomicBool::new(false));

    let child = {
        let ran = ran.clone();
        Task::callable("child", move || {
            ran.store(true, Ordering::SeqCst);
            Ok(1)
        })
    };

    let parent = {
        let child = child.clone();
        Task::with_context("parent", move |ctx| {
            ctx.run(&child);
            Ok(Promise::resolved(0))
        })
    };

    assert_eq!(engine.block_on(&parent).unwrap(), 0);

    assert!(child.is_failed());
    assert_eq!(
        child.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::ParentCompleted)
    );
    assert!(!ran.load(Ordering::SeqCst));
}

#[strand::test]
fn test_child_scheduled_after_parent_finished_is_cancelled() {
    let saved: Arc<Mutex<Option<Context>>> = Arc::new(Mutex::new(None));

    let parent = {
        let saved = saved.clone();
        Task::with_context("parent", move |ctx| {
            *saved.lock() = Some(ctx.clone());
            Ok(Promise::resolved(()))
        })
    };

    engine.block_on(&parent).unwrap();

    let late = Task::value("late", 5);
    let context = saved.lock().take().unwrap();
    context.run(&late);

    assert_eq!(
        late.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::ParentCompleted)
    );
}

#[strand::test]
fn test_cancel_before_start_never_runs() {
    let ran = Arc::new(AtomicBool::new(false));

    let task = {
        let ran = ran.clone();
        Task::callable("never", move || {
            ran.store(true, Ordering::SeqCst);
            Ok(1)
        })
    };

    assert!(task.cancel());
    assert!(!task.cancel());

    let error = engine.block_on(&task).unwrap_err();
    assert_eq!(error.cancel_reason(), Some(CancelReason::Requested));
    assert!(!ran.load(Ordering::SeqCst));
}

#[strand::test]
fn test_cancel_running_task_ignores_late_result() {
    let (task, source) = pending::<u32>("slow");

    engine.run(&task);
    wait_for_state(&task, TaskState::Running);

    assert!(task.cancel());
    assert_eq!(task.state(), TaskState::Failed);

    source.done(5);

    assert!(task.error().unwrap().is_cancellation());
    assert_eq!(task.promise().value(), None);
}

#[strand::test]
fn test_side_effect_survives_parent_completion() {
    let (tx, rx) = std::sync::mpsc::channel();

    let side = Task::action("notify", move || {
        let _ = tx.send(());
        Ok(())
    });

    let parent = {
        let side = side.clone();
        Task::with_context("parent", move |ctx| {
            ctx.run_side_effect(&side);
            Ok(Promise::resolved(1))
        })
    };

    assert_eq!(engine.block_on(&parent).unwrap(), 1);

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    engine.block_on(&side).unwrap();
}

#[strand::test]
fn test_cancelling_shareable_wrapper_leaves_shared_task_running() {
    let (shared, source) = pending::<u32>("shared");
    let wrapper = shared.shareable();

    engine.run(&wrapper);
    wait_for_state(&shared, TaskState::Running);

    assert!(wrapper.cancel());
    assert_eq!(shared.state(), TaskState::Running);

    source.done(9);

    assert_eq!(engine.block_on(&shared).unwrap(), 9);
    assert!(wrapper.error().unwrap().is_cancellation());
}

#[strand::test]
fn test_recover_bypasses_cancellation() {
    let called = Arc::new(AtomicBool::new(false));

    let task = Task::value("source", 1);
    task.cancel();

    let recovered = {
        let called = called.clone();
        task.recover("fallback", move |_| {
            called.store(true, Ordering::SeqCst);
            Ok(2)
        })
    };

    let error = engine.block_on(&recovered).unwrap_err();

    assert!(error.is_cancellation());
    assert!(!called.load(Ordering::SeqCst));
}

#[strand::test]
fn test_and_then_task_cancels_receiver_when_next_already_done() {
    let ran = Arc::new(AtomicBool::new(false));

    let receiver = {
        let ran = ran.clone();
        Task::callable("receiver", move || {
            ran.store(true, Ordering::SeqCst);
            Ok(1)
        })
    };

    let next = Task::value("next", 7);
    engine.block_on(&next).unwrap();

    let combined = receiver.and_then_task("then", &next);

    assert_eq!(engine.block_on(&combined).unwrap(), 7);
    assert!(receiver.error().unwrap().is_cancellation());
    assert!(!ran.load(Ordering::SeqCst));
}
