use strand::{CancelReason, Error, Task, TaskType, priority};

use std::time::{Duration, Instant};

#[strand::test]
fn test_timeout_fires_before_slow_task() {
    let slow = Task::value("slow", 1).with_delay("slow", Duration::from_millis(500));
    let guarded = slow.with_timeout("guarded", Duration::from_millis(20));

    let start = Instant::now();
    let error = engine.block_on(&guarded).unwrap_err();
    let elapsed = start.elapsed();

    assert!(error.is_timeout(), "unexpected error: {error}");
    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");

    assert_eq!(
        slow.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::Timeout)
    );
}

#[strand::test]
fn test_fast_task_beats_timeout() {
    let fast = Task::value("fast", 7).with_delay("fast", Duration::from_millis(1));
    let guarded = fast.with_timeout("guarded", Duration::from_secs(5));

    let start = Instant::now();
    assert_eq!(engine.block_on(&guarded).unwrap(), 7);
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[strand::test]
fn test_timeout_keeps_failure_of_guarded_task() {
    let guarded = Task::<u32>::failure("broken", Error::msg("boom"))
        .with_timeout("guarded", Duration::from_secs(5));

    let error = engine.block_on(&guarded).unwrap_err();

    assert!(!error.is_timeout());
    assert_eq!(error.to_string(), "boom");
}

#[strand::test]
fn test_timeout_raises_guarded_priority() {
    let inner = Task::value("inner", 1);
    inner.set_priority(5);

    let guarded = inner.with_timeout("guarded", Duration::from_secs(5));

    assert_eq!(guarded.priority(), 5);
    assert_eq!(engine.block_on(&guarded).unwrap(), 1);
    assert_eq!(inner.priority(), priority::MAX);
    assert_eq!(guarded.trace().task_type, Some(TaskType::WithTimeout));
}

#[strand::test]
fn test_with_delay_waits() {
    let delay = Duration::from_millis(30);
    let delayed = Task::value("later", "done").with_delay("wait", delay);

    let start = Instant::now();
    assert_eq!(engine.block_on(&delayed).unwrap(), "done");
    assert!(start.elapsed() >= delay);
    assert_eq!(delayed.trace().task_type, Some(TaskType::WithDelay));
}

#[strand::test]
fn test_with_delay_copies_priority_to_wrapper_only() {
    let inner = Task::value("inner", 1);
    inner.set_priority(-3);

    let delayed = inner.with_delay("wait", Duration::from_millis(1));

    assert_eq!(delayed.priority(), -3);
    assert_eq!(engine.block_on(&delayed).unwrap(), 1);
    assert_eq!(inner.priority(), -3);
}

#[strand::test(worker_threads = 1)]
fn test_unbounded_timeout_leaves_engine_usable() {
    let guarded = Task::value("fast", 1).with_timeout("guarded", Duration::MAX);
    assert_eq!(engine.block_on(&guarded).unwrap(), 1);

    let next = Task::value("next", 2);
    assert_eq!(engine.block_on(&next).unwrap(), 2);
}

#[test]
fn test_unbounded_delay_is_cancelled_on_shutdown() {
    let engine = strand::EngineBuilder::new().worker_threads(1).build();

    let delayed = Task::value("never", 1).with_delay("never", Duration::MAX);
    engine.run(&delayed);

    let next = Task::value("next", 2);
    assert_eq!(engine.block_on(&next).unwrap(), 2);

    engine.shutdown();

    assert_eq!(
        delayed.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::Shutdown)
    );
}
