use strand::{Error, Promise, Task, TaskState};

use parking_lot::Mutex;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[strand::test]
fn test_chain_runs_inline_in_one_activation() {
    let a = Task::value("a", 1);
    let b = a.map("b", |x| x + 1);
    let c = b.map("c", |x| x * 10);

    assert_eq!(engine.block_on(&c).unwrap(), 20);

    // `c` was activated by the engine, its predecessors ran inside it.
    assert!(!c.trace().fused);
    assert!(b.trace().fused);
    assert!(a.trace().fused);
    assert_eq!(b.trace().parent, Some(c.id()));
    assert_eq!(a.trace().parent, Some(c.id()));
}

#[strand::test]
fn test_fused_steps_expose_intermediate_outcomes() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let a = Task::value("a", 2);
    let b = a.map("b", |x| x * 3);
    let c = b.map("c", |x| x - 1);

    for (name, task) in [("a", &a), ("b", &b), ("c", &c)] {
        let seen = seen.clone();
        task.add_listener(move |p| seen.lock().push((name, p.get().unwrap())));
    }

    assert_eq!(engine.block_on(&c).unwrap(), 5);
    assert_eq!(a.promise().value(), Some(2));
    assert_eq!(b.promise().value(), Some(6));
    assert_eq!(*seen.lock(), vec![("a", 2), ("b", 6), ("c", 5)]);
}

#[strand::test]
fn test_fused_failure_propagates_through_chain() {
    let a = Task::<u32>::failure("a", Error::msg("root cause"));
    let b = a.map("b", |x| x + 1);
    let c = b.map("c", |x| x + 1);

    assert_eq!(engine.block_on(&c).unwrap_err().to_string(), "root cause");
    assert_eq!(a.state(), TaskState::Failed);
    assert_eq!(b.state(), TaskState::Failed);
}

#[strand::test]
fn test_context_task_is_not_fused() {
    let source = Task::from_promise("source", || Ok(Promise::resolved(4)));
    let mapped = source.map("mapped", |x| x * 2);

    assert_eq!(engine.block_on(&mapped).unwrap(), 8);
    assert!(!source.trace().fused);
    assert_eq!(source.trace().parent, Some(mapped.id()));
}

#[strand::test]
fn test_cancelled_intermediate_step_stops_chain() {
    let a = Task::value("a", 1);
    let b = a.map("b", |x| x + 1);
    let c = b.map("c", |x| x + 1);

    b.cancel();

    assert!(engine.block_on(&c).unwrap_err().is_cancellation());
    assert_eq!(a.state(), TaskState::Created);
}

#[strand::test]
fn test_started_predecessor_is_not_rerun() {
    let a = Task::value("a", 3);
    assert_eq!(engine.block_on(&a).unwrap(), 3);

    let b = a.map("b", |x| x * 3);
    assert_eq!(engine.block_on(&b).unwrap(), 9);

    // `a` kept its trace from its own activation.
    assert!(!a.trace().fused);
    assert_eq!(a.trace().parent, None);
}

#[strand::test]
fn test_value_serializer_renders_trace() {
    let task = Task::value("answer", 42);
    task.set_value_serializer(|v| format!("v={v}"));

    engine.block_on(&task).unwrap();

    let trace = task.trace();
    assert_eq!(trace.value.as_deref(), Some("v=42"));
    assert_eq!(trace.state, TaskState::Done);
    assert!(trace.duration().is_some());
}

#[strand::test(worker_threads = 1)]
fn test_long_chain_settles_in_one_activation() {
    let mut task = Task::value("start", 0u64);
    for _ in 0..100_000 {
        task = task.map("step", |x| x + 1);
    }

    assert_eq!(engine.block_on(&task).unwrap(), 100_000);
    assert!(!task.trace().fused);
}

#[strand::test]
fn test_long_chain_over_late_source() {
    let source = Promise::<u64>::settable();

    let head = {
        let promise = source.promise();
        Task::from_promise("head", move || Ok(promise))
    };

    let mut task = head.clone();
    for _ in 0..100_000 {
        task = task.map("step", |x| x + 1);
    }

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        source.done(1);
    });

    assert_eq!(engine.block_on(&task).unwrap(), 100_001);
    assert_eq!(head.trace().parent, Some(task.id()));
    producer.join().unwrap();
}
