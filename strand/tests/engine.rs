use strand::{CancelReason, EngineBuilder, Promise, Task};

use parking_lot::Mutex;

use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_block_on_value() {
    let engine = EngineBuilder::new().worker_threads(2).build();

    assert_eq!(engine.block_on(&Task::value("answer", 42)).unwrap(), 42);

    engine.shutdown();
    assert!(engine.is_shutdown());
}

#[test]
fn test_higher_priority_runs_first() {
    let engine = EngineBuilder::new().worker_threads(1).build();
    let order = Arc::new(Mutex::new(Vec::new()));

    let record = |name: &'static str, priority: i32| {
        let order = order.clone();
        let task = Task::action(name, move || {
            order.lock().push(name);
            Ok(())
        });
        task.set_priority(priority);
        task
    };

    let low = record("low", -10);
    let high = record("high", 10);
    let mid = record("mid", 0);

    let root = Task::with_context("root", move |ctx| {
        let done = Task::value("done", ());

        ctx.run(&low);
        ctx.run(&high);
        ctx.run(&mid);
        ctx.after(&low).and(&high).and(&mid).run(&done);

        Ok(done.promise())
    });

    engine.block_on(&root).unwrap();

    assert_eq!(*order.lock(), vec!["high", "mid", "low"]);
}

#[test]
fn test_equal_priority_runs_in_arrival_order() {
    let engine = EngineBuilder::new().worker_threads(1).build();
    let order = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let order = order.clone();
            Task::action(format!("step {i}"), move || {
                order.lock().push(i);
                Ok(())
            })
        })
        .collect();

    let root = Task::with_context("root", move |ctx| {
        let done = Task::value("done", ());
        for task in &tasks {
            ctx.run(task);
        }

        tasks[1..]
            .iter()
            .fold(ctx.after(&tasks[0]), |after, task| after.and(task))
            .run(&done);

        Ok(done.promise())
    });

    engine.block_on(&root).unwrap();

    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_shutdown_cancels_armed_timers() {
    let engine = EngineBuilder::new().worker_threads(1).build();

    let delayed = Task::value("far away", 1).with_delay("wait", Duration::from_secs(60));
    engine.run(&delayed);

    engine.shutdown();

    assert_eq!(
        delayed.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::Shutdown)
    );
}

#[test]
fn test_run_after_shutdown_is_cancelled() {
    let engine = EngineBuilder::new().build();
    engine.shutdown();

    let late = Task::value("late", 1);
    engine.run(&late);

    assert_eq!(
        late.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::Shutdown)
    );

    let blocked = Task::value("blocked", 2);
    assert_eq!(
        engine.block_on(&blocked).unwrap_err().cancel_reason(),
        Some(CancelReason::Shutdown)
    );
}

#[test]
fn test_shutdown_is_idempotent() {
    let engine = EngineBuilder::new().worker_threads(2).build();

    engine.shutdown();
    engine.shutdown();

    assert!(engine.is_shutdown());
}

#[test]
fn test_worker_threads_use_configured_name() {
    let engine = EngineBuilder::new()
        .worker_threads(1)
        .thread_name("pipeline")
        .build();

    let name = Task::callable("whoami", || Ok(std::thread::current().name().map(str::to_owned)));

    assert_eq!(engine.block_on(&name).unwrap().as_deref(), Some("pipeline-0"));
}

#[strand::test(worker_threads = 3)]
fn test_promise_tasks_complete_across_threads() {
    let tasks: Vec<_> = (0..20)
        .map(|i| {
            Task::from_promise(format!("remote {i}"), move || {
                let promise = Promise::settable();
                let completer = promise.clone();

                std::thread::spawn(move || {
                    completer.done(i * 2);
                });

                Ok(promise.into_promise())
            })
        })
        .collect();

    let all = strand::par::par(tasks);
    let results = engine.block_on(&all).unwrap();

    assert_eq!(results.successful(), (0..20).map(|i| i * 2).collect::<Vec<_>>());
}
