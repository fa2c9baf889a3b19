use strand::{CancelReason, Error, Promise, Task, TaskType, Value, par};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[strand::test]
fn test_par_two_tasks() {
    let joined = par::par2(Task::value("a", 1), Task::value("b", "two"));

    assert_eq!(engine.block_on(&joined).unwrap(), (1, "two"));
    assert_eq!(joined.trace().task_type, Some(TaskType::Par));
}

#[strand::test]
fn test_par_macro_keeps_argument_order() {
    let joined = par!(
        Task::value("a", 1u8),
        Task::value("b", 2u16).map("double", |x| x * 2),
        Task::value("c", 'c')
    );

    assert_eq!(engine.block_on(&joined).unwrap(), (1u8, 4u16, 'c'));
}

fn pair<A: Value, B: Value>(a: A, b: B) -> Task<(A, B)> {
    par::par2(Task::value("left", a), Task::value("right", b))
}

#[strand::test]
fn test_par_macro_accepts_turbofish_arguments() {
    let joined = par!(pair::<u8, char>(1, 'x'), Task::value("c", 3));

    assert_eq!(engine.block_on(&joined).unwrap(), ((1u8, 'x'), 3));
}

#[strand::test]
fn test_par_many_tasks() {
    let joined = par!(
        Task::value("1", 1),
        Task::value("2", 2),
        Task::value("3", 3),
        Task::value("4", 4),
        Task::value("5", 5),
        Task::value("6", 6)
    );

    let (a, b, c, d, e, f) = engine.block_on(&joined).unwrap();
    assert_eq!(a + b + c + d + e + f, 21);
}

#[strand::test]
fn test_par_fails_fast_and_cancels_siblings() {
    let never = Promise::<u32>::settable();
    let pending = {
        let promise = never.promise();
        Task::from_promise("pending", move || Ok(promise))
    };

    let failing = Task::<u32>::failure("failing", Error::msg("first failure"));

    let joined = par::par2(failing.clone(), pending.clone());
    let error = engine.block_on(&joined).unwrap_err();

    assert_eq!(error.to_string(), "first failure");
    assert_eq!(
        pending.error().and_then(|e| e.cancel_reason()),
        Some(CancelReason::SiblingFailed)
    );

    never.done(1);
    assert!(pending.is_failed());
}

#[strand::test]
fn test_par_list_collects_every_outcome() {
    let all = par::par(vec![
        Task::value("a", 1),
        Task::failure("b", Error::msg("b failed")),
        Task::value("c", 3),
    ]);

    let results = engine.block_on(&all).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.has_failures());
    assert_eq!(results.successful(), vec![1, 3]);
    assert_eq!(results.failures().len(), 1);
    assert_eq!(results.failures()[0].to_string(), "b failed");
    assert!(results.outcomes()[1].is_err());
    assert_eq!(all.tasks().len(), 3);
}

#[strand::test]
fn test_par_empty_list_succeeds_immediately() {
    let all = par::par(Vec::<Task<u32>>::new());
    let results = engine.block_on(&all).unwrap();

    assert!(results.is_empty());
    assert!(!results.has_failures());
}

#[strand::test(worker_threads = 4)]
fn test_par_list_runs_every_member_once() {
    let runs = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let runs = runs.clone();
            Task::callable(format!("member {i}"), move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
        })
        .collect();

    let all = par::par(tasks);
    let results = engine.block_on(&all).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 100);
    assert_eq!(results.successful().iter().sum::<usize>(), (0..100).sum());
}

#[strand::test]
fn test_par_members_are_children_of_join() {
    let a = Task::value("a", 1);
    let b = Task::value("b", 2);

    let joined = par::par2(a.clone(), b.clone());
    engine.block_on(&joined).unwrap();

    assert_eq!(a.trace().parent, Some(joined.id()));
    assert_eq!(b.trace().parent, Some(joined.id()));
}
