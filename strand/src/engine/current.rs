use std::cell::Cell;

thread_local! {
    /// Engine and worker index of the current thread, if it is a worker.
    ///
    /// Lets the scheduler push work scheduled from a worker onto that
    /// worker's local queue.
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// Runs `f` with the current thread registered as worker `worker` of engine
/// `engine`, restoring the previous registration afterwards.
pub(crate) fn enter_worker<R>(engine: usize, worker: usize, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_WORKER.with(|current| current.replace(Some((engine, worker))));

    let out = f();

    CURRENT_WORKER.with(|current| current.set(prev));
    out
}

/// Returns the worker index of the current thread within engine `engine`.
pub(crate) fn worker_index(engine: usize) -> Option<usize> {
    CURRENT_WORKER.with(|current| match current.get() {
        Some((id, worker)) if id == engine => Some(worker),
        _ => None,
    })
}
