use std::cell::RefCell;
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

thread_local! {
    /// Listener batches waiting on this thread. `Some` while a batch is
    /// being delivered here.
    static PENDING: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

/// Clears the pending queue even if a batch unwinds.
struct Delivering;

impl Drop for Delivering {
    fn drop(&mut self) {
        PENDING.with(|pending| pending.borrow_mut().take());
    }
}

/// Runs `batch` now, or after the batch currently being delivered on this
/// thread.
///
/// A listener that resolves another promise would otherwise notify that
/// promise's listeners from inside its own frame. Queueing them keeps the
/// stack flat along chains of dependent promises, while every batch still
/// runs before the outermost resolution returns.
pub(super) fn deliver(batch: Job) {
    let queued = PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();

        match pending.as_mut() {
            Some(queue) => {
                queue.push_back(batch);
                None
            }
            None => {
                *pending = Some(VecDeque::new());
                Some(batch)
            }
        }
    });

    let Some(first) = queued else {
        return;
    };

    let _delivering = Delivering;
    first();

    while let Some(next) = PENDING.with(|pending| pending.borrow_mut().as_mut()?.pop_front()) {
        next();
    }
}
