use crate::scheduler::Activation;

use parking_lot::{Condvar, Mutex};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

/// A queued activation, ordered by priority then by arrival.
struct Entry {
    priority: i32,
    seq: u64,
    activation: Activation,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Ord for Entry {
    /// Higher priorities first; among equal priorities the older entry wins,
    /// so a `BinaryHeap<Entry>` pops in priority-then-FIFO order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Heap {
    entries: BinaryHeap<Entry>,
    next_seq: u64,

    /// Set once the engine shuts down. Closed queues reject pushes.
    closed: bool,
}

/// A priority-ordered queue of ready activations.
///
/// Used both as a worker's local queue and as the backing store of the
/// [`Injector`]. Any worker may pop from any queue.
pub(crate) struct ReadyQueue {
    inner: Mutex<Heap>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Heap {
                entries: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
        }
    }

    /// Queues `activation`, or hands it back if the queue is closed.
    pub(crate) fn push(&self, activation: Activation) -> Result<(), Activation> {
        let mut heap = self.inner.lock();

        if heap.closed {
            return Err(activation);
        }

        let seq = heap.next_seq;
        heap.next_seq += 1;

        heap.entries.push(Entry {
            priority: activation.priority(),
            seq,
            activation,
        });

        Ok(())
    }

    /// Removes the highest-priority activation.
    pub(crate) fn pop(&self) -> Option<Activation> {
        self.inner.lock().entries.pop().map(|entry| entry.activation)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Closes the queue and returns whatever it still held.
    pub(crate) fn close(&self) -> Vec<Activation> {
        let mut heap = self.inner.lock();
        heap.closed = true;

        heap.entries.drain().map(|entry| entry.activation).collect()
    }
}

/// The global queue fed by non-worker threads and the timer thread.
///
/// Also coordinates parking: idle workers wait on its condition variable
/// until work shows up or the engine shuts down.
pub(crate) struct Injector {
    queue: ReadyQueue,

    /// Number of parked worker threads.
    parked: Mutex<usize>,

    condvar: Condvar,

    shutdown: AtomicBool,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            queue: ReadyQueue::new(),
            parked: Mutex::new(0),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, activation: Activation) -> Result<(), Activation> {
        self.queue.push(activation)?;
        self.notify();

        Ok(())
    }

    pub(crate) fn steal(&self) -> Option<Activation> {
        self.queue.pop()
    }

    /// Wakes one parked worker, if any.
    pub(crate) fn notify(&self) {
        if *self.parked.lock() > 0 {
            self.condvar.notify_one();
        }
    }

    /// Parks the calling worker until work becomes available or shutdown.
    ///
    /// The wait is bounded so that work pushed to another worker's local
    /// queue is eventually stolen.
    pub(crate) fn park(&self) {
        if self.is_shutdown() || !self.queue.is_empty() {
            return;
        }

        let mut parked = self.parked.lock();
        *parked += 1;

        self.condvar.wait_for(&mut parked, Duration::from_millis(1));

        *parked -= 1;
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(AtomicOrdering::Acquire)
    }

    /// Flags shutdown, wakes every parked worker and returns the activations
    /// still queued.
    pub(crate) fn shutdown(&self) -> Vec<Activation> {
        self.shutdown.store(true, AtomicOrdering::Release);
        self.condvar.notify_all();

        self.queue.close()
    }
}
