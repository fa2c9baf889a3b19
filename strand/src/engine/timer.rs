use super::queue::Injector;
use crate::error::CancelReason;
use crate::scheduler::Activation;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A message to the timer thread.
pub(crate) enum Command {
    SetTimer {
        /// `None` when the delay is too large to be represented; such a
        /// timer never fires.
        deadline: Option<Instant>,
        activation: Activation,
    },
    Shutdown,
}

/// An activation waiting for its deadline.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    activation: Activation,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that a `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first, ties broken by insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry count below which finished entries are left to expire.
const SWEEP_THRESHOLD: usize = 64;

/// The timer thread's state.
///
/// Deadlines live in a min-heap. The thread sleeps on its command channel
/// until the earliest deadline, then moves every due activation to the
/// injector. Activations that can never fire are kept aside so shutdown can
/// still cancel them.
struct Timer {
    receiver: Receiver<Command>,
    timers: BinaryHeap<TimerEntry>,
    dormant: Vec<Activation>,
    next_seq: u64,
    /// Entry count that triggers the next sweep of finished entries.
    sweep_at: usize,
    injector: Arc<Injector>,
}

impl Timer {
    fn run(&mut self) {
        loop {
            let command = match self.timers.peek() {
                Some(next) => {
                    let timeout = next.deadline.saturating_duration_since(Instant::now());
                    self.receiver.recv_timeout(timeout)
                }
                None => self
                    .receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match command {
                Ok(Command::SetTimer {
                    deadline,
                    activation,
                }) => self.arm(deadline, activation),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.fire_due();
        }

        let mut pending: Vec<Activation> =
            self.timers.drain().map(|entry| entry.activation).collect();
        pending.append(&mut self.dormant);

        while let Ok(command) = self.receiver.try_recv() {
            if let Command::SetTimer { activation, .. } = command {
                pending.push(activation);
            }
        }

        let pending_count = pending.len();
        for activation in pending {
            activation.cancel(CancelReason::Shutdown);
        }

        tracing::debug!(pending = pending_count, "timer thread stopped");
    }

    fn arm(&mut self, deadline: Option<Instant>, activation: Activation) {
        match deadline {
            Some(deadline) => {
                let seq = self.next_seq;
                self.next_seq += 1;

                self.timers.push(TimerEntry {
                    deadline,
                    seq,
                    activation,
                });
            }
            None => self.dormant.push(activation),
        }

        if self.len() >= self.sweep_at {
            self.sweep();
        }
    }

    /// Drops entries whose task finished before the deadline, such as the
    /// timeout of a task that completed in time.
    fn sweep(&mut self) {
        let before = self.len();

        self.timers.retain(|entry| !entry.activation.is_finished());
        self.dormant.retain(|activation| !activation.is_finished());

        let live = self.len();
        self.sweep_at = (live * 2).max(SWEEP_THRESHOLD);

        tracing::trace!(removed = before - live, live, "swept finished timers");
    }

    fn len(&self) -> usize {
        self.timers.len() + self.dormant.len()
    }

    fn fire_due(&mut self) {
        let now = Instant::now();

        while let Some(entry) = self.timers.peek() {
            if entry.deadline > now {
                break;
            }

            let Some(entry) = self.timers.pop() else {
                break;
            };

            // Pruned or cancelled while waiting.
            if entry.activation.is_finished() {
                continue;
            }

            if let Err(activation) = self.injector.push(entry.activation) {
                activation.cancel(CancelReason::Shutdown);
            }
        }
    }
}

/// Handle to the timer thread.
pub(crate) struct TimerHandle {
    transmitter: Sender<Command>,
}

impl TimerHandle {
    /// Spawns the timer thread.
    pub(crate) fn start(injector: Arc<Injector>, name: String) -> (Self, JoinHandle<()>) {
        let (transmitter, receiver) = channel();

        let mut timer = Timer {
            receiver,
            timers: BinaryHeap::new(),
            dormant: Vec::new(),
            next_seq: 0,
            sweep_at: SWEEP_THRESHOLD,
            injector,
        };

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || timer.run());

        let handle = match handle {
            Ok(handle) => handle,
            Err(error) => panic!("failed to spawn timer thread: {error}"),
        };

        (Self { transmitter }, handle)
    }

    /// Arms a timer. Returns the activation if the thread is gone.
    ///
    /// A delay past the clock's range never fires.
    pub(crate) fn set_timer(&self, delay: Duration, activation: Activation) -> Result<(), Activation> {
        let command = Command::SetTimer {
            deadline: Instant::now().checked_add(delay),
            activation,
        };

        match self.transmitter.send(command) {
            Ok(()) => Ok(()),
            Err(error) => match error.0 {
                Command::SetTimer { activation, .. } => Err(activation),
                Command::Shutdown => Ok(()),
            },
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.transmitter.send(Command::Shutdown);
    }
}
