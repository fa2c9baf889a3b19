use super::core::Shared;
use super::current::enter_worker;
use crate::scheduler::{Activation, Scheduler};

use std::sync::Arc;

/// A worker thread of the engine.
///
/// The execution order is:
/// 1. Pop from the local queue
/// 2. Steal from the global injector
/// 3. Steal from other workers
/// 4. Park if no work is available
pub(crate) struct Worker {
    id: usize,
    shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    /// Runs the worker loop until the engine shuts down.
    pub(crate) fn run(&self) {
        enter_worker(self.shared.id, self.id, || {
            tracing::trace!(worker = self.id, "worker started");

            let scheduler: Arc<dyn Scheduler> = self.shared.clone();

            loop {
                if self.shared.injector.is_shutdown() {
                    break;
                }

                if let Some(activation) = self.next() {
                    activation.run(scheduler.clone());
                    continue;
                }

                self.shared.injector.park();
            }

            tracing::trace!(worker = self.id, "worker stopped");
        });
    }

    fn next(&self) -> Option<Activation> {
        self.shared.locals[self.id]
            .pop()
            .or_else(|| self.shared.injector.steal())
            .or_else(|| self.try_steal())
    }

    /// Attempts to steal an activation from another worker's local queue.
    ///
    /// Workers are visited round-robin starting after this one.
    fn try_steal(&self) -> Option<Activation> {
        let len = self.shared.locals.len();

        if len <= 1 {
            return None;
        }

        (1..len)
            .map(|i| (self.id + i) % len)
            .find_map(|victim| self.shared.locals[victim].pop())
    }
}
