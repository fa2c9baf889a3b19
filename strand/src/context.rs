//! The scheduling handle handed to a running task.
//!
//! A [`Context`] lets a work function start children, sequence tasks after
//! other tasks, start detached side effects and arm timers. Children started
//! through [`Context::run`], [`After::run`] and [`Context::create_timer`] are
//! *adopted*: if the running task finishes before they start, they are
//! cancelled with [`CancelReason::ParentCompleted`].
//!
//! Requests made while the work function is still executing are held back
//! and handed to the scheduler right after it returns, once the task's own
//! completion is wired up. Requests made later, from listeners, go to the
//! scheduler directly.

use crate::error::CancelReason;
use crate::promise::Value;
use crate::scheduler::{Activation, Scheduler};
use crate::task::core::TaskCore;
use crate::task::{Task, TaskId};

use parking_lot::Mutex;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Request {
    Run(Activation),
    Timer(Duration, Activation),
}

impl Request {
    fn is_finished(&self) -> bool {
        match self {
            Request::Run(activation) | Request::Timer(_, activation) => activation.is_finished(),
        }
    }
}

struct Inner {
    scheduler: Arc<dyn Scheduler>,

    /// The task this context belongs to.
    task: Arc<dyn TaskCore>,

    /// Requests buffered while the work function runs. `None` once flushed.
    buffered: Mutex<Option<Vec<Request>>>,

    /// Fused tasks waiting to run inline. `Some` while a chain is being
    /// unrolled.
    inlining: Mutex<Option<VecDeque<Arc<dyn TaskCore>>>>,
}

/// The scheduling handle of one task activation.
///
/// Cloning a context yields another handle to the same activation, which is
/// how listeners keep scheduling work after the work function returned.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>, task: Arc<dyn TaskCore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                task,
                buffered: Mutex::new(Some(Vec::new())),
                inlining: Mutex::new(None),
            }),
        }
    }

    /// ID of the task this context belongs to.
    pub fn task_id(&self) -> TaskId {
        self.inner.task.id()
    }

    /// Returns `true` once the owning task has finished.
    ///
    /// A work function that is still doing something when this turns `true`
    /// was cancelled or timed out and may abandon its work.
    pub fn is_cancelled(&self) -> bool {
        self.inner.task.is_finished()
    }

    /// Starts `task` as a child of the running task.
    pub fn run<R: Value>(&self, task: &Task<R>) {
        self.run_core(task.core());
    }

    /// Starts `task` outside the parent's cancellation scope.
    ///
    /// The side effect is not pruned when the parent finishes and its outcome
    /// never reaches the parent. It can still be cancelled on its own.
    pub fn run_side_effect<R: Value>(&self, task: &Task<R>) {
        let core = task.core();
        self.submit(Request::Run(Activation::new(
            core,
            Some(self.task_id()),
            Vec::new(),
        )));
    }

    /// Starts building a request that waits for `task` to finish.
    pub fn after<R: Value>(&self, task: &Task<R>) -> After<'_> {
        After {
            context: self,
            predecessors: vec![task.core()],
        }
    }

    /// Starts `task` as a child of the running task once `delay` elapsed.
    pub fn create_timer<R: Value>(&self, delay: Duration, task: &Task<R>) {
        let core = task.core();

        if self.adopt(&core) {
            self.submit(Request::Timer(
                delay,
                Activation::new(core, Some(self.task_id()), Vec::new()),
            ));
        }
    }

    pub(crate) fn run_core(&self, core: Arc<dyn TaskCore>) {
        if self.adopt(&core) {
            self.submit(Request::Run(Activation::new(
                core,
                Some(self.task_id()),
                Vec::new(),
            )));
        }
    }

    /// Starts a fused, not yet started task inline; otherwise behaves like
    /// [`Context::run`].
    ///
    /// A fused task running inline asks for its own source the same way.
    /// Such nested requests are queued and picked up by the outermost call,
    /// so a chain of any length is unrolled in a loop.
    pub(crate) fn run_or_inline(&self, core: Arc<dyn TaskCore>) {
        {
            let mut inlining = self.inner.inlining.lock();

            if let Some(queue) = inlining.as_mut() {
                queue.push_back(core);
                return;
            }

            *inlining = Some(VecDeque::new());
        }

        let mut next = Some(core);

        while let Some(core) = next {
            if !core.clone().run_inline(self) {
                self.run_core(core);
            }

            next = self.next_inline();
        }
    }

    /// Pops the next queued fused task, ending the unrolling when there is
    /// none.
    fn next_inline(&self) -> Option<Arc<dyn TaskCore>> {
        let mut inlining = self.inner.inlining.lock();
        let next = inlining.as_mut().and_then(VecDeque::pop_front);

        if next.is_none() {
            *inlining = None;
        }

        next
    }

    fn adopt(&self, core: &Arc<dyn TaskCore>) -> bool {
        if self.inner.task.adopt(core) {
            return true;
        }

        core.cancel_pending(CancelReason::ParentCompleted);
        false
    }

    fn submit(&self, request: Request) {
        let mut buffered = self.inner.buffered.lock();

        if let Some(queue) = buffered.as_mut() {
            queue.push(request);
            return;
        }

        drop(buffered);
        self.dispatch(request);
    }

    fn dispatch(&self, request: Request) {
        match request {
            Request::Run(activation) => self.inner.scheduler.schedule(activation),
            Request::Timer(delay, activation) => {
                self.inner.scheduler.schedule_after(delay, activation)
            }
        }
    }

    /// Hands buffered requests to the scheduler and switches to direct
    /// dispatch.
    pub(crate) fn flush(&self) {
        let requests = self.inner.buffered.lock().take().unwrap_or_default();

        for request in requests {
            if request.is_finished() {
                continue;
            }

            self.dispatch(request);
        }
    }
}

/// A pending "run after" request built by [`Context::after`].
pub struct After<'a> {
    context: &'a Context,
    predecessors: Vec<Arc<dyn TaskCore>>,
}

impl After<'_> {
    /// Adds another task to wait for.
    pub fn and<R: Value>(mut self, task: &Task<R>) -> Self {
        self.predecessors.push(task.core());
        self
    }

    /// Starts `task` as a child once every predecessor reached a terminal
    /// state, whatever their outcome.
    pub fn run<R: Value>(self, task: &Task<R>) {
        self.run_core(task.core());
    }

    pub(crate) fn run_core(self, core: Arc<dyn TaskCore>) {
        let context = self.context;

        if !context.adopt(&core) {
            return;
        }

        let parent = Some(context.task_id());
        let ids: Vec<TaskId> = self.predecessors.iter().map(|p| p.id()).collect();

        if self.predecessors.is_empty() {
            context.submit(Request::Run(Activation::new(core, parent, ids)));
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(self.predecessors.len()));

        for predecessor in &self.predecessors {
            let remaining = remaining.clone();
            let context = context.clone();
            let core = core.clone();
            let ids = ids.clone();

            predecessor.add_completion_listener(Box::new(move |_| {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    context.submit(Request::Run(Activation::new(core, parent, ids)));
                }
            }));
        }
    }
}
