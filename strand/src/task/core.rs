use super::id::TaskId;
use super::priority;
use super::state::{CREATED, FINISHED, RUNNING, TaskState};
use super::trace::{ShallowTrace, TraceBuilder};
use crate::context::Context;
use crate::error::{CancelReason, Error, Result};
use crate::promise::{Promise, SettablePromise, Value};
use crate::scheduler::Scheduler;

use parking_lot::Mutex;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::time::Instant;

/// The work function of a task.
pub(crate) type Work<T> = Box<dyn FnOnce(&Context) -> Result<Promise<T>> + Send>;

/// Renders a task's value for traces.
pub(crate) type Serializer<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A task's deferred work.
pub(crate) struct Body<T> {
    work: Work<T>,

    /// Fused bodies are cheap and synchronous, so they may run inline inside
    /// the activation of a task that depends on them.
    fused: bool,
}

impl<T> Body<T> {
    pub(crate) fn new(work: Work<T>, fused: bool) -> Self {
        Self { work, fused }
    }
}

/// The type-erased view of a task used by contexts, joins and engines.
///
/// The trait abstracts the result type so that heterogeneous tasks can be
/// parented, sequenced and queued through `Arc<dyn TaskCore>`.
pub(crate) trait TaskCore: Send + Sync {
    fn id(&self) -> TaskId;

    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    /// Returns `true` once the outcome has been committed.
    fn is_finished(&self) -> bool;

    /// The engine entry point.
    ///
    /// Starts the task unless it already left the `CREATED` state, in which
    /// case the call is a no-op.
    fn context_run(
        self: Arc<Self>,
        scheduler: Arc<dyn Scheduler>,
        parent: Option<TaskId>,
        predecessors: Vec<TaskId>,
    );

    /// Runs a fused task inside another task's activation.
    ///
    /// Returns `false` without doing anything unless the task is fused and
    /// still `CREATED`.
    fn run_inline(self: Arc<Self>, context: &Context) -> bool;

    /// Cancels the task from `CREATED` or `RUNNING`.
    fn cancel(&self, reason: CancelReason) -> bool;

    /// Cancels the task only if it has not started.
    fn cancel_pending(&self, reason: CancelReason) -> bool;

    /// Records `child` as scheduled through this task's context.
    ///
    /// Returns `false` if this task already finished; the caller must then
    /// drop the child.
    fn adopt(&self, child: &Arc<dyn TaskCore>) -> bool;

    /// Runs `listener` with the erased outcome once the task finishes.
    fn add_completion_listener(&self, listener: Box<dyn FnOnce(Result<()>) + Send>);
}

/// The state machine behind a [`Task`](crate::Task).
pub(crate) struct Core<T> {
    id: TaskId,
    name: String,

    /// Frozen once the task leaves `CREATED`.
    priority: AtomicI32,

    /// One of `CREATED`, `RUNNING`, `FINISHED`.
    lifecycle: AtomicU8,

    /// Taken by the single activation that wins the start transition.
    body: Mutex<Option<Body<T>>>,

    /// Resolved only by the core, after it won the `FINISHED` transition.
    promise: SettablePromise<T>,

    /// Children to prune when the task finishes. `None` afterwards.
    children: Mutex<Option<Vec<Arc<dyn TaskCore>>>>,

    trace: Mutex<TraceBuilder>,
    serializer: Mutex<Option<Serializer<T>>>,
}

impl<T: Value> Core<T> {
    pub(crate) fn new(name: String, body: Body<T>) -> Self {
        Self {
            id: TaskId::next(),
            name,
            priority: AtomicI32::new(priority::DEFAULT),
            lifecycle: AtomicU8::new(CREATED),
            body: Mutex::new(Some(body)),
            promise: Promise::settable(),
            children: Mutex::new(Some(Vec::new())),
            trace: Mutex::new(TraceBuilder::default()),
            serializer: Mutex::new(None),
        }
    }

    pub(crate) fn promise(&self) -> &Promise<T> {
        &self.promise
    }

    pub(crate) fn set_priority(&self, priority: i32) -> bool {
        if !priority::is_valid(priority) {
            return false;
        }

        // The start transition happens under the body lock, so holding it
        // here freezes the lifecycle for the duration of the update.
        let _body = self.body.lock();

        if self.lifecycle.load(Ordering::Acquire) != CREATED {
            return false;
        }

        self.priority.store(priority, Ordering::Release);
        true
    }

    pub(crate) fn state(&self) -> TaskState {
        match self.lifecycle.load(Ordering::Acquire) {
            CREATED => TaskState::Created,
            RUNNING => TaskState::Running,
            _ => {
                if self.promise.is_failed() {
                    TaskState::Failed
                } else if self.promise.is_done() {
                    TaskState::Done
                } else {
                    // The outcome is being committed right now.
                    TaskState::Running
                }
            }
        }
    }

    pub(crate) fn update_trace(&self, update: impl FnOnce(&mut TraceBuilder)) {
        update(&mut self.trace.lock());
    }

    pub(crate) fn set_serializer(&self, serializer: Serializer<T>) {
        *self.serializer.lock() = Some(serializer);
    }

    pub(crate) fn trace(&self) -> ShallowTrace {
        let trace = self.trace.lock().clone();
        let serializer = self.serializer.lock().clone();

        let value = match (serializer, self.promise.value()) {
            (Some(serializer), Some(value)) => Some(serializer(&value)),
            _ => None,
        };

        ShallowTrace {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority.load(Ordering::Acquire),
            state: self.state(),
            task_type: trace.task_type,
            system_hidden: trace.system_hidden,
            fused: trace.fused,
            parent: trace.parent,
            predecessors: trace.predecessors,
            start: trace.start,
            end: trace.end,
            value,
            error: self.promise.error().map(|e| e.to_string()),
        }
    }

    /// Wins the `CREATED -> RUNNING` transition and takes the body.
    fn start(&self, fused_only: bool) -> Option<Body<T>> {
        let mut body = self.body.lock();

        if fused_only && !body.as_ref().is_some_and(|b| b.fused) {
            return None;
        }

        if self
            .lifecycle
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        body.take()
    }

    /// Invokes the work function and wires its promise to the task's own.
    fn execute(self: &Arc<Self>, body: Body<T>, context: &Context) {
        self.trace.lock().start = Some(Instant::now());

        match catch_unwind(AssertUnwindSafe(|| (body.work)(context))) {
            Ok(Ok(promise)) => {
                let core = self.clone();
                promise.add_listener(move |p| {
                    core.settle(p.get());
                });
            }
            Ok(Err(error)) => {
                self.settle(Err(error));
            }
            Err(payload) => {
                self.settle(Err(Error::from_panic(payload)));
            }
        }
    }

    /// Commits the outcome of a running task.
    fn settle(&self, outcome: Result<T>) -> bool {
        if self
            .lifecycle
            .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.finish(outcome);
        true
    }

    /// Prunes children that never started, then publishes the outcome.
    ///
    /// Must only be called by the thread that won the `FINISHED` transition.
    fn finish(&self, outcome: Result<T>) {
        self.trace.lock().end = Some(Instant::now());

        match &outcome {
            Ok(_) => tracing::trace!(task.id = %self.id, task.name = %self.name, "task done"),
            Err(error) => tracing::trace!(
                task.id = %self.id,
                task.name = %self.name,
                %error,
                "task failed"
            ),
        }

        let children = self.children.lock().take().unwrap_or_default();
        for child in children {
            child.cancel_pending(CancelReason::ParentCompleted);
        }

        self.promise.complete(outcome);
    }
}

impl<T: Value> TaskCore for Core<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }

    fn is_finished(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == FINISHED
    }

    fn context_run(
        self: Arc<Self>,
        scheduler: Arc<dyn Scheduler>,
        parent: Option<TaskId>,
        predecessors: Vec<TaskId>,
    ) {
        let Some(body) = self.start(false) else {
            return;
        };

        self.update_trace(|trace| {
            trace.parent = parent;
            trace.predecessors = predecessors;
        });

        tracing::trace!(task.id = %self.id, task.name = %self.name, "task started");

        let context = Context::new(scheduler, self.clone());
        self.execute(body, &context);
        context.flush();
    }

    fn run_inline(self: Arc<Self>, context: &Context) -> bool {
        let Some(body) = self.start(true) else {
            return false;
        };

        self.update_trace(|trace| {
            trace.fused = true;
            trace.parent = Some(context.task_id());
        });

        self.execute(body, context);
        true
    }

    fn cancel(&self, reason: CancelReason) -> bool {
        loop {
            let current = self.lifecycle.load(Ordering::Acquire);

            if current == FINISHED {
                return false;
            }

            if self
                .lifecycle
                .compare_exchange(current, FINISHED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // Release whatever the work function captured.
                drop(self.body.lock().take());

                tracing::debug!(task.id = %self.id, task.name = %self.name, %reason, "task cancelled");
                self.finish(Err(Error::Cancelled(reason)));
                return true;
            }
        }
    }

    fn cancel_pending(&self, reason: CancelReason) -> bool {
        if self
            .lifecycle
            .compare_exchange(CREATED, FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        drop(self.body.lock().take());

        tracing::debug!(task.id = %self.id, task.name = %self.name, %reason, "pending task cancelled");
        self.finish(Err(Error::Cancelled(reason)));
        true
    }

    fn adopt(&self, child: &Arc<dyn TaskCore>) -> bool {
        match self.children.lock().as_mut() {
            Some(children) => {
                children.push(child.clone());
                true
            }
            None => false,
        }
    }

    fn add_completion_listener(&self, listener: Box<dyn FnOnce(Result<()>) + Send>) {
        self.promise.add_listener(move |p| {
            let outcome = match p.error() {
                Some(error) => Err(error),
                None => Ok(()),
            };
            listener(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_body(value: u32) -> Body<u32> {
        Body::new(Box::new(move |_| Ok(Promise::resolved(value))), false)
    }

    #[test]
    fn priority_is_mutable_only_before_start() {
        let core = Core::new("t".into(), value_body(1));

        assert!(core.set_priority(5));
        assert_eq!(TaskCore::priority(&core), 5);
        assert!(!core.set_priority(priority::MAX + 1));

        assert!(core.start(false).is_some());
        assert!(!core.set_priority(7));
        assert_eq!(TaskCore::priority(&core), 5);
    }

    #[test]
    fn start_transition_is_won_once() {
        let core = Core::new("t".into(), value_body(1));

        assert!(core.start(false).is_some());
        assert!(core.start(false).is_none());
        assert_eq!(core.state(), TaskState::Running);
    }

    #[test]
    fn cancelling_created_task_drops_its_body() {
        let core = Core::new("t".into(), value_body(1));

        assert!(core.cancel(CancelReason::Requested));
        assert!(core.start(false).is_none());
        assert_eq!(core.state(), TaskState::Failed);
        assert!(matches!(
            core.promise().get(),
            Err(Error::Cancelled(CancelReason::Requested))
        ));
        assert!(!core.cancel(CancelReason::Requested));
    }

    #[test]
    fn cancel_pending_leaves_running_tasks_alone() {
        let core = Core::new("t".into(), value_body(1));
        let _body = core.start(false);

        assert!(!core.cancel_pending(CancelReason::ParentCompleted));
        assert_eq!(core.state(), TaskState::Running);

        assert!(core.settle(Ok(3)));
        assert!(!core.settle(Ok(4)));
        assert_eq!(core.promise().get().unwrap(), 3);
    }

    #[test]
    fn finished_parent_refuses_children() {
        let parent = Core::new("parent".into(), value_body(1));
        let child: Arc<dyn TaskCore> = Arc::new(Core::new("child".into(), value_body(2)));

        assert!(parent.adopt(&child));
        parent.cancel(CancelReason::Requested);

        assert!(child.is_finished());
        assert!(!parent.adopt(&child));
    }
}
