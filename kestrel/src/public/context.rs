use crate::internal::exec::{Frame, Request, Spawned, TaskBody, TaskFuture};
use crate::public::activity::Activity;
use crate::public::cell::Cell;
use crate::public::condition::Condition;
use crate::public::resource::{Resource, Snapshot};
use crate::public::schema::{Query, Schema};
use crate::public::task::TaskId;
use crate::{Duration, Instant};
use futures::FutureExt;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context as PollContext, Poll};
use tracing::trace;

/// A task's handle on the simulation.
///
/// Every read goes through the task's own branch of history, so a task sees its own writes
/// immediately and other tasks' writes at the same instant only after the instant is joined.
/// The only places a task gives up control are [Context::delay], [Context::wait_for], and
/// [Context::wait_until].
pub struct Context<M> {
    task: TaskId,
    frame: Rc<RefCell<Frame<M>>>,
    schema: Arc<Schema<M>>,
}

impl<M: 'static> Context<M> {
    pub(crate) fn new(task: TaskId, frame: Rc<RefCell<Frame<M>>>, schema: Arc<Schema<M>>) -> Self {
        Context { task, frame, schema }
    }

    pub fn id(&self) -> TaskId {
        self.task
    }

    pub fn model(&self) -> &M {
        self.schema.model()
    }

    pub fn now(&self) -> Instant {
        self.frame.borrow().clock
    }

    /// Runs `f` against this task's current view of the simulation.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        let cursor = self.frame.borrow_mut().active_for(self.task).cursor;
        let frame = self.frame.borrow();
        f(&Snapshot::new(&frame.history, cursor))
    }

    pub fn get<R: Resource>(&self, resource: &R) -> R::Value {
        self.with_snapshot(|now| resource.sample(now))
    }

    pub fn read<E, C: Cell>(&self, query: &Query<E, C>) -> C {
        self.with_snapshot(|now| now.ask(query))
    }

    pub fn holds(&self, condition: &Condition) -> bool {
        self.with_snapshot(|now| condition.holds(now))
    }

    pub fn emit<E, C: Cell>(&self, query: &Query<E, C>, event: E) {
        let effect = query.interpret(event);
        let mut frame = self.frame.borrow_mut();
        let cursor = frame.active_for(self.task).cursor;
        let next = frame.history.commit(cursor, query.cell(), Box::new(effect));
        frame.active_for(self.task).cursor = next;
        trace!(task = %self.task, "emit");
    }

    fn enqueue(&self, label: String, delay: Duration, body: TaskBody<M>) -> TaskId {
        let mut frame = self.frame.borrow_mut();
        frame.active_for(self.task);
        let id = frame.allocate_task();
        frame.spawned.push(Spawned {
            id,
            parent: self.task,
            label,
            delay,
            body,
        });
        id
    }

    /// Starts a child task at the current instant. The caller keeps running.
    pub fn spawn<F, Fut>(&self, label: impl Into<String>, body: F) -> TaskId
    where
        F: FnOnce(Context<M>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.enqueue(label.into(), Duration::ZERO, Box::new(move |ctx| body(ctx).boxed_local()))
    }

    /// Starts a child task after `delay`.
    ///
    /// A negative delay fails the child when it would have started.
    pub fn defer<F, Fut>(&self, delay: Duration, label: impl Into<String>, body: F) -> TaskId
    where
        F: FnOnce(Context<M>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.enqueue(label.into(), delay, Box::new(move |ctx| body(ctx).boxed_local()))
    }

    /// Starts an activity as a child task, after validating it.
    pub fn spawn_activity<A: Activity<M>>(&self, activity: A) -> anyhow::Result<TaskId> {
        let failures = activity.validate();
        if !failures.is_empty() {
            anyhow::bail!("activity failed validation: {}", failures.join("; "));
        }
        let label = short_type_name::<A>();
        let activity: Box<dyn Activity<M>> = Box::new(activity);
        Ok(self.enqueue(label, Duration::ZERO, Box::new(move |ctx| activity.run(ctx))))
    }

    /// Spawns a child and waits for it to finish.
    pub async fn call<F, Fut>(&self, label: impl Into<String>, body: F) -> TaskId
    where
        F: FnOnce(Context<M>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let id = self.spawn(label, body);
        self.wait_for(id).await;
        id
    }

    /// Resumes at exactly `now + duration`.
    pub fn delay(&self, duration: Duration) -> Suspend<M> {
        self.suspend(Request::Delay(duration))
    }

    /// Resumes when `task` has finished, successfully or not.
    pub fn wait_for(&self, task: TaskId) -> Suspend<M> {
        self.suspend(Request::Task(task))
    }

    /// Resumes at the earliest instant at which `condition` holds, which may be now.
    pub fn wait_until(&self, condition: Condition) -> Suspend<M> {
        self.suspend(Request::Condition(condition))
    }

    fn suspend(&self, request: Request) -> Suspend<M> {
        Suspend {
            task: self.task,
            frame: self.frame.clone(),
            request: Some(request),
        }
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A suspension point. Completes the second time it is polled, which the engine only does
/// once the request has been satisfied.
#[must_use = "suspensions do nothing unless awaited"]
pub struct Suspend<M> {
    task: TaskId,
    frame: Rc<RefCell<Frame<M>>>,
    request: Option<Request>,
}

impl<M> Future for Suspend<M> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut PollContext<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.request.take() {
            Some(request) => {
                this.frame.borrow_mut().active_for(this.task).request = Some(request);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}
