//! The machinery that drives task bodies one step at a time.
//!
//! Task bodies are ordinary futures, but nothing here is asynchronous in the I/O sense: a body
//! is polled exactly once per resumption, with a no-op waker. When it awaits one of the
//! [Context](crate::Context) suspension points, the suspension future records a [Request] in
//! the shared [Frame] and returns `Pending`; the engine reads the request back and decides
//! when to poll again.

use crate::internal::history::{History, NodeId};
use crate::public::condition::Condition;
use crate::public::context::Context;
use crate::public::task::TaskId;
use crate::{Duration, Instant};
use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::task::{Context as PollContext, Poll};

/// The future produced by a task body.
pub type TaskFuture = LocalBoxFuture<'static, anyhow::Result<()>>;

pub(crate) type TaskBody<M> = Box<dyn FnOnce(Context<M>) -> TaskFuture>;

/// What a suspended task is waiting for.
pub(crate) enum Request {
    Delay(Duration),
    Condition(Condition),
    Task(TaskId),
}

/// The task currently being polled, and the branch of history it is writing to.
pub(crate) struct Active {
    pub(crate) task: TaskId,
    pub(crate) cursor: NodeId,
    pub(crate) request: Option<Request>,
}

/// A task created by a running task, not yet admitted by the engine.
pub(crate) struct Spawned<M> {
    pub(crate) id: TaskId,
    pub(crate) parent: TaskId,
    pub(crate) label: String,
    pub(crate) delay: Duration,
    pub(crate) body: TaskBody<M>,
}

/// State shared between the engine and every [Context] of one simulation.
pub(crate) struct Frame<M> {
    pub(crate) history: History,
    pub(crate) clock: Instant,
    pub(crate) active: Option<Active>,
    pub(crate) spawned: Vec<Spawned<M>>,
    next_task: u64,
}

impl<M> Frame<M> {
    pub(crate) fn new(history: History) -> Self {
        Frame {
            history,
            clock: Instant::ORIGIN,
            active: None,
            spawned: Vec::new(),
            next_task: 0,
        }
    }

    pub(crate) fn allocate_task(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task);
        self.next_task += 1;
        id
    }

    /// The active record of `task`.
    ///
    /// # Panics
    ///
    /// If `task` is not the one being polled; contexts only work inside their own task.
    pub(crate) fn active_for(&mut self, task: TaskId) -> &mut Active {
        match &mut self.active {
            Some(active) if active.task == task => active,
            _ => panic!("the context of {task} was used outside of its own task"),
        }
    }
}

/// Calls a task body to obtain its future, catching panics.
pub(crate) fn start<M>(body: TaskBody<M>, ctx: Context<M>) -> Result<TaskFuture, String> {
    catch_unwind(AssertUnwindSafe(move || body(ctx))).map_err(panic_message)
}

/// Polls a task once, catching panics.
pub(crate) fn drive(future: &mut TaskFuture) -> Poll<Result<(), String>> {
    let mut cx = PollContext::from_waker(noop_waker_ref());
    match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
        Ok(Poll::Ready(Ok(()))) => Poll::Ready(Ok(())),
        Ok(Poll::Ready(Err(e))) => Poll::Ready(Err(format!("{e:#}"))),
        Ok(Poll::Pending) => Poll::Pending,
        Err(payload) => Poll::Ready(Err(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
