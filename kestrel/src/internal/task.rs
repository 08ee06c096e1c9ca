use crate::internal::exec::{TaskBody, TaskFuture};
use crate::public::task::{TaskId, TaskState};

pub(crate) enum Program<M> {
    Unstarted(TaskBody<M>),
    Started(TaskFuture),
    Finished,
}

/// The engine's record of one task.
pub(crate) struct Task<M> {
    pub(crate) label: String,
    pub(crate) parent: Option<TaskId>,
    pub(crate) state: TaskState,
    pub(crate) program: Program<M>,
}

impl<M> Task<M> {
    pub(crate) fn new(label: String, parent: Option<TaskId>, state: TaskState, body: TaskBody<M>) -> Self {
        Task {
            label,
            parent,
            state,
            program: Program::Unstarted(body),
        }
    }
}
