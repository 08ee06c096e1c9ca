use crate::Instant;
use crate::public::condition::Condition;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies a task. Ids are handed out in spawn order, which makes them the tiebreak
/// between tasks due at the same instant.
#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("task#{_0}")]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(id: u64) -> Self {
        TaskId(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug)]
pub enum TaskState {
    Runnable,
    WaitingUntil(Instant),
    WaitingOnCondition(Condition),
    WaitingOnChild(TaskId),
    Completed,
    Failed(String),
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed(_))
    }
}
