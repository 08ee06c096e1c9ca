//! What a run produced: exported profiles and everything that went wrong along the way.

use crate::Instant;
use crate::public::activity::{ActivityId, UnconstructableActivity};
use crate::public::config::epoch_format;
use crate::public::resource::approximation::DelimitedDynamics;
use crate::public::resource::polynomial::Polynomial;
use crate::public::task::TaskId;
use hifitime::Epoch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedActivity {
    pub activity: ActivityId,
    pub kind: String,
    pub start: Instant,
    pub error: UnconstructableActivity,
}

/// A cell that received non-commuting concurrent effects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConflict {
    pub cell: String,
    pub time: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: TaskId,
    pub label: String,
    pub time: Instant,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingWait {
    Until { time: Instant },
    Condition { description: String },
    Task { task: TaskId },
}

/// A task still suspended when the run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedWait {
    pub task: TaskId,
    pub label: String,
    pub wait: PendingWait,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub rejected: Vec<RejectedActivity>,
    pub conflicts: Vec<CellConflict>,
    pub failures: Vec<TaskFailure>,
    pub unresolved: Vec<UnresolvedWait>,
}

impl RunReport {
    /// True when nothing was rejected, conflicted, failed, or left waiting.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
            && self.conflicts.is_empty()
            && self.failures.is_empty()
            && self.unresolved.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscreteSegment {
    pub start: Instant,
    pub value: Value,
}

/// Exported resource histories, keyed by namespace-qualified name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profiles {
    pub real: BTreeMap<String, Vec<DelimitedDynamics<Polynomial>>>,
    pub discrete: BTreeMap<String, Vec<DiscreteSegment>>,
}

impl Profiles {
    pub fn real_value_at(&self, name: &str, time: Instant) -> Option<f64> {
        self.real
            .get(name)?
            .iter()
            .rev()
            .find(|segment| segment.start <= time && segment.end.is_none_or(|end| time <= end))
            .map(|segment| segment.value_at(time))
    }

    pub fn discrete_value_at(&self, name: &str, time: Instant) -> Option<&Value> {
        self.discrete
            .get(name)?
            .iter()
            .take_while(|segment| segment.start <= time)
            .last()
            .map(|segment| &segment.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    #[serde(with = "epoch_format")]
    pub start: Epoch,
    pub end: Instant,
    pub profiles: Profiles,
    pub report: RunReport,
}

impl SimulationResults {
    pub fn epoch_of(&self, time: Instant) -> Epoch {
        time.to_epoch(self.start)
    }
}
