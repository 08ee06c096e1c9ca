//! Derived, read-only views of simulation state.
//!
//! Resources are pure functions of a [Snapshot]. The engine memoizes them per history node,
//! so reading the same resource twice at one point of a run costs one evaluation.

pub mod approximation;
pub mod builtins;
pub mod discrete;
pub mod polynomial;
pub mod real;

pub use approximation::{Approximator, DelimitedDynamics, Exact, SecantApproximator};
pub use discrete::DiscreteResource;
pub use polynomial::Polynomial;
pub use real::RealResource;

use crate::internal::history::{History, NodeId};
use crate::public::cell::Cell;
use crate::public::schema::Query;
use crate::Instant;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Identifies a resource for memoization.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(0);

impl ResourceId {
    pub(crate) fn fresh() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A read-only view of the simulation at one history node.
///
/// The view may be projected forward to a later instant with [Snapshot::at]; cells are then
/// stepped over the gap as if nothing else happened.
#[derive(Copy, Clone)]
pub struct Snapshot<'h> {
    history: &'h History,
    node: NodeId,
    at: Instant,
}

impl<'h> Snapshot<'h> {
    pub fn new(history: &'h History, node: NodeId) -> Self {
        Snapshot {
            history,
            node,
            at: history.time(node),
        }
    }

    /// The same node, viewed from a later instant.
    pub fn at(&self, at: Instant) -> Snapshot<'h> {
        Snapshot {
            history: self.history,
            node: self.node,
            at: at.max(self.history.time(self.node)),
        }
    }

    pub fn now(&self) -> Instant {
        self.at
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn history(&self) -> &'h History {
        self.history
    }

    fn is_projected(&self) -> bool {
        self.at != self.history.time(self.node)
    }

    pub fn ask<E, C: Cell>(&self, query: &Query<E, C>) -> C {
        let mut cell = self.history.ask(query, self.node);
        if self.is_projected() {
            cell.step(self.history.elapsed(self.node, self.at));
        }
        cell
    }

    pub(crate) fn memoized<T: Clone + 'static>(&self, resource: ResourceId, compute: impl FnOnce() -> T) -> T {
        if self.is_projected() {
            compute()
        } else {
            self.history.memoized(resource, self.node, compute)
        }
    }
}

/// Anything that can be sampled from a snapshot.
pub trait Resource {
    type Value;

    fn sample(&self, now: &Snapshot) -> Self::Value;
}

/// Converts discrete values into the self-describing form used in exported profiles.
pub trait ValueMapper<T>: Send + Sync + 'static {
    fn to_value(&self, value: &T) -> Value;
}

/// Maps values through their [Serialize] impl.
#[derive(Copy, Clone, Debug, Default)]
pub struct SerdeMapper;

impl<T: Serialize> ValueMapper<T> for SerdeMapper {
    fn to_value(&self, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "discrete value could not be serialized");
                Value::Null
            }
        }
    }
}

impl<T, F: Fn(&T) -> Value + Send + Sync + 'static> ValueMapper<T> for F {
    fn to_value(&self, value: &T) -> Value {
        self(value)
    }
}
