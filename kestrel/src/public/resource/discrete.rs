use crate::Instant;
use crate::public::condition::{Condition, DiscreteScan};
use crate::public::resource::approximation::DelimitedDynamics;
use crate::public::resource::{Resource, ResourceId, Snapshot};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type Property<T> = Arc<dyn Fn(&Snapshot<'_>) -> DelimitedDynamics<T> + Send + Sync>;

/// A value that changes only in steps.
///
/// Each evaluation reports the current value and, if known, the instant it is next allowed
/// to change. Values that only change through effects are persistent; values that depend on
/// time directly carry an end, which is where conditions look for the next boundary.
pub struct DiscreteResource<T> {
    id: ResourceId,
    property: Property<T>,
}

impl<T> Clone for DiscreteResource<T> {
    fn clone(&self) -> Self {
        DiscreteResource {
            id: self.id,
            property: self.property.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> DiscreteResource<T> {
    pub fn atom(property: impl Fn(&Snapshot<'_>) -> T + Send + Sync + 'static) -> Self {
        Self::delimited(move |now| DelimitedDynamics::persistent(now.now(), property(now)))
    }

    /// A resource whose property also says how long its value holds.
    pub fn delimited(
        property: impl Fn(&Snapshot<'_>) -> DelimitedDynamics<T> + Send + Sync + 'static,
    ) -> Self {
        DiscreteResource {
            id: ResourceId::fresh(),
            property: Arc::new(property),
        }
    }

    pub fn constant(value: T) -> Self {
        Self::atom(move |_| value.clone())
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn dynamics(&self, now: &Snapshot) -> DelimitedDynamics<T> {
        now.memoized(self.id, || (self.property)(now))
    }

    pub fn ask(&self, now: &Snapshot) -> T {
        self.dynamics(now).dynamics
    }

    pub fn map<U: Clone + Send + Sync + 'static>(
        &self,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> DiscreteResource<U> {
        let inner = self.clone();
        DiscreteResource::delimited(move |now| inner.dynamics(now).map(|value| f(&value)))
    }

    pub fn zip<U, V>(
        &self,
        other: &DiscreteResource<U>,
        f: impl Fn(&T, &U) -> V + Send + Sync + 'static,
    ) -> DiscreteResource<V>
    where
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let (left, right) = (self.clone(), other.clone());
        DiscreteResource::delimited(move |now| {
            let a = left.dynamics(now);
            let b = right.dynamics(now);
            let end = match (a.end, b.end) {
                (Some(x), Some(y)) => Some(x.min(y)),
                (x, y) => x.or(y),
            };
            DelimitedDynamics {
                start: now.now(),
                end,
                dynamics: f(&a.dynamics, &b.dynamics),
            }
        })
    }

    pub fn satisfies(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Condition {
        Condition::Discrete(Arc::new(DiscreteScan::new(self.clone(), predicate)))
    }

    pub fn is(&self, value: T) -> Condition
    where
        T: PartialEq,
    {
        self.satisfies(move |v| *v == value)
    }

    pub fn is_one_of(&self, values: impl IntoIterator<Item = T>) -> Condition
    where
        T: PartialEq,
    {
        let values: Vec<T> = values.into_iter().collect();
        self.satisfies(move |v| values.contains(v))
    }

    /// The instant the current value is next allowed to change, if any.
    pub fn valid_until(&self, now: &Snapshot) -> Option<Instant> {
        self.dynamics(now).end
    }
}

impl<T: Clone + Send + Sync + 'static> Resource for DiscreteResource<T> {
    type Value = T;

    fn sample(&self, now: &Snapshot) -> T {
        self.ask(now)
    }
}

impl<T> Debug for DiscreteResource<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DiscreteResource").field(&self.id).finish()
    }
}
