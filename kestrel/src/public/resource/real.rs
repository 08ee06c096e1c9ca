use crate::Instant;
use crate::public::condition::{Comparison, Condition};
use crate::public::resource::approximation::{Approximator, DelimitedDynamics};
use crate::public::resource::polynomial::Polynomial;
use crate::public::resource::{Resource, ResourceId, Snapshot};
use std::fmt::{Debug, Formatter};
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

type Property = Arc<dyn Fn(&Snapshot<'_>) -> Polynomial + Send + Sync>;

/// A continuously varying number, described by its polynomial dynamics from "now" forward.
#[derive(Clone)]
pub struct RealResource {
    id: ResourceId,
    property: Property,
}

impl RealResource {
    /// A resource computed directly from cell state.
    pub fn atom(property: impl Fn(&Snapshot<'_>) -> Polynomial + Send + Sync + 'static) -> Self {
        RealResource {
            id: ResourceId::fresh(),
            property: Arc::new(property),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::atom(move |_| Polynomial::constant(value))
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn dynamics(&self, now: &Snapshot) -> Polynomial {
        now.memoized(self.id, || (self.property)(now))
    }

    pub fn ask(&self, now: &Snapshot) -> f64 {
        self.dynamics(now).value()
    }

    /// Segments covering `[now, until)`.
    pub fn approximate(
        &self,
        now: &Snapshot,
        until: Instant,
        approximator: &dyn Approximator,
    ) -> Vec<DelimitedDynamics<Polynomial>> {
        approximator.approximate(&self.dynamics(now), now.now(), until)
    }

    fn combine(&self, other: &RealResource, f: impl Fn(&Polynomial, &Polynomial) -> Polynomial + Send + Sync + 'static) -> Self {
        let (left, right) = (self.clone(), other.clone());
        Self::atom(move |now| f(&left.dynamics(now), &right.dynamics(now)))
    }

    pub fn plus(&self, other: &RealResource) -> Self {
        self.combine(other, |a, b| a + b)
    }

    pub fn minus(&self, other: &RealResource) -> Self {
        self.combine(other, |a, b| a - b)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let inner = self.clone();
        Self::atom(move |now| &inner.dynamics(now) * factor)
    }

    pub fn negated(&self) -> Self {
        let inner = self.clone();
        Self::atom(move |now| -&inner.dynamics(now))
    }

    pub fn sum<'r>(resources: impl IntoIterator<Item = &'r RealResource>) -> Self {
        let parts: Vec<RealResource> = resources.into_iter().cloned().collect();
        Self::atom(move |now| {
            parts
                .iter()
                .fold(Polynomial::default(), |acc, r| &acc + &r.dynamics(now))
        })
    }

    fn compare(&self, comparison: Comparison, threshold: f64) -> Condition {
        Condition::Compare {
            resource: self.clone(),
            comparison,
            threshold,
        }
    }

    pub fn less_than(&self, threshold: f64) -> Condition {
        self.compare(Comparison::LessThan, threshold)
    }

    pub fn at_most(&self, threshold: f64) -> Condition {
        self.compare(Comparison::AtMost, threshold)
    }

    pub fn greater_than(&self, threshold: f64) -> Condition {
        self.compare(Comparison::GreaterThan, threshold)
    }

    pub fn at_least(&self, threshold: f64) -> Condition {
        self.compare(Comparison::AtLeast, threshold)
    }

    /// Inclusive on both ends.
    pub fn between(&self, low: f64, high: f64) -> Condition {
        self.at_least(low) & self.at_most(high)
    }
}

impl Resource for RealResource {
    type Value = f64;

    fn sample(&self, now: &Snapshot) -> f64 {
        self.ask(now)
    }
}

impl Debug for RealResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RealResource").field(&self.id).finish()
    }
}

impl Add for &RealResource {
    type Output = RealResource;
    fn add(self, rhs: &RealResource) -> RealResource {
        self.plus(rhs)
    }
}

impl Sub for &RealResource {
    type Output = RealResource;
    fn sub(self, rhs: &RealResource) -> RealResource {
        self.minus(rhs)
    }
}

impl Neg for &RealResource {
    type Output = RealResource;
    fn neg(self) -> RealResource {
        self.negated()
    }
}

impl Mul<f64> for &RealResource {
    type Output = RealResource;
    fn mul(self, rhs: f64) -> RealResource {
        self.scaled(rhs)
    }
}
