//! Predicates over resources that can say when they will next hold.
//!
//! Every condition is solved into [Windows]: the instants, on the microsecond grid, at which
//! it holds between "now" and some limit. Comparisons on real resources find the roots of
//! their dynamics; predicates on discrete resources walk forward over the boundaries where
//! the value is allowed to change. Combinators are set operations on windows.

use crate::public::resource::discrete::DiscreteResource;
use crate::public::resource::polynomial::Polynomial;
use crate::public::resource::real::RealResource;
use crate::public::resource::Snapshot;
use crate::{Duration, Instant};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

/// Sorted, disjoint, non-adjacent inclusive intervals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref)]
pub struct Windows(SmallVec<(Instant, Instant), 2>);

impl Windows {
    pub fn empty() -> Self {
        Windows(SmallVec::new())
    }

    pub fn single(start: Instant, end: Instant) -> Self {
        let mut result = Self::empty();
        result.push(start, end);
        result
    }

    /// Appends an interval that does not start before any existing one.
    fn push(&mut self, start: Instant, end: Instant) {
        if start > end {
            return;
        }
        if let Some(last) = self.0.last_mut() {
            if start.as_micros() <= last.1.as_micros().saturating_add(1) {
                last.1 = last.1.max(end);
                return;
            }
        }
        self.0.push((start, end));
    }

    pub fn union(&self, other: &Windows) -> Windows {
        let mut all: Vec<(Instant, Instant)> = self.0.iter().chain(other.0.iter()).copied().collect();
        all.sort();
        let mut result = Windows::empty();
        for (start, end) in all {
            result.push(start, end);
        }
        result
    }

    pub fn intersection(&self, other: &Windows) -> Windows {
        let mut result = Windows::empty();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a_start, a_end) = self.0[i];
            let (b_start, b_end) = other.0[j];
            result.push(a_start.max(b_start), a_end.min(b_end));
            if a_end < b_end {
                i += 1;
            } else {
                j += 1;
            }
        }
        result
    }

    /// The instants in `[from, to]` not covered by these windows.
    pub fn complement(&self, from: Instant, to: Instant) -> Windows {
        let mut result = Windows::empty();
        let mut cursor = from.as_micros();
        for &(start, end) in self.0.iter() {
            if end < from || start > to {
                continue;
            }
            if start.as_micros() > cursor {
                result.push(Instant::from_micros(cursor), Instant::from_micros(start.as_micros() - 1));
            }
            match end.as_micros().checked_add(1) {
                Some(next) => cursor = cursor.max(next),
                None => return result,
            }
        }
        if cursor <= to.as_micros() {
            result.push(Instant::from_micros(cursor), to);
        }
        result
    }

    pub fn first_instant(&self) -> Option<Instant> {
        self.0.first().map(|(start, _)| *start)
    }

    pub fn contains(&self, time: Instant) -> bool {
        self.0.iter().any(|&(start, end)| start <= time && time <= end)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    LessThan,
    AtMost,
    GreaterThan,
    AtLeast,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::LessThan => value < threshold,
            Comparison::AtMost => value <= threshold,
            Comparison::GreaterThan => value > threshold,
            Comparison::AtLeast => value >= threshold,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::LessThan => "<",
            Comparison::AtMost => "<=",
            Comparison::GreaterThan => ">",
            Comparison::AtLeast => ">=",
        }
    }
}

/// Something that can be solved for the windows in which it holds.
pub trait Scan: Send + Sync {
    fn windows(&self, now: &Snapshot, to: Instant) -> Windows;
}

#[derive(Clone)]
pub enum Condition {
    Always,
    Never,
    Compare {
        resource: RealResource,
        comparison: Comparison,
        threshold: f64,
    },
    Discrete(Arc<dyn Scan>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// The instants in `[now, to]` at which this condition holds.
    pub fn windows(&self, now: &Snapshot, to: Instant) -> Windows {
        let from = now.now();
        if to < from {
            return Windows::empty();
        }
        match self {
            Condition::Always => Windows::single(from, to),
            Condition::Never => Windows::empty(),
            Condition::Compare {
                resource,
                comparison,
                threshold,
            } => compare_windows(&resource.dynamics(now), *comparison, *threshold, from, to),
            Condition::Discrete(scan) => scan.windows(now, to).intersection(&Windows::single(from, to)),
            Condition::And(left, right) => left.windows(now, to).intersection(&right.windows(now, to)),
            Condition::Or(left, right) => left.windows(now, to).union(&right.windows(now, to)),
            Condition::Not(inner) => inner.windows(now, to).complement(from, to),
        }
    }

    /// The earliest instant in `[now, horizon]` at which this condition holds.
    pub fn next_satisfied(&self, now: &Snapshot, horizon: Instant) -> Option<Instant> {
        self.windows(now, horizon).first_instant()
    }

    pub fn holds(&self, now: &Snapshot) -> bool {
        self.next_satisfied(now, now.now()).is_some()
    }
}

/// Solves `dynamics (cmp) threshold` over `[from, to]`.
///
/// Only the points adjacent to a root can change truth, so the comparison is checked at the
/// floor and ceiling of every root and once inside each gap between them.
fn compare_windows(
    dynamics: &Polynomial,
    comparison: Comparison,
    threshold: f64,
    from: Instant,
    to: Instant,
) -> Windows {
    let span = to
        .checked_duration_since(from)
        .unwrap_or(Duration::MAX)
        .as_micros();
    let shifted = dynamics - &Polynomial::constant(threshold);
    let holds = |offset: i64| comparison.holds(shifted.evaluate_seconds(offset as f64 / 1e6), 0.0);

    let mut candidates = BTreeSet::from([0, span]);
    for root in shifted.roots_between(0.0, span as f64 / 1e6) {
        let micros = root * 1e6;
        for point in [micros.floor(), micros.ceil()] {
            candidates.insert((point as i64).clamp(0, span));
        }
    }

    let mut result = Windows::empty();
    let at = |offset: i64| Instant::from_micros(from.as_micros().saturating_add(offset));
    let points: Vec<i64> = candidates.into_iter().collect();
    for (i, &point) in points.iter().enumerate() {
        if holds(point) {
            result.push(at(point), at(point));
        }
        if let Some(&next) = points.get(i + 1) {
            if next - point >= 2 && holds(point + 1) {
                result.push(at(point + 1), at(next - 1));
            }
        }
    }
    result
}

/// Boundary scan for a predicate over a discrete resource.
pub struct DiscreteScan<T> {
    resource: DiscreteResource<T>,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> DiscreteScan<T> {
    pub(crate) fn new(
        resource: DiscreteResource<T>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        DiscreteScan {
            resource,
            predicate: Box::new(predicate),
        }
    }
}

/// Upper bound on value segments visited by one scan.
const MAX_SCANNED_SEGMENTS: usize = 100_000;

impl<T: Clone + Send + Sync + 'static> Scan for DiscreteScan<T> {
    fn windows(&self, now: &Snapshot, to: Instant) -> Windows {
        let mut result = Windows::empty();
        let mut at = now.now();
        for _ in 0..MAX_SCANNED_SEGMENTS {
            if at > to {
                break;
            }
            let segment = self.resource.dynamics(&now.at(at));
            let end = segment.end.filter(|end| *end > at);
            let last = match end {
                Some(end) => (end - Duration::EPSILON).min(to),
                None => to,
            };
            if (self.predicate)(&segment.dynamics) {
                result.push(at, last);
            }
            match end {
                Some(end) if end <= to => at = end,
                _ => break,
            }
        }
        result
    }
}

impl Debug for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Always => write!(f, "always"),
            Condition::Never => write!(f, "never"),
            Condition::Compare {
                comparison,
                threshold,
                ..
            } => write!(f, "real {} {threshold}", comparison.symbol()),
            Condition::Discrete(_) => write!(f, "discrete predicate"),
            Condition::And(l, r) => write!(f, "({l:?} and {r:?})"),
            Condition::Or(l, r) => write!(f, "({l:?} or {r:?})"),
            Condition::Not(inner) => write!(f, "not {inner:?}"),
        }
    }
}

impl BitAnd for Condition {
    type Output = Condition;
    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;
    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;
    fn not(self) -> Condition {
        self.negate()
    }
}
