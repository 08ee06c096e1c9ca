//! Converting continuous dynamics into bounded segments.

use crate::public::resource::polynomial::Polynomial;
use crate::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Dynamics together with the window over which they are valid.
///
/// `end` is exclusive; `None` means the dynamics hold until something changes them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelimitedDynamics<D> {
    pub start: Instant,
    pub end: Option<Instant>,
    pub dynamics: D,
}

impl<D> DelimitedDynamics<D> {
    pub fn persistent(start: Instant, dynamics: D) -> Self {
        DelimitedDynamics {
            start,
            end: None,
            dynamics,
        }
    }

    pub fn bounded(start: Instant, end: Instant, dynamics: D) -> Self {
        DelimitedDynamics {
            start,
            end: Some(end),
            dynamics,
        }
    }

    pub fn contains(&self, time: Instant) -> bool {
        time >= self.start && self.end.is_none_or(|end| time < end)
    }

    pub fn map<E>(self, f: impl FnOnce(D) -> E) -> DelimitedDynamics<E> {
        DelimitedDynamics {
            start: self.start,
            end: self.end,
            dynamics: f(self.dynamics),
        }
    }
}

impl DelimitedDynamics<Polynomial> {
    pub fn value_at(&self, time: Instant) -> f64 {
        self.dynamics.evaluate(time - self.start)
    }
}

/// Breaks a polynomial over `[start, end)` into delimited segments.
pub trait Approximator: Send + Sync {
    fn approximate(
        &self,
        dynamics: &Polynomial,
        start: Instant,
        end: Instant,
    ) -> Vec<DelimitedDynamics<Polynomial>>;
}

/// Keeps the dynamics as they are, in one segment.
#[derive(Copy, Clone, Debug, Default)]
pub struct Exact;

impl Approximator for Exact {
    fn approximate(
        &self,
        dynamics: &Polynomial,
        start: Instant,
        end: Instant,
    ) -> Vec<DelimitedDynamics<Polynomial>> {
        vec![DelimitedDynamics::bounded(start, end, dynamics.clone())]
    }
}

/// Replaces nonlinear dynamics with chords.
///
/// Each chord is as long as possible, up to `max_segment`, while its midpoint stays within
/// `tolerance` of the true curve.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecantApproximator {
    pub tolerance: f64,
    pub max_segment: Duration,
}

impl Approximator for SecantApproximator {
    fn approximate(
        &self,
        dynamics: &Polynomial,
        start: Instant,
        end: Instant,
    ) -> Vec<DelimitedDynamics<Polynomial>> {
        if dynamics.degree() <= 1 || end <= start {
            return Exact.approximate(dynamics, start, end);
        }
        let max_segment = self.max_segment.max(Duration::EPSILON);
        let mut segments = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let offset = cursor - start;
            let remaining = end - cursor;
            let mut length = max_segment.min(remaining);
            loop {
                let from = dynamics.evaluate(offset);
                let to = dynamics.evaluate(offset + length);
                let seconds = length.as_seconds_f64();
                let chord = Polynomial::linear(from, (to - from) / seconds);
                let midpoint = Duration::from_micros(length.as_micros() / 2);
                let error = (dynamics.evaluate(offset + midpoint) - chord.evaluate(midpoint)).abs();
                if error <= self.tolerance || length <= Duration::MILLISECOND {
                    segments.push(DelimitedDynamics::bounded(cursor, cursor + length, chord));
                    break;
                }
                length = Duration::from_micros(length.as_micros() / 2);
            }
            cursor += length;
        }
        segments
    }
}
