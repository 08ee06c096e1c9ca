use crate::{Duration, Instant};
use crate::public::report::{DiscreteSegment, Profiles};
use crate::public::resource::approximation::Approximator;
use crate::public::resource::discrete::DiscreteResource;
use crate::public::resource::polynomial::Polynomial;
use crate::public::resource::real::RealResource;
use crate::public::resource::Snapshot;
use crate::public::schema::Schema;
use serde_json::Value;

const SAME_DYNAMICS: f64 = 1e-9;

/// Upper bound on value boundaries walked between two samples of one track.
const MAX_WALKED_BOUNDARIES: usize = 100_000;

struct RealTrack {
    name: String,
    resource: RealResource,
    segments: Vec<(Instant, Polynomial)>,
}

struct DiscreteTrack {
    name: String,
    resource: DiscreteResource<Value>,
    segments: Vec<DiscreteSegment>,
}

/// Samples every exported resource after each step and keeps only the changes.
pub(crate) struct ProfileRecorder {
    real: Vec<RealTrack>,
    discrete: Vec<DiscreteTrack>,
}

impl ProfileRecorder {
    pub(crate) fn new<M>(schema: &Schema<M>) -> Self {
        ProfileRecorder {
            real: schema
                .real
                .iter()
                .map(|(name, resource)| RealTrack {
                    name: name.clone(),
                    resource: resource.clone(),
                    segments: Vec::new(),
                })
                .collect(),
            discrete: schema
                .discrete
                .iter()
                .map(|(name, resource)| DiscreteTrack {
                    name: name.clone(),
                    resource: resource.clone(),
                    segments: Vec::new(),
                })
                .collect(),
        }
    }

    pub(crate) fn sample(&mut self, now: &Snapshot) {
        let time = now.now();
        for track in &mut self.real {
            let dynamics = track.resource.dynamics(now);
            let segments = &mut track.segments;
            if segments.last().is_some_and(|(start, _)| *start == time) {
                segments.pop();
            }
            if let Some((start, previous)) = segments.last() {
                if previous.shifted(time - *start).approx_eq(&dynamics, SAME_DYNAMICS) {
                    continue;
                }
            }
            segments.push((time, dynamics));
        }
        for track in &mut self.discrete {
            record_change(&mut track.segments, time, track.resource.ask(now));
        }
    }

    /// Records the value changes that `last` implies strictly before `until`.
    ///
    /// Called with the previous frontier just before a later step is sampled, so that values
    /// which change with time alone show up when they change rather than at the next step.
    pub(crate) fn fill(&mut self, last: &Snapshot, until: Instant) {
        let Ok(through) = until.checked_sub(Duration::EPSILON) else {
            return;
        };
        for track in &mut self.discrete {
            walk_boundaries(&track.resource, last, through, &mut track.segments);
        }
    }

    /// Everything recorded so far, with real dynamics segmented up to `end` and discrete
    /// boundaries after the last sample (`last`) walked through `end`.
    pub(crate) fn export(&self, last: &Snapshot, end: Instant, approximator: &dyn Approximator) -> Profiles {
        let mut profiles = Profiles::default();
        for track in &self.real {
            let mut segments = Vec::new();
            for (i, (start, dynamics)) in track.segments.iter().enumerate() {
                let until = track
                    .segments
                    .get(i + 1)
                    .map(|(next, _)| *next)
                    .unwrap_or(end)
                    .max(*start);
                segments.extend(approximator.approximate(dynamics, *start, until));
            }
            profiles.real.insert(track.name.clone(), segments);
        }
        for track in &self.discrete {
            let mut segments = track.segments.clone();
            walk_boundaries(&track.resource, last, end, &mut segments);
            profiles.discrete.insert(track.name.clone(), segments);
        }
        profiles
    }
}

fn record_change(segments: &mut Vec<DiscreteSegment>, time: Instant, value: Value) {
    if segments.last().is_some_and(|s| s.start == time) {
        segments.pop();
    }
    if segments.last().is_some_and(|s| s.value == value) {
        return;
    }
    segments.push(DiscreteSegment { start: time, value });
}

/// Follows the end of each delimited value from `from` up to and including `through`.
fn walk_boundaries(
    resource: &DiscreteResource<Value>,
    from: &Snapshot,
    through: Instant,
    segments: &mut Vec<DiscreteSegment>,
) {
    let mut at = from.now();
    for _ in 0..MAX_WALKED_BOUNDARIES {
        let next = resource.dynamics(&from.at(at)).end.filter(|end| *end > at);
        match next {
            Some(end) if end <= through => {
                at = end;
                record_change(segments, at, resource.ask(&from.at(at)));
            }
            _ => break,
        }
    }
}
