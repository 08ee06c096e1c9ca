//! Simulated time.
//!
//! Both [Duration] and [Instant] are whole numbers of microseconds. Arithmetic is checked;
//! the `checked_*` methods return [TimeOverflow], and the operator impls panic with the same
//! message, the way integer overflow would in a debug build.

use derive_more::{Display, Error};
use duplicate::duplicate_item;
use hifitime::Epoch;
use serde::{Deserialize, Serialize};
use std::fmt::{Display as FmtDisplay, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Returned when simulated time arithmetic leaves the representable range.
#[derive(Copy, Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("simulated time arithmetic overflowed")]
pub struct TimeOverflow;

/// A signed span of simulated time, counted in microseconds.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(i64);

/// A point on the simulation timeline, counted in microseconds since [Instant::ORIGIN].
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Instant(i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);
    /// The smallest representable nonzero duration.
    pub const EPSILON: Duration = Duration(1);
    pub const MICROSECOND: Duration = Duration(1);
    pub const MILLISECOND: Duration = Duration(1_000);
    pub const SECOND: Duration = Duration(1_000_000);
    pub const MINUTE: Duration = Duration(60 * 1_000_000);
    pub const HOUR: Duration = Duration(60 * 60 * 1_000_000);
    pub const DAY: Duration = Duration(24 * 60 * 60 * 1_000_000);
    pub const MAX: Duration = Duration(i64::MAX);
    pub const MIN: Duration = Duration(i64::MIN);

    pub const fn from_micros(micros: i64) -> Self {
        Duration(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Rounds to the nearest microsecond.
    pub fn from_seconds_f64(seconds: f64) -> Result<Self, TimeOverflow> {
        let micros = (seconds * 1e6).round();
        if micros.is_finite() && micros >= i64::MIN as f64 && micros < i64::MAX as f64 {
            Ok(Duration(micros as i64))
        } else {
            Err(TimeOverflow)
        }
    }

    pub fn as_seconds_f64(self) -> f64 {
        self.0 as f64 / 1e6
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Duration) -> Result<Duration, TimeOverflow> {
        self.0.checked_add(other.0).map(Duration).ok_or(TimeOverflow)
    }

    pub fn checked_sub(self, other: Duration) -> Result<Duration, TimeOverflow> {
        self.0.checked_sub(other.0).map(Duration).ok_or(TimeOverflow)
    }

    pub fn checked_mul(self, factor: i64) -> Result<Duration, TimeOverflow> {
        self.0.checked_mul(factor).map(Duration).ok_or(TimeOverflow)
    }
}

#[duplicate_item(
    name            unit;
    [microseconds]  [MICROSECOND];
    [milliseconds]  [MILLISECOND];
    [seconds]       [SECOND];
    [minutes]       [MINUTE];
    [hours]         [HOUR];
)]
impl Duration {
    pub const fn name(quantity: i64) -> Self {
        match quantity.checked_mul(Self::unit.0) {
            Some(micros) => Duration(micros),
            None => panic!("duration overflows the microsecond range"),
        }
    }
}

impl Instant {
    pub const ORIGIN: Instant = Instant(0);
    pub const MAX: Instant = Instant(i64::MAX);
    pub const MIN: Instant = Instant(i64::MIN);

    pub const fn from_micros(micros: i64) -> Self {
        Instant(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub const fn since_origin(self) -> Duration {
        Duration(self.0)
    }

    pub fn checked_add(self, duration: Duration) -> Result<Instant, TimeOverflow> {
        self.0.checked_add(duration.0).map(Instant).ok_or(TimeOverflow)
    }

    pub fn checked_sub(self, duration: Duration) -> Result<Instant, TimeOverflow> {
        self.0.checked_sub(duration.0).map(Instant).ok_or(TimeOverflow)
    }

    pub fn checked_duration_since(self, earlier: Instant) -> Result<Duration, TimeOverflow> {
        self.0.checked_sub(earlier.0).map(Duration).ok_or(TimeOverflow)
    }

    /// The wall-clock epoch of this instant, given the epoch of the origin.
    pub fn to_epoch(self, start: Epoch) -> Epoch {
        start + hifitime::Duration::from(self.since_origin())
    }

    pub fn from_epoch(epoch: Epoch, start: Epoch) -> Result<Instant, TimeOverflow> {
        Duration::try_from(epoch - start).map(|d| Instant(d.0))
    }
}

impl From<Duration> for hifitime::Duration {
    fn from(duration: Duration) -> Self {
        hifitime::Duration::from_total_nanoseconds(duration.0 as i128 * 1_000)
    }
}

impl TryFrom<hifitime::Duration> for Duration {
    type Error = TimeOverflow;

    /// Truncates toward negative infinity at microsecond resolution.
    fn try_from(duration: hifitime::Duration) -> Result<Self, Self::Error> {
        i64::try_from(duration.total_nanoseconds().div_euclid(1_000))
            .map(Duration)
            .map_err(|_| TimeOverflow)
    }
}

impl FmtDisplay for Duration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            write!(f, "0 s")
        } else {
            write!(f, "{}", hifitime::Duration::from(*self))
        }
    }
}

impl FmtDisplay for Instant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "T-{}", Duration(self.0.unsigned_abs().min(i64::MAX as u64) as i64))
        } else {
            write!(f, "T+{}", Duration(self.0))
        }
    }
}

fn overflowed<T>(result: Result<T, TimeOverflow>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{e}"),
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        overflowed(self.checked_add(rhs))
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        overflowed(self.checked_sub(rhs))
    }
}

impl Neg for Duration {
    type Output = Duration;
    fn neg(self) -> Duration {
        overflowed(self.0.checked_neg().map(Duration).ok_or(TimeOverflow))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        iter.fold(Duration::ZERO, Add::add)
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;
    fn add(self, rhs: Duration) -> Instant {
        overflowed(self.checked_add(rhs))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;
    fn sub(self, rhs: Duration) -> Instant {
        overflowed(self.checked_sub(rhs))
    }
}

impl Sub for Instant {
    type Output = Duration;
    fn sub(self, rhs: Instant) -> Duration {
        overflowed(self.checked_duration_since(rhs))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}
