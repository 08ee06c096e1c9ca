//! Polynomial dynamics for real resources.

use crate::Duration;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::{Add, Mul, Neg, Sub};

/// A polynomial in elapsed seconds since the start of the segment it describes.
///
/// Coefficients are stored in ascending order of power, so `coefficients[0]` is the
/// current value and `coefficients[1]` the current rate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: SmallVec<f64, 3>,
}

impl Polynomial {
    pub fn new(coefficients: impl IntoIterator<Item = f64>) -> Self {
        let mut result = Polynomial {
            coefficients: coefficients.into_iter().collect(),
        };
        result.trim();
        result
    }

    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }

    pub fn linear(value: f64, rate: f64) -> Self {
        Self::new([value, rate])
    }

    pub fn quadratic(value: f64, rate: f64, acceleration: f64) -> Self {
        Self::new([value, rate, acceleration / 2.0])
    }

    fn trim(&mut self) {
        while self.coefficients.last() == Some(&0.0) {
            self.coefficients.pop();
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    fn coefficient(&self, power: usize) -> f64 {
        self.coefficients.get(power).copied().unwrap_or(0.0)
    }

    /// The degree, counting the zero polynomial as degree zero.
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn value(&self) -> f64 {
        self.coefficient(0)
    }

    pub fn rate(&self) -> f64 {
        self.coefficient(1)
    }

    pub fn evaluate(&self, elapsed: Duration) -> f64 {
        self.evaluate_seconds(elapsed.as_seconds_f64())
    }

    pub fn evaluate_seconds(&self, t: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c)
    }

    /// The same trajectory, re-expressed relative to a later start.
    pub fn shifted(&self, elapsed: Duration) -> Self {
        let measure = elapsed.as_seconds_f64();
        let mut coefficients = self.coefficients.clone();
        let n = coefficients.len();
        for i in 0..n {
            for j in (i..n - 1).rev() {
                let next = coefficients[j + 1];
                coefficients[j] += next * measure;
            }
        }
        Polynomial::new(coefficients)
    }

    pub fn derivative(&self) -> Self {
        Polynomial::new(
            self.coefficients
                .iter()
                .enumerate()
                .skip(1)
                .map(|(power, c)| c * power as f64),
        )
    }

    pub fn approx_eq(&self, other: &Polynomial, tolerance: f64) -> bool {
        let len = self.coefficients.len().max(other.coefficients.len());
        (0..len).all(|i| (self.coefficient(i) - other.coefficient(i)).abs() <= tolerance)
    }

    /// Real roots in `[lo, hi]` (seconds), sorted ascending.
    ///
    /// Up to quadratic is solved in closed form. Higher degrees are split into monotone
    /// pieces at the roots of the derivative and bisected.
    pub fn roots_between(&self, lo: f64, hi: f64) -> SmallVec<f64, 4> {
        let mut roots = SmallVec::<f64, 4>::new();
        if lo > hi {
            return roots;
        }
        match self.degree() {
            0 => {}
            1 => roots.push(-self.coefficient(0) / self.coefficient(1)),
            2 => {
                let (c, b, a) = (self.coefficient(0), self.coefficient(1), self.coefficient(2));
                let discriminant = b * b - 4.0 * a * c;
                if discriminant == 0.0 {
                    roots.push(-b / (2.0 * a));
                } else if discriminant > 0.0 {
                    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
                    if q != 0.0 {
                        roots.push(q / a);
                        roots.push(c / q);
                    } else {
                        // b == 0 and c == 0
                        roots.push(0.0);
                    }
                }
            }
            _ => {
                let mut breaks = SmallVec::<f64, 8>::new();
                breaks.push(lo);
                breaks.extend(self.derivative().roots_between(lo, hi));
                breaks.push(hi);
                for pair in breaks.windows(2) {
                    if let Some(root) = self.bisect(pair[0], pair[1]) {
                        roots.push(root);
                    }
                }
            }
        }
        roots.sort_by(f64::total_cmp);
        let mut result = SmallVec::new();
        for root in roots {
            if root.is_finite() && root >= lo && root <= hi && result.last() != Some(&root) {
                result.push(root);
            }
        }
        result
    }

    fn bisect(&self, mut lo: f64, mut hi: f64) -> Option<f64> {
        let mut f_lo = self.evaluate_seconds(lo);
        let f_hi = self.evaluate_seconds(hi);
        if f_lo == 0.0 {
            return Some(lo);
        }
        if f_hi == 0.0 {
            return Some(hi);
        }
        if f_lo.signum() == f_hi.signum() {
            return None;
        }
        for _ in 0..200 {
            let mid = lo + (hi - lo) / 2.0;
            if mid <= lo || mid >= hi {
                break;
            }
            let f_mid = self.evaluate_seconds(mid);
            if f_mid == 0.0 {
                return Some(mid);
            }
            if f_mid.signum() == f_lo.signum() {
                lo = mid;
                f_lo = f_mid;
            } else {
                hi = mid;
            }
        }
        Some(lo + (hi - lo) / 2.0)
    }

    fn zip_with(&self, other: &Polynomial, f: impl Fn(f64, f64) -> f64) -> Polynomial {
        let len = self.coefficients.len().max(other.coefficients.len());
        Polynomial::new((0..len).map(|i| f(self.coefficient(i), other.coefficient(i))))
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: &Polynomial) -> Polynomial {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: &Polynomial) -> Polynomial {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        Polynomial::new(self.coefficients.iter().map(|c| -c))
    }
}

impl Mul<f64> for &Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: f64) -> Polynomial {
        Polynomial::new(self.coefficients.iter().map(|c| c * rhs))
    }
}

impl From<f64> for Polynomial {
    fn from(value: f64) -> Self {
        Polynomial::constant(value)
    }
}
