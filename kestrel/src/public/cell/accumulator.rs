use crate::Duration;
use crate::public::cell::{Additive, Cell};
use crate::public::resource::polynomial::Polynomial;
use serde::{Deserialize, Serialize};

/// A volume that integrates a rate over time.
///
/// Effects are changes to the rate, so concurrent effects always commute.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorCell {
    volume: f64,
    rate: f64,
}

impl AccumulatorCell {
    pub fn new(volume: f64, rate: f64) -> Self {
        AccumulatorCell { volume, rate }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The volume's trajectory from this state forward.
    pub fn dynamics(&self) -> Polynomial {
        Polynomial::linear(self.volume, self.rate)
    }
}

impl Cell for AccumulatorCell {
    type Effect = f64;
    type EffectTrait = Additive;

    fn effect_trait(&self) -> Additive {
        Additive
    }

    fn react(&mut self, delta: &f64) {
        self.rate += delta;
    }

    fn step(&mut self, elapsed: Duration) {
        self.volume += self.rate * elapsed.as_seconds_f64();
    }
}
