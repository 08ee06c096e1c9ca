use crate::public::resource::approximation::{Approximator, Exact, SecantApproximator};
use crate::{Duration, Instant};
use hifitime::Epoch;
use serde::{Deserialize, Serialize};

/// Settings for one simulation run.
///
/// Every field has a default, so a partial JSON object is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The wall-clock epoch of [Instant::ORIGIN].
    #[serde(with = "epoch_format")]
    pub start: Epoch,
    /// Last instant (inclusive, measured from the origin) at which tasks may run.
    pub horizon: Option<Duration>,
    /// Steps between history sweeps; zero never sweeps.
    pub gc_interval: u64,
    /// How real profiles are segmented when exported.
    pub approximation: Approximation,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            start: Epoch::from_tai_seconds(0.0),
            horizon: None,
            gc_interval: 256,
            approximation: Approximation::Exact,
        }
    }
}

impl SimulationConfig {
    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_start(mut self, start: Epoch) -> Self {
        self.start = start;
        self
    }

    pub fn with_approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn horizon_instant(&self) -> Option<Instant> {
        self.horizon
            .map(|h| Instant::ORIGIN.checked_add(h).unwrap_or(Instant::MAX))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Approximation {
    #[default]
    Exact,
    Secant {
        tolerance: f64,
        max_segment: Duration,
    },
}

impl Approximation {
    pub fn approximator(&self) -> Box<dyn Approximator> {
        match self {
            Approximation::Exact => Box::new(Exact),
            Approximation::Secant {
                tolerance,
                max_segment,
            } => Box::new(SecantApproximator {
                tolerance: *tolerance,
                max_segment: *max_segment,
            }),
        }
    }
}

/// Epochs as their hifitime string form, e.g. `2030-01-01T00:00:00 UTC`.
pub(crate) mod epoch_format {
    use hifitime::Epoch;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(epoch: &Epoch, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(epoch)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Epoch, D::Error> {
        let text = String::deserialize(deserializer)?;
        Epoch::from_str(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() -> anyhow::Result<()> {
        let config: SimulationConfig = serde_json::from_str(
            r#"{
                "start": "2030-01-01T00:00:00 UTC",
                "horizon": 3600000000,
                "approximation": { "kind": "secant", "tolerance": 0.5, "max_segment": 60000000 }
            }"#,
        )?;
        assert_eq!(Some(Duration::HOUR), config.horizon);
        assert_eq!(256, config.gc_interval);
        assert_eq!(
            Approximation::Secant {
                tolerance: 0.5,
                max_segment: Duration::MINUTE
            },
            config.approximation
        );
        assert_eq!(Some(Instant::ORIGIN + Duration::HOUR), config.horizon_instant());
        Ok(())
    }
}
