//! Pauses between attempts

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait before the next attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same pause every time
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },

    /// Random pause in `[min, max]`, independent of the attempt number.
    /// Helper calls use this so that workers do not retry in lockstep.
    Uniform {
        #[serde(with = "humantime_serde")]
        min: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
    },

    /// `unit * attempt * uniform(low, high)`
    RandomizedLinear {
        #[serde(with = "humantime_serde")]
        unit: Duration,
        low: f64,
        high: f64,
    },
}

impl BackoffStrategy {
    /// Pause after the given (1-based) failed attempt, never above `ceiling`
    pub fn delay(&self, attempt: u32, ceiling: Duration) -> Duration {
        let raw = match self {
            BackoffStrategy::Fixed { delay } => *delay,
            BackoffStrategy::Uniform { min, max } => {
                if min >= max {
                    *min
                } else {
                    let ms = rand::rng().random_range(min.as_millis()..=max.as_millis());
                    Duration::from_millis(ms as u64)
                }
            }
            BackoffStrategy::RandomizedLinear { unit, low, high } => {
                let factor = if low < high {
                    rand::rng().random_range(*low..*high)
                } else {
                    *low
                };
                unit.mul_f64(f64::from(attempt) * factor)
            }
        };
        raw.min(ceiling)
    }
}
