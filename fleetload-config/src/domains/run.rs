//! Run timing configuration
//!
//! All phase boundaries are expressed relative to the end of the run, so a
//! shorter or longer `run_time` keeps the cleanup windows the same size.

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Run timing and worker fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total run duration
    #[serde(with = "crate::domains::utils::serde_run_time")]
    pub run_time: Duration,

    /// Number of concurrent workers
    pub users: usize,

    /// Workers started per second
    pub spawn_rate: f64,

    /// How long before the end of the run wind-down cleanup begins
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub wind_down_start: Duration,

    /// How long before the end of the run leftover reconciliation begins
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub reconciliation_start: Duration,

    /// Seeding stops this long before the end of the run
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub seed_cutoff: Duration,

    /// Delay after start before steady-state traffic begins
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub hold_off: Duration,

    /// Pause between a worker's ticks (milliseconds)
    pub think_time_ms: u64,

    /// Where the JSON report is written at the end of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,

    /// Fixed RNG seed, for reproducible runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_time: Duration::from_secs(30 * 60),
            users: 1,
            spawn_rate: 1.0,
            wind_down_start: Duration::from_secs(90),
            reconciliation_start: Duration::from_secs(60),
            seed_cutoff: Duration::from_secs(120),
            hold_off: Duration::ZERO,
            think_time_ms: 0,
            report_path: None,
            rng_seed: None,
        }
    }
}

impl RunConfig {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.run_time.as_secs(), "run_time", self.domain_name())?;
        validate_positive(self.users, "users", self.domain_name())?;
        validate_positive(self.spawn_rate, "spawn_rate", self.domain_name())?;

        if self.reconciliation_start > self.wind_down_start {
            return Err(self.validation_error(
                "reconciliation_start must not be earlier in the run than wind_down_start",
            ));
        }

        if self.wind_down_start >= self.run_time {
            return Err(self.validation_error("wind_down_start must be shorter than run_time"));
        }

        if self.hold_off >= self.run_time {
            return Err(self.validation_error("hold_off must be shorter than run_time"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "run"
    }
}
