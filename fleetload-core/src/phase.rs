//! Run phases derived from elapsed time

use fleetload_config::{RunConfig, WorkloadConfig};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Create-then-delete churn to populate the backing store
    Seeding,
    SteadyState,
    /// Stop creating and delete everything tracked
    WindDown,
    /// Find and delete this run's resources that were never tracked
    Reconciliation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Seeding => "seeding",
            Phase::SteadyState => "steady-state",
            Phase::WindDown => "wind-down",
            Phase::Reconciliation => "reconciliation",
        };
        f.write_str(name)
    }
}

/// Phase boundaries, measured back from the end of the run
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseThresholds {
    pub run_duration: Duration,
    pub wind_down_start: Duration,
    pub reconciliation_start: Duration,
    pub seed_cutoff: Duration,
    pub seeding_enabled: bool,
}

impl PhaseThresholds {
    pub fn from_config(run: &RunConfig, workload: &WorkloadConfig) -> Self {
        Self {
            run_duration: run.run_time,
            wind_down_start: run.wind_down_start,
            reconciliation_start: run.reconciliation_start,
            seed_cutoff: run.seed_cutoff,
            seeding_enabled: workload.seeding_enabled(),
        }
    }

    /// Phase at `elapsed`. Later phases take precedence:
    /// reconciliation, then wind-down, then seeding, then steady state.
    pub fn phase_at(&self, elapsed: Duration, seeding_done: bool) -> Phase {
        let remaining = self.run_duration.saturating_sub(elapsed);

        if remaining < self.reconciliation_start {
            Phase::Reconciliation
        } else if remaining < self.wind_down_start {
            Phase::WindDown
        } else if self.seeding_enabled
            && !seeding_done
            && elapsed < self.run_duration.saturating_sub(self.seed_cutoff)
        {
            Phase::Seeding
        } else {
            Phase::SteadyState
        }
    }

    pub fn initial_phase(&self) -> Phase {
        self.phase_at(Duration::ZERO, false)
    }
}
