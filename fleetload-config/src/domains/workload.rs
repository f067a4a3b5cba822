//! Workload shape: what each worker creates, seeds and cleans up

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Per-worker workload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Primary resources each creating worker provisions during steady state
    pub clusters_per_worker: u32,

    /// Whether to run the create-then-delete seeding phase
    pub populate_db: bool,

    /// Seeding quota per worker
    pub seed_clusters_per_worker: u32,

    /// Pause after the seed quota is met, letting deletions drain
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub seed_cooldown: Duration,

    /// Only issue GET traffic; no creation and no cleanup
    pub get_only: bool,

    /// Only the elected worker creates primary resources
    pub single_creator: bool,

    /// Delete created resources at the end of the run
    pub cleanup: bool,

    /// Sleep after each primary resource creation
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub inter_creation_delay: Duration,

    /// Cloud provider for created clusters
    pub cloud_provider: String,

    /// Region for created clusters
    pub region: String,

    /// Multi-AZ flag for created clusters
    pub multi_az: bool,

    /// Prefix of generated cluster names; also identifies this run's clusters
    pub name_prefix: String,

    /// Description given to created service accounts; identifies leftovers
    pub service_account_marker: String,

    /// Give up on a delete after this many attempts and abort the worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_max_attempts: Option<u32>,

    /// JSON endpoint distribution file; the built-in table is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_file: Option<PathBuf>,

    /// `duration` parameter for range metric queries (minutes)
    pub metrics_duration: u32,

    /// `interval` parameter for range metric queries (seconds)
    pub metrics_interval: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            clusters_per_worker: 1,
            populate_db: false,
            seed_clusters_per_worker: 0,
            seed_cooldown: Duration::from_secs(60),
            get_only: false,
            single_creator: false,
            cleanup: true,
            inter_creation_delay: Duration::from_secs(5),
            cloud_provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            multi_az: true,
            name_prefix: "perf".to_string(),
            service_account_marker: "fleetload perf test".to_string(),
            delete_max_attempts: None,
            distribution_file: None,
            metrics_duration: 5,
            metrics_interval: 30,
        }
    }
}

impl WorkloadConfig {
    /// Whether workers may create resources at all
    pub fn creation_enabled(&self) -> bool {
        !self.get_only && self.clusters_per_worker > 0
    }

    /// Whether the seeding phase runs
    pub fn seeding_enabled(&self) -> bool {
        !self.get_only && self.populate_db && self.seed_clusters_per_worker > 0
    }

    /// Whether end-of-run cleanup runs
    pub fn cleanup_enabled(&self) -> bool {
        !self.get_only && self.cleanup
    }
}

impl Validatable for WorkloadConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.cloud_provider, "cloud_provider", self.domain_name())?;
        validate_required_string(&self.region, "region", self.domain_name())?;
        validate_required_string(&self.name_prefix, "name_prefix", self.domain_name())?;
        validate_required_string(
            &self.service_account_marker,
            "service_account_marker",
            self.domain_name(),
        )?;

        // Cluster names are limited to 32 lowercase alphanumerics and hyphens;
        // the generated suffix takes 9 of them.
        if self.name_prefix.len() > 23
            || !self
                .name_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(self.validation_error(
                "name_prefix must be at most 23 lowercase alphanumerics or hyphens",
            ));
        }

        if self.delete_max_attempts == Some(0) {
            return Err(self.validation_error("delete_max_attempts must be greater than 0"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "workload"
    }
}
