//! Configuration sections, one module per concern

pub mod api;
pub mod auth;
pub mod coordination;
pub mod http;
pub mod logging;
pub mod run;
pub mod utils;
pub mod workload;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

const SAMPLE_HEADER: &str = "\
# fleetload configuration
# Every key is optional. PERF_TEST_* environment variables override the file.
";

/// Everything a run needs. Each section falls back to its own defaults
/// when absent from the file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoadTestConfig {
    pub run: run::RunConfig,
    pub workload: workload::WorkloadConfig,
    pub api: api::ApiConfig,
    pub auth: auth::AuthConfig,
    pub coordination: coordination::CoordinationConfig,
    pub http: http::HttpConfig,
    pub logging: logging::LoggingConfig,
}

impl LoadTestConfig {
    /// Check every section, stopping at the first problem
    pub fn validate_all(&self) -> ConfigResult<()> {
        let sections: [&dyn Validatable; 7] = [
            &self.run,
            &self.workload,
            &self.api,
            &self.auth,
            &self.coordination,
            &self.http,
            &self.logging,
        ];
        sections.iter().try_for_each(|section| section.validate())
    }

    /// Defaults rendered as YAML, with a short header
    pub fn generate_sample() -> String {
        let body = serde_yaml::to_string(&LoadTestConfig::default()).unwrap_or_default();
        format!("{}{}", SAMPLE_HEADER, body)
    }
}
