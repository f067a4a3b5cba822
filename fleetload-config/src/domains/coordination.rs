//! Cross-worker coordination through the helper service

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client-side settings for talking to the coordination helper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Base URL of the helper service
    pub helper_url: String,

    /// Push created ids and connection configs to the helper
    pub persist_results: bool,

    /// Identity presented in the creator election; hostname when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_identity: Option<String>,

    /// Attempts before giving up on the election call
    pub election_max_attempts: u32,

    /// Attempts before giving up on a persistence call
    pub persist_max_attempts: u32,

    /// Lower bound of the random delay between helper retries (milliseconds)
    pub retry_delay_min_ms: u64,

    /// Upper bound of the random delay between helper retries (milliseconds)
    pub retry_delay_max_ms: u64,

    /// Helper server settings, used by `fleetload helper`
    pub server: HelperServerConfig,
}

/// Settings for running the helper service itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperServerConfig {
    /// Address to bind to
    pub bind_address: String,

    /// Port to bind to
    pub port: u16,

    /// Directory holding the persisted id and config files
    pub data_dir: PathBuf,

    /// Extra time the helper stays up after the run time elapses
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub shutdown_grace: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            helper_url: "http://localhost:8099".to_string(),
            persist_results: true,
            worker_identity: None,
            election_max_attempts: 1000,
            persist_max_attempts: 1000,
            retry_delay_min_ms: 500,
            retry_delay_max_ms: 1000,
            server: HelperServerConfig::default(),
        }
    }
}

impl Default for HelperServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8099,
            data_dir: PathBuf::from("/mnt/api"),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl CoordinationConfig {
    /// Random retry delay bounds
    pub fn retry_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.retry_delay_min_ms),
            Duration::from_millis(self.retry_delay_max_ms),
        )
    }
}

impl Validatable for CoordinationConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.helper_url, "helper_url", self.domain_name())?;
        validate_positive(
            self.election_max_attempts,
            "election_max_attempts",
            self.domain_name(),
        )?;
        validate_positive(
            self.persist_max_attempts,
            "persist_max_attempts",
            self.domain_name(),
        )?;

        if self.retry_delay_min_ms > self.retry_delay_max_ms {
            return Err(self.validation_error(
                "retry_delay_min_ms must not exceed retry_delay_max_ms",
            ));
        }

        if let Some(ref identity) = self.worker_identity {
            validate_required_string(identity, "worker_identity", self.domain_name())?;
        }

        self.server.validate()
    }

    fn domain_name(&self) -> &'static str {
        "coordination"
    }
}

impl Validatable for HelperServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_address, "bind_address", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "coordination.server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordination_defaults() {
        let config = CoordinationConfig::default();
        assert_eq!(config.helper_url, "http://localhost:8099");
        assert_eq!(config.server.port, 8099);
        assert_eq!(
            config.retry_delay_range(),
            (Duration::from_millis(500), Duration::from_millis(1000))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_retry_range_rejected() {
        let config = CoordinationConfig {
            retry_delay_min_ms: 2000,
            retry_delay_max_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
