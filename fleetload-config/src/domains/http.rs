//! Settings for the reqwest client that carries the load

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client settings shared by every worker. Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout. A request past it counts as a transport failure.
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub connect_timeout: Duration,

    /// Keep-alive connections kept per host. The API and the helper are each a single host.
    pub pool_size: usize,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub pool_idle_timeout: Duration,

    pub user_agent: String,

    /// Accept self-signed certificates on staging clusters
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_size: 32,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("fleetload/", env!("CARGO_PKG_VERSION")).to_string(),
            insecure: false,
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        let domain = self.domain_name();
        validate_positive(self.timeout.as_secs(), "timeout", domain)?;
        validate_positive(self.connect_timeout.as_secs(), "connect_timeout", domain)?;
        validate_positive(self.pool_size, "pool_size", domain)?;
        validate_required_string(&self.user_agent, "user_agent", domain)
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}
