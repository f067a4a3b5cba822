//! Target API configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// Where the managed-service API lives and what the primary resource is called
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the control plane
    pub base_url: String,

    /// Versioned path prefix, e.g. `/api/kafkas_mgmt/v1`
    pub api_prefix: String,

    /// Collection name of the primary resource, e.g. `kafkas` or `dinosaurs`
    pub resource: String,

    /// Singular resource name used in helper endpoint names, e.g. `kafka`
    pub resource_singular: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stage.openshift.com".to_string(),
            api_prefix: "/api/kafkas_mgmt/v1".to_string(),
            resource: "kafkas".to_string(),
            resource_singular: "kafka".to_string(),
        }
    }
}

impl ApiConfig {
    /// Full URL of the versioned API root, without a trailing slash
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }
}

impl Validatable for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_required_string(&self.api_prefix, "api_prefix", self.domain_name())?;
        validate_required_string(&self.resource, "resource", self.domain_name())?;
        validate_required_string(
            &self.resource_singular,
            "resource_singular",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "api"
    }
}
