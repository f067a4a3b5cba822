//! Weighted-random endpoint table for read traffic
//!
//! Weights are cumulative thresholds: an endpoint is chosen when the roll is
//! below its weight and at or above the previous one.

use crate::error::{LoadTestError, Result};
use fleetload_config::LoadTestConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CLUSTER_PLACEHOLDER: &str = "{cluster_id}";
pub const SERVICE_ACCOUNT_PLACEHOLDER: &str = "{service_account_id}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedEndpoint {
    /// Path below the API root, may contain id placeholders
    pub path: String,
    /// Name used in the statistics
    pub name: String,
    /// Cumulative upper bound
    pub weight: u32,
}

impl WeightedEndpoint {
    fn new(path: impl Into<String>, name: impl Into<String>, weight: u32) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            weight,
        }
    }

    /// Fill placeholders; `None` if a needed id is missing
    pub fn resolve(&self, cluster_id: Option<&str>, service_account_id: Option<&str>) -> Option<String> {
        let mut path = self.path.clone();
        if path.contains(CLUSTER_PLACEHOLDER) {
            path = path.replace(CLUSTER_PLACEHOLDER, cluster_id?);
        }
        if path.contains(SERVICE_ACCOUNT_PLACEHOLDER) {
            path = path.replace(SERVICE_ACCOUNT_PLACEHOLDER, service_account_id?);
        }
        Some(path)
    }

    pub fn needs_cluster(&self) -> bool {
        self.path.contains(CLUSTER_PLACEHOLDER)
    }

    pub fn needs_service_account(&self) -> bool {
        self.path.contains(SERVICE_ACCOUNT_PLACEHOLDER)
    }
}

/// Validated, read-only endpoint table shared by all workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDistribution {
    max_weight: u32,
    endpoints: Vec<WeightedEndpoint>,
}

impl EndpointDistribution {
    pub fn new(max_weight: u32, endpoints: Vec<WeightedEndpoint>) -> Result<Self> {
        let distribution = Self {
            max_weight,
            endpoints,
        };
        distribution.validate()?;
        Ok(distribution)
    }

    /// Table used when no distribution file is configured: roughly half
    /// list calls, a third searches, a tenth single gets and the remainder
    /// spread over metrics, service accounts, cloud providers and the
    /// OpenAPI document.
    pub fn default_for(config: &LoadTestConfig) -> Self {
        let resource = config.api.resource.as_str();
        let workload = &config.workload;
        let search = format!(
            "/{}?search=name%20like%20{}%25",
            resource, workload.name_prefix
        );
        let query_range = format!(
            "/{}/{}/metrics/query_range?duration={}&interval={}",
            resource, CLUSTER_PLACEHOLDER, workload.metrics_duration, workload.metrics_interval
        );

        Self {
            max_weight: 1000,
            endpoints: vec![
                WeightedEndpoint::new(format!("/{}", resource), format!("/{}", resource), 500),
                WeightedEndpoint::new(search, format!("/{}?search", resource), 850),
                WeightedEndpoint::new(
                    format!("/{}/{}", resource, CLUSTER_PLACEHOLDER),
                    format!("/{}/[id]", resource),
                    950,
                ),
                WeightedEndpoint::new(
                    format!("/{}/{}/metrics/query", resource, CLUSTER_PLACEHOLDER),
                    format!("/{}/[id]/metrics/query", resource),
                    955,
                ),
                WeightedEndpoint::new(
                    query_range,
                    format!("/{}/[id]/metrics/query_range", resource),
                    960,
                ),
                WeightedEndpoint::new("/service_accounts", "/service_accounts", 975),
                WeightedEndpoint::new(
                    format!("/service_accounts/{}", SERVICE_ACCOUNT_PLACEHOLDER),
                    "/service_accounts/[id]",
                    985,
                ),
                WeightedEndpoint::new("/cloud_providers", "/cloud_providers", 990),
                WeightedEndpoint::new(
                    format!("/cloud_providers/{}/regions", workload.cloud_provider),
                    "/cloud_providers/[id]/regions",
                    995,
                ),
                WeightedEndpoint::new("/openapi", "/openapi", 1000),
            ],
        }
    }

    /// Parse a JSON table of the form `{max_weight, endpoints: [{path, name, weight}]}`
    pub fn from_json(json: &str) -> Result<Self> {
        let distribution: Self = serde_json::from_str(json)?;
        distribution.validate()?;
        Ok(distribution)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// The configured file if any, else the default table
    pub fn load(config: &LoadTestConfig) -> Result<Self> {
        match config.workload.distribution_file {
            Some(ref path) => Self::from_file(path),
            None => Ok(Self::default_for(config)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_weight == 0 {
            return Err(LoadTestError::Distribution(
                "max_weight must be positive".to_string(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(LoadTestError::Distribution(
                "at least one endpoint is required".to_string(),
            ));
        }
        for pair in self.endpoints.windows(2) {
            if pair[1].weight <= pair[0].weight {
                return Err(LoadTestError::Distribution(format!(
                    "weights must be strictly ascending: '{}' ({}) follows '{}' ({})",
                    pair[1].name, pair[1].weight, pair[0].name, pair[0].weight
                )));
            }
        }
        if let Some(last) = self.endpoints.last() {
            if last.weight > self.max_weight {
                return Err(LoadTestError::Distribution(format!(
                    "weight {} of '{}' exceeds max_weight {}",
                    last.weight, last.name, self.max_weight
                )));
            }
        }
        Ok(())
    }

    pub fn max_weight(&self) -> u32 {
        self.max_weight
    }

    pub fn endpoints(&self) -> &[WeightedEndpoint] {
        &self.endpoints
    }

    /// First endpoint whose cumulative weight exceeds `roll`
    pub fn pick(&self, roll: u32) -> Option<&WeightedEndpoint> {
        self.endpoints.iter().find(|endpoint| roll < endpoint.weight)
    }

    /// Roll uniformly in `[0, max_weight)` and pick
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&WeightedEndpoint> {
        self.pick(rng.random_range(0..self.max_weight))
    }
}
