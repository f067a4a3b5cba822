//! Pushes ids and connection configs to the helper for durable storage

use crate::election::HelperCallError;
use crate::error::{LoadTestError, Result};
use fleetload_config::CoordinationConfig;
use fleetload_http::{ApiRequest, Transport};
use fleetload_resilience::{RetryExecutor, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Connection details for a ready cluster, in the helper's field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "BootstrapUrl")]
    pub bootstrap_url: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

pub struct PersistenceGateway {
    transport: Arc<dyn Transport>,
    helper_url: String,
    resource_singular: String,
    executor: RetryExecutor,
}

impl PersistenceGateway {
    pub fn new(transport: Arc<dyn Transport>, config: &CoordinationConfig, resource_singular: &str) -> Self {
        let (min_delay, max_delay) = config.retry_delay_range();
        Self {
            transport,
            helper_url: config.helper_url.trim_end_matches('/').to_string(),
            resource_singular: resource_singular.to_string(),
            executor: RetryExecutor::new(RetryPolicy::uniform(
                Some(config.persist_max_attempts),
                min_delay,
                max_delay,
            )),
        }
    }

    /// POST `payload` to `endpoint` until the helper acknowledges with 204
    pub async fn persist(&self, endpoint: &str, payload: Value) -> Result<()> {
        let url = &format!("{}/{}", self.helper_url, endpoint.trim_start_matches('/'));
        let payload = &payload;
        self.executor
            .execute(|| async move {
                let response = self
                    .transport
                    .send(ApiRequest::post_json(url.clone(), payload.clone()))
                    .await
                    .map_err(HelperCallError::Transport)?;
                if response.status == 204 {
                    Ok(())
                } else {
                    Err(HelperCallError::UnexpectedStatus {
                        status: response.status,
                        body: response.body,
                    })
                }
            })
            .await
            .map_err(|e| LoadTestError::HelperUnavailable(format!("persisting to {} failed: {}", endpoint, e)))?;

        debug!("Persisted {} via helper", endpoint);
        Ok(())
    }

    pub async fn persist_cluster_id(&self, id: &str) -> Result<()> {
        let endpoint = format!("write_{}_id", self.resource_singular);
        let mut payload = Map::new();
        payload.insert(
            format!("{}Id", capitalize(&self.resource_singular)),
            Value::String(id.to_string()),
        );
        self.persist(&endpoint, Value::Object(payload)).await
    }

    pub async fn persist_service_account_id(&self, id: &str) -> Result<()> {
        self.persist("write_svc_acc_id", json!({ "ServiceAccountId": id }))
            .await
    }

    pub async fn persist_connection_config(&self, config: &ConnectionConfig) -> Result<()> {
        let endpoint = format!("write_{}_config", self.resource_singular);
        self.persist(&endpoint, serde_json::to_value(config)?).await
    }
}

/// `kafka` -> `Kafka`, used for the helper's id field name
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
