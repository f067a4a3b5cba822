//! Single-creator election through the helper service
//!
//! Every worker posts its identity; the helper keeps the first one it sees
//! and echoes it back. A worker whose identity comes back is the creator for
//! the rest of its life. The helper holds the result in memory only, so a
//! helper restart opens a new election.

use crate::error::{LoadTestError, Result};
use fleetload_config::CoordinationConfig;
use fleetload_http::{ApiRequest, HttpError, Transport};
use fleetload_resilience::{RetryExecutor, RetryPolicy, Retryable};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Failed helper call; always worth another attempt
#[derive(Debug)]
pub(crate) enum HelperCallError {
    UnexpectedStatus { status: u16, body: String },
    Transport(HttpError),
}

impl fmt::Display for HelperCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperCallError::UnexpectedStatus { status, body } => {
                write!(f, "helper returned {}: {}", status, body.trim())
            }
            HelperCallError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl Retryable for HelperCallError {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// This worker's election identity: the configured identity or the hostname,
/// suffixed with the worker index since one host runs many workers
pub fn local_identity(config: &CoordinationConfig, worker_index: usize) -> String {
    let base = config.worker_identity.clone().unwrap_or_else(|| {
        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    });
    format!("{}-{}", base, worker_index)
}

pub struct Coordinator {
    transport: Arc<dyn Transport>,
    url: String,
    executor: RetryExecutor,
}

impl Coordinator {
    pub fn new(transport: Arc<dyn Transport>, config: &CoordinationConfig, resource_singular: &str) -> Self {
        let (min_delay, max_delay) = config.retry_delay_range();
        Self {
            transport,
            url: format!(
                "{}/{}_create_container_id",
                config.helper_url.trim_end_matches('/'),
                resource_singular
            ),
            executor: RetryExecutor::new(RetryPolicy::uniform(
                Some(config.election_max_attempts),
                min_delay,
                max_delay,
            )),
        }
    }

    /// Register `identity` and report whether it won.
    ///
    /// Retries until the helper answers 200.
    pub async fn elect(&self, identity: &str) -> Result<bool> {
        let winner = self
            .executor
            .execute(|| async move {
                let request =
                    ApiRequest::post_json(self.url.clone(), json!({ "ContainerId": identity }));
                let response = self
                    .transport
                    .send(request)
                    .await
                    .map_err(HelperCallError::Transport)?;
                if response.status == 200 {
                    Ok(response.body.trim().to_string())
                } else {
                    Err(HelperCallError::UnexpectedStatus {
                        status: response.status,
                        body: response.body,
                    })
                }
            })
            .await
            .map_err(|e| LoadTestError::HelperUnavailable(format!("election failed: {}", e)))?;

        let elected = winner == identity;
        if elected {
            info!("Worker {} elected as the cluster creator", identity);
        } else {
            warn!(
                "Worker {} not elected, creator is {}; creation disabled",
                identity, winner
            );
        }
        Ok(elected)
    }
}
