//! Serving the helper until the run is over

use fleetload_config::{AuthMode, LoadTestConfig};
use fleetload_core::TokenSource;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{HelperError, HelperResult};
use crate::routes::router;
use crate::state::HelperState;
use crate::store::FileStore;

pub struct HelperServer {
    state: HelperState,
    resource_singular: String,
    address: String,
    lifetime: Duration,
}

impl HelperServer {
    /// Build the server from the run configuration.
    ///
    /// `token_source` backs `/ocm_token`; pass `None` to run without token
    /// vending. The server lives for the run time plus the shutdown grace.
    pub fn new(config: &LoadTestConfig, token_source: Option<Arc<dyn TokenSource>>) -> Self {
        let server = &config.coordination.server;
        let store = FileStore::new(server.data_dir.clone(), &config.api.resource);
        Self {
            state: HelperState::new(store, token_source),
            resource_singular: config.api.resource_singular.clone(),
            address: format!("{}:{}", server.bind_address, server.port),
            lifetime: config.run.run_time + server.shutdown_grace,
        }
    }

    /// Whether the helper can vend tokens under this auth mode. A helper
    /// configured to fetch tokens from itself would loop.
    pub fn vends_tokens(config: &LoadTestConfig) -> bool {
        config.auth.mode != AuthMode::Helper
    }

    pub fn state(&self) -> &HelperState {
        &self.state
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Bind the configured address and serve until the lifetime elapses or
    /// the process is interrupted
    pub async fn serve(self) -> HelperResult<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| HelperError::Bind {
                address: self.address.clone(),
                source,
            })?;

        let lifetime = self.lifetime;
        self.serve_on(listener, async move {
            tokio::select! {
                _ = tokio::time::sleep(lifetime) => {
                    info!("Run time plus grace elapsed, shutting down helper");
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("Unable to listen for interrupt: {}", e);
                    }
                    info!("Interrupted, shutting down helper");
                }
            }
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> HelperResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(
                "Helper listening on {} (data in {})",
                addr,
                self.state.store.data_dir().display()
            );
        }

        let app = router(self.state, &self.resource_singular);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HelperError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_covers_run_and_grace() {
        let mut config = LoadTestConfig::default();
        config.run.run_time = Duration::from_secs(600);
        let server = HelperServer::new(&config, None);
        assert_eq!(server.lifetime(), Duration::from_secs(630));
    }

    #[test]
    fn test_helper_mode_does_not_vend_tokens() {
        let mut config = LoadTestConfig::default();
        config.auth.mode = AuthMode::Helper;
        assert!(!HelperServer::vends_tokens(&config));
        config.auth.mode = AuthMode::ClientCredentials;
        assert!(HelperServer::vends_tokens(&config));
    }
}
