use anyhow::{Context, Result};
use fleetload_config::LoadTestConfig;
use fleetload_core::token_source_for;
use fleetload_helper::HelperServer;
use fleetload_http::{HttpManager, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn helper_command(
    mut config: LoadTestConfig,
    port: Option<u16>,
    data_dir: Option<&PathBuf>,
) -> Result<()> {
    if let Some(port) = port {
        config.coordination.server.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.coordination.server.data_dir = data_dir.clone();
    }

    let token_source = if HelperServer::vends_tokens(&config) {
        let transport: Arc<dyn Transport> = Arc::new(
            HttpManager::with_config(&config.http)
                .context("Failed to create HTTP client")?,
        );
        Some(token_source_for(&config, transport).context("Failed to set up token vending")?)
    } else {
        warn!("auth.mode is helper, /ocm_token will not vend tokens");
        None
    };

    let server = HelperServer::new(&config, token_source);
    info!("Helper will stop after {:?}", server.lifetime());
    server.serve().await.context("Helper service failed")?;
    info!("Helper stopped");
    Ok(())
}
