/// Election and persistence calls against a live helper over HTTP
mod support;

use fleetload_config::LoadTestConfig;
use fleetload_core::{ConnectionConfig, Coordinator, PersistenceGateway};
use fleetload_http::{HttpManager, Transport};
use std::sync::Arc;
use support::start_helper;

fn config_for(data_dir: &std::path::Path) -> LoadTestConfig {
    let mut config = LoadTestConfig::default();
    config.coordination.server.data_dir = data_dir.to_path_buf();
    config.coordination.retry_delay_min_ms = 10;
    config.coordination.retry_delay_max_ms = 20;
    config.coordination.election_max_attempts = 2;
    config.coordination.persist_max_attempts = 2;
    config
}

fn transport() -> Arc<dyn Transport> {
    Arc::new(HttpManager::new().unwrap())
}

#[tokio::test]
async fn test_only_first_identity_wins_election() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    let helper = start_helper(&config).await;
    config.coordination.helper_url = helper.url();

    let coordinator = Coordinator::new(transport(), &config.coordination, "kafka");
    assert!(coordinator.elect("host-a-0").await.unwrap());
    assert!(!coordinator.elect("host-b-0").await.unwrap());
    // Asking again does not change the outcome
    assert!(coordinator.elect("host-a-0").await.unwrap());

    helper.stop().await;
}

#[tokio::test]
async fn test_persisted_records_land_in_files_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    let helper = start_helper(&config).await;
    config.coordination.helper_url = helper.url();

    let gateway = PersistenceGateway::new(transport(), &config.coordination, "kafka");
    let connection = ConnectionConfig {
        bootstrap_url: "c1.kafka.example:443".to_string(),
        username: "client-sa1".to_string(),
        password: "secret-sa1".to_string(),
    };
    for _ in 0..2 {
        gateway.persist_cluster_id("c1").await.unwrap();
        gateway.persist_service_account_id("sa1").await.unwrap();
        gateway.persist_connection_config(&connection).await.unwrap();
    }
    helper.stop().await;

    let clusters = std::fs::read_to_string(dir.path().join("kafkas.txt")).unwrap();
    assert_eq!(clusters, "c1\n");
    let accounts = std::fs::read_to_string(dir.path().join("service_accounts.txt")).unwrap();
    assert_eq!(accounts, "sa1\n");

    let configs = std::fs::read_to_string(dir.path().join("config.txt")).unwrap();
    let doc: serde_yaml::Value =
        serde_yaml::from_str(configs.trim_start_matches("---\n")).unwrap();
    assert_eq!(doc["bootstrapURL"].as_str(), Some("c1.kafka.example:443"));
    assert_eq!(doc["username"].as_str(), Some("client-sa1"));
    assert_eq!(doc["password"].as_str(), Some("secret-sa1"));
}

#[tokio::test]
async fn test_unreachable_helper_fails_after_bounded_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());

    // Grab a free port and release it so nothing is listening there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    config.coordination.helper_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let coordinator = Coordinator::new(transport(), &config.coordination, "kafka");
    assert!(coordinator.elect("host-a-0").await.is_err());

    let gateway = PersistenceGateway::new(transport(), &config.coordination, "kafka");
    assert!(gateway.persist_cluster_id("c1").await.is_err());
}
