/// Worker lifecycle tests against a scripted API and helper
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use fleetload_config::LoadTestConfig;
use fleetload_core::{
    EndpointDistribution, LoadTestError, Phase, ResourceHandle, ResourceKind, SessionState,
    StaticTokenSource, StatsRecorder, TokenSource, WeightedEndpoint, Worker, WorkerContext,
};
use fleetload_http::{HttpMethod, MockResponse, MockTransport};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, Instant};

fn jwt(valid_for_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + valid_for_secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("{}.{}.sig", header, payload)
}

fn test_config(quota: u32) -> LoadTestConfig {
    let mut config = LoadTestConfig::default();
    config.workload.clusters_per_worker = quota;
    config.workload.inter_creation_delay = Duration::from_secs(1);
    config.coordination.worker_identity = Some("pod-a".to_string());
    config.coordination.election_max_attempts = 3;
    config.coordination.persist_max_attempts = 3;
    config.run.rng_seed = Some(7);
    config
}

/// API that accepts creates with fresh ids, reports clusters ready and
/// confirms deletes. Everything else, helper calls included, gets a 204.
fn fake_api() -> MockTransport {
    let mock = MockTransport::new().with_fallback(MockResponse::empty(204));

    let clusters = Arc::new(AtomicUsize::new(0));
    mock.respond_with(HttpMethod::Post, "/kafkas?async=true", move |_| {
        let n = clusters.fetch_add(1, Ordering::SeqCst);
        MockResponse::json(202, json!({ "id": format!("c{}", n), "status": "accepted" }))
    });

    let accounts = Arc::new(AtomicUsize::new(0));
    mock.respond_with(HttpMethod::Post, "/service_accounts", move |_| {
        let n = accounts.fetch_add(1, Ordering::SeqCst);
        MockResponse::json(
            202,
            json!({ "id": format!("sa{}", n), "client_id": "cid", "client_secret": "secret" }),
        )
    });

    mock.respond(HttpMethod::Get, "/kafkas", MockResponse::json(200, json!({ "items": [] })));
    mock.respond(
        HttpMethod::Get,
        "/service_accounts",
        MockResponse::json(200, json!({ "items": [] })),
    );
    mock.respond(
        HttpMethod::Get,
        "/kafkas/",
        MockResponse::json(
            200,
            json!({ "id": "c0", "status": "ready", "bootstrap_server_host": "c0.kafka:443" }),
        ),
    );
    mock.respond(HttpMethod::Delete, "/kafkas/", MockResponse::empty(204));
    mock.respond(HttpMethod::Delete, "/service_accounts/", MockResponse::empty(204));
    mock
}

fn context_with(config: LoadTestConfig, mock: &MockTransport, source: Arc<dyn TokenSource>) -> WorkerContext {
    WorkerContext {
        distribution: Arc::new(EndpointDistribution::default_for(&config)),
        config: Arc::new(config),
        stats: Arc::new(StatsRecorder::new()),
        transport: Arc::new(mock.clone()),
        token_source: source,
    }
}

fn context(config: LoadTestConfig, mock: &MockTransport) -> WorkerContext {
    context_with(config, mock, Arc::new(StaticTokenSource::new(jwt(3600))))
}

async fn started_worker(config: LoadTestConfig, mock: &MockTransport) -> (Worker, SessionState, WorkerContext) {
    let ctx = context(config, mock);
    let mut worker = Worker::new(0, &ctx);
    let session = worker.on_start().await.unwrap();
    (worker, session, ctx)
}

#[tokio::test(start_paused = true)]
async fn test_quota_met_switches_to_weighted_reads() {
    let mock = fake_api();
    let (mut worker, mut session, _ctx) = started_worker(test_config(3), &mock).await;
    assert!(session.creation_permitted());

    for _ in 0..3 {
        assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::SteadyState);
    }
    assert_eq!(session.clusters.size(), 3);
    assert_eq!(session.service_accounts.size(), 3);
    assert_eq!(session.clusters_created, 3);

    let gets_before = mock.requests_matching(HttpMethod::Get, "/api/kafkas_mgmt/v1").len();
    for _ in 0..20 {
        worker.tick(&mut session).await.unwrap();
    }

    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 3);
    assert_eq!(session.clusters.size(), 3);
    let gets_after = mock.requests_matching(HttpMethod::Get, "/api/kafkas_mgmt/v1").len();
    assert!(gets_after >= gets_before + 20);

    assert_eq!(mock.count(HttpMethod::Post, "/write_kafka_id"), 3);
    assert_eq!(mock.count(HttpMethod::Post, "/write_svc_acc_id"), 3);
    assert!(!session.persisted_configs.is_empty());
    assert!(mock.count(HttpMethod::Post, "/write_kafka_config") >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_requests_carry_bearer_token() {
    let mock = fake_api();
    let (mut worker, mut session, _ctx) = started_worker(test_config(1), &mock).await;
    worker.tick(&mut session).await.unwrap();

    let create = &mock.requests_matching(HttpMethod::Post, "/kafkas?async=true")[0];
    assert!(create.authorization.as_deref().unwrap().starts_with("Bearer "));
    assert_eq!(create.body.as_ref().unwrap()["cloud_provider"], "aws");
}

#[tokio::test(start_paused = true)]
async fn test_elected_worker_creates() {
    let mock = fake_api();
    mock.respond_with(HttpMethod::Post, "/kafka_create_container_id", |request| {
        let id = request
            .json_body()
            .and_then(|b| b["ContainerId"].as_str())
            .unwrap_or_default()
            .to_string();
        MockResponse::new(200, id)
    });

    let mut config = test_config(1);
    config.workload.single_creator = true;
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;

    assert!(session.creation_permitted());
    let election = &mock.requests_matching(HttpMethod::Post, "/kafka_create_container_id")[0];
    assert_eq!(election.body, Some(json!({ "ContainerId": "pod-a-0" })));

    worker.tick(&mut session).await.unwrap();
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_losing_election_never_creates() {
    let mock = fake_api();
    mock.respond(
        HttpMethod::Post,
        "/kafka_create_container_id",
        MockResponse::new(200, "pod-b-0"),
    );

    let mut config = test_config(5);
    config.workload.single_creator = true;
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;
    assert!(!session.creation_permitted());

    for _ in 0..15 {
        worker.tick(&mut session).await.unwrap();
    }
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 0);
    assert!(session.clusters.is_empty());
    assert!(mock.requests_matching(HttpMethod::Get, "/api/kafkas_mgmt/v1").len() >= 10);
}

#[tokio::test(start_paused = true)]
async fn test_worker_losing_election_skips_seeding() {
    let mock = fake_api();
    mock.respond(
        HttpMethod::Post,
        "/kafka_create_container_id",
        MockResponse::new(200, "pod-b-0"),
    );

    let mut config = test_config(5);
    config.workload.single_creator = true;
    config.workload.populate_db = true;
    config.workload.seed_clusters_per_worker = 2;
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;
    assert!(!session.creation_permitted());

    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Seeding);
    assert!(session.seeding_done);
    assert_eq!(session.seeds_created, 0);

    for _ in 0..3 {
        assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::SteadyState);
    }
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 0);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_conflict_on_create_is_not_tracked_or_retried() {
    let mock = fake_api();
    mock.respond(
        HttpMethod::Post,
        "/kafkas?async=true",
        MockResponse::json(409, json!({ "reason": "name already taken" })),
    );
    let (mut worker, mut session, ctx) = started_worker(test_config(1), &mock).await;

    worker.tick(&mut session).await.unwrap();

    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);
    assert!(session.clusters.is_empty());
    assert_eq!(session.clusters_created, 0);
    assert_eq!(mock.count(HttpMethod::Post, "/service_accounts"), 0);

    let report = ctx.stats.report(Duration::from_secs(1));
    assert_eq!(report.endpoints["POST /kafkas"].num_requests, 1);
    assert_eq!(report.endpoints["POST /kafkas"].num_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_create_stops_creation() {
    let mock = fake_api();
    mock.respond(HttpMethod::Post, "/kafkas?async=true", MockResponse::empty(429));
    let (mut worker, mut session, _ctx) = started_worker(test_config(3), &mock).await;

    for _ in 0..5 {
        worker.tick(&mut session).await.unwrap();
    }
    assert!(session.throttled);
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_delete_removes_once() {
    let mock = fake_api();
    mock.respond(
        HttpMethod::Delete,
        "/kafkas/",
        MockResponse::json(404, json!({ "reason": "Resource not found" })),
    );
    let (mut worker, mut session, _ctx) = started_worker(test_config(0), &mock).await;
    session.clusters.add(ResourceHandle::new("c1", ResourceKind::Cluster));
    session.clusters.add(ResourceHandle::new("c2", ResourceKind::Cluster));

    worker
        .remove_resource(&mut session, ResourceKind::Cluster, "c1")
        .await
        .unwrap();
    worker
        .remove_resource(&mut session, ResourceKind::Cluster, "c1")
        .await
        .unwrap();

    assert_eq!(session.clusters.ids(), vec!["c2".to_string()]);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/c1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_until_confirmed() {
    let mock = fake_api();
    mock.respond_sequence(
        HttpMethod::Delete,
        "/kafkas/",
        vec![
            MockResponse::json(500, json!({ "reason": "database timeout" })),
            MockResponse::empty(503),
            MockResponse::json(500, json!({ "reason": "unable to delete kafka request: not found" })),
        ],
    );
    let (mut worker, mut session, _ctx) = started_worker(test_config(0), &mock).await;
    session.clusters.add(ResourceHandle::new("c1", ResourceKind::Cluster));

    worker
        .remove_resource(&mut session, ResourceKind::Cluster, "c1")
        .await
        .unwrap();

    assert!(session.clusters.is_empty());
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/c1"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_delete_requires_manual_cleanup() {
    let mock = fake_api();
    mock.respond(HttpMethod::Delete, "/kafkas/", MockResponse::empty(500));
    let mut config = test_config(0);
    config.workload.delete_max_attempts = Some(3);
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;
    session.clusters.add(ResourceHandle::new("c1", ResourceKind::Cluster));

    let result = worker
        .remove_resource(&mut session, ResourceKind::Cluster, "c1")
        .await;

    match result {
        Err(LoadTestError::ManualCleanupRequired { id, attempts, .. }) => {
            assert_eq!(id, "c1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected manual cleanup error, got {:?}", other),
    }
    assert!(session.clusters.contains("c1"));
}

#[tokio::test(start_paused = true)]
async fn test_wind_down_then_reconciliation() {
    let mock = fake_api();
    mock.respond_sequence(
        HttpMethod::Get,
        "/kafkas",
        vec![
            MockResponse::json(
                200,
                json!({ "items": [
                    { "id": "left1", "name": "perf-leftover", "status": "ready" },
                    { "id": "gone1", "name": "perf-gone", "status": "deprovision" },
                    { "id": "other", "name": "prod-cluster", "status": "ready" }
                ]}),
            ),
            MockResponse::json(200, json!({ "items": [] })),
        ],
    );
    mock.respond_sequence(
        HttpMethod::Get,
        "/service_accounts",
        vec![
            MockResponse::json(
                200,
                json!({ "items": [
                    { "id": "sa-left", "description": "fleetload perf test" },
                    { "id": "sa-other", "description": "ci" }
                ]}),
            ),
            MockResponse::json(200, json!({ "items": [] })),
        ],
    );

    let (mut worker, mut session, _ctx) = started_worker(test_config(1), &mock).await;
    worker.tick(&mut session).await.unwrap();
    assert_eq!(session.clusters.size(), 1);

    let run_time = Duration::from_secs(30 * 60);
    let until_wind_down = run_time - Duration::from_secs(80) - session.elapsed();
    advance(until_wind_down).await;

    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::WindDown);
    assert!(session.clusters.is_empty());
    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::WindDown);
    assert!(session.service_accounts.is_empty());
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);

    let until_reconciliation = run_time - Duration::from_secs(50) - session.elapsed();
    advance(until_reconciliation).await;

    // list, then delete the two leftovers, then list again and find nothing
    for _ in 0..4 {
        assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Reconciliation);
    }
    assert!(session.leftovers_cleared);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/left1"), 1);
    assert_eq!(mock.count(HttpMethod::Delete, "/service_accounts/sa-left"), 1);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/gone1"), 0);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/other"), 0);
    assert_eq!(mock.count(HttpMethod::Delete, "/service_accounts/sa-other"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seeding_creates_and_deletes() {
    let mock = fake_api();
    let mut config = test_config(0);
    config.workload.populate_db = true;
    config.workload.seed_clusters_per_worker = 2;
    config.workload.seed_cooldown = Duration::from_secs(60);
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;

    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Seeding);
    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Seeding);
    assert_eq!(session.seeds_created, 2);
    assert!(session.clusters.is_empty());

    let before_cooldown = Instant::now();
    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Seeding);
    assert!(before_cooldown.elapsed() >= Duration::from_secs(60));
    assert!(session.seeding_done);

    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::SteadyState);
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 2);
    assert_eq!(mock.count(HttpMethod::Delete, "/kafkas/"), 2);
    assert_eq!(mock.count(HttpMethod::Post, "/write_kafka_id"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_seeding_ends_without_cooldown() {
    let mock = fake_api();
    mock.respond(HttpMethod::Post, "/kafkas?async=true", MockResponse::empty(429));
    let mut config = test_config(3);
    config.workload.populate_db = true;
    config.workload.seed_clusters_per_worker = 5;
    config.workload.seed_cooldown = Duration::from_secs(60);
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;

    let start = Instant::now();
    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::Seeding);
    assert!(session.throttled);
    assert!(session.seeding_done);
    assert_eq!(session.seeds_created, 0);
    assert!(start.elapsed() < Duration::from_secs(60));

    for _ in 0..3 {
        assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::SteadyState);
    }
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hold_off_delays_traffic() {
    let mock = fake_api();
    let mut config = test_config(1);
    config.run.hold_off = Duration::from_secs(5);
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;

    worker.tick(&mut session).await.unwrap();
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 0);
    assert!(mock.requests_matching(HttpMethod::Get, "/api/kafkas_mgmt/v1").is_empty());

    for _ in 0..5 {
        worker.tick(&mut session).await.unwrap();
    }
    assert_eq!(mock.count(HttpMethod::Post, "/kafkas?async=true"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_only_never_mutates() {
    let mock = fake_api();
    let mut config = test_config(3);
    config.workload.get_only = true;
    let (mut worker, mut session, _ctx) = started_worker(config, &mock).await;
    session.clusters.add(ResourceHandle::new("existing", ResourceKind::Cluster));

    for _ in 0..5 {
        worker.tick(&mut session).await.unwrap();
    }
    advance(Duration::from_secs(30 * 60 - 70)).await;
    assert_eq!(worker.tick(&mut session).await.unwrap(), Phase::WindDown);

    assert_eq!(mock.count(HttpMethod::Post, "/kafkas"), 0);
    assert_eq!(mock.requests().iter().filter(|r| r.method == HttpMethod::Delete).count(), 0);
    assert!(session.clusters.contains("existing"));
}

struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TokenSource for CountingSource {
    async fn fetch(&self) -> fleetload_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(jwt(3600))
    }
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_response_refreshes_token() {
    let mock = fake_api();
    mock.respond_sequence(
        HttpMethod::Get,
        "/kafkas",
        vec![MockResponse::empty(401), MockResponse::json(200, json!({ "items": [] }))],
    );

    let config = test_config(0);
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let mut ctx = context_with(config, &mock, source.clone());
    ctx.distribution = Arc::new(
        EndpointDistribution::new(
            10,
            vec![WeightedEndpoint {
                path: "/kafkas".to_string(),
                name: "/kafkas".to_string(),
                weight: 10,
            }],
        )
        .unwrap(),
    );

    let mut worker = Worker::new(0, &ctx);
    let mut session = worker.on_start().await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    worker.tick(&mut session).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    worker.tick(&mut session).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    let report = ctx.stats.report(Duration::from_secs(1));
    assert_eq!(report.endpoints["GET /kafkas"].num_requests, 2);
    assert_eq!(report.endpoints["GET /kafkas"].num_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_token_fails_start() {
    let mock = fake_api();
    let ctx = context_with(test_config(1), &mock, Arc::new(StaticTokenSource::new("")));
    let mut worker = Worker::new(0, &ctx);
    let result = worker.on_start().await;
    assert!(matches!(result, Err(LoadTestError::TokenEmpty)));
}
