//! Shared fixtures: a live helper and a fake managed-service API on
//! ephemeral ports

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use fleetload_config::LoadTestConfig;
use fleetload_helper::HelperServer;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// JWT-shaped token expiring an hour from now
pub fn jwt() -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("e30.{}.sig", payload)
}

/// A server running in the background until dropped or stopped
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

async fn spawn<F, Fut>(serve: F) -> RunningServer
where
    F: FnOnce(TcpListener, oneshot::Receiver<()>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(serve(listener, rx));
    RunningServer {
        addr,
        shutdown: Some(tx),
        handle,
    }
}

/// Start the helper with its files under `config.coordination.server.data_dir`
pub async fn start_helper(config: &LoadTestConfig) -> RunningServer {
    let server = HelperServer::new(config, None);
    spawn(|listener, rx| async move {
        server
            .serve_on(listener, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
    })
    .await
}

#[derive(Default)]
pub struct FakeApiState {
    pub clusters: BTreeMap<String, Value>,
    pub service_accounts: BTreeMap<String, Value>,
    pub created_clusters: usize,
    pub created_service_accounts: usize,
    pub deleted: Vec<String>,
}

pub type SharedApi = Arc<Mutex<FakeApiState>>;

async fn list_clusters(State(api): State<SharedApi>) -> Json<Value> {
    let items: Vec<Value> = api.lock().clusters.values().cloned().collect();
    Json(json!({ "kind": "KafkaRequestList", "items": items }))
}

async fn create_cluster(State(api): State<SharedApi>, Json(body): Json<Value>) -> impl IntoResponse {
    let mut api = api.lock();
    api.created_clusters += 1;
    let id = format!("c{}", api.created_clusters);
    let cluster = json!({
        "id": id,
        "name": body["name"],
        "status": "ready",
        "bootstrap_server_host": format!("{}.kafka.example:443", id),
    });
    api.clusters.insert(id, cluster.clone());
    (StatusCode::ACCEPTED, Json(cluster))
}

async fn get_cluster(State(api): State<SharedApi>, Path(id): Path<String>) -> impl IntoResponse {
    match api.lock().clusters.get(&id) {
        Some(cluster) => (StatusCode::OK, Json(cluster.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "reason": "not found" }))),
    }
}

async fn delete_cluster(State(api): State<SharedApi>, Path(id): Path<String>) -> impl IntoResponse {
    let mut api = api.lock();
    match api.clusters.remove(&id) {
        Some(_) => {
            api.deleted.push(id);
            (StatusCode::ACCEPTED, Json(json!({})))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "reason": "not found" }))),
    }
}

async fn list_service_accounts(State(api): State<SharedApi>) -> Json<Value> {
    let items: Vec<Value> = api.lock().service_accounts.values().cloned().collect();
    Json(json!({ "items": items }))
}

async fn create_service_account(
    State(api): State<SharedApi>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut api = api.lock();
    api.created_service_accounts += 1;
    let id = format!("sa{}", api.created_service_accounts);
    let account = json!({
        "id": id,
        "name": body["name"],
        "description": body["description"],
        "client_id": format!("client-{}", id),
        "client_secret": format!("secret-{}", id),
    });
    api.service_accounts.insert(id, account.clone());
    (StatusCode::ACCEPTED, Json(account))
}

async fn get_service_account(
    State(api): State<SharedApi>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match api.lock().service_accounts.get(&id) {
        Some(account) => (StatusCode::OK, Json(account.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "reason": "not found" }))),
    }
}

async fn delete_service_account(
    State(api): State<SharedApi>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut api = api.lock();
    match api.service_accounts.remove(&id) {
        Some(_) => {
            api.deleted.push(id);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn anything_else() -> Json<Value> {
    Json(json!({ "items": [] }))
}

/// Start an in-memory managed-service API under `api_prefix`
pub async fn start_fake_api(api_prefix: &str) -> (RunningServer, SharedApi) {
    let api: SharedApi = Arc::new(Mutex::new(FakeApiState::default()));
    let prefix = api_prefix.trim_end_matches('/').to_string();

    let app = Router::new()
        .route(
            &format!("{}/kafkas", prefix),
            get(list_clusters).post(create_cluster),
        )
        .route(
            &format!("{}/kafkas/{{id}}", prefix),
            get(get_cluster).delete(delete_cluster),
        )
        .route(
            &format!("{}/service_accounts", prefix),
            get(list_service_accounts).post(create_service_account),
        )
        .route(
            &format!("{}/service_accounts/{{id}}", prefix),
            get(get_service_account).delete(delete_service_account),
        )
        .fallback(anything_else)
        .with_state(api.clone());

    let server = spawn(|listener, rx| async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
    })
    .await;
    (server, api)
}
