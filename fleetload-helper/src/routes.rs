//! HTTP routes of the helper service

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{HelperError, HelperResult};
use crate::state::HelperState;

#[derive(Debug, Deserialize)]
struct ElectionRequest {
    #[serde(rename = "ContainerId", default)]
    container_id: String,
}

#[derive(Debug, Deserialize)]
struct ServiceAccountIdRequest {
    #[serde(rename = "ServiceAccountId", default)]
    service_account_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfigRequest {
    #[serde(rename = "BootstrapUrl", default)]
    bootstrap_url: String,
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Password", default)]
    password: String,
}

/// Build the helper router for the given resource singular, e.g. `kafka`.
///
/// Routes only register the method they serve, so any other method is
/// answered with 405 by the router.
pub fn router(state: HelperState, resource_singular: &str) -> Router {
    let id_field = cluster_id_field(resource_singular);

    Router::new()
        .route("/ocm_token", get(token_handler))
        .route(
            &format!("/{}_create_container_id", resource_singular),
            post(election_handler),
        )
        .route(
            &format!("/write_{}_id", resource_singular),
            post(move |state: State<HelperState>, body: Bytes| {
                cluster_id_handler(state, body, id_field.clone())
            }),
        )
        .route("/write_svc_acc_id", post(service_account_id_handler))
        .route(
            &format!("/write_{}_config", resource_singular),
            post(config_handler),
        )
        .with_state(state)
}

/// JSON key carrying the cluster id, e.g. `KafkaId`
fn cluster_id_field(resource_singular: &str) -> String {
    let mut chars = resource_singular.chars();
    match chars.next() {
        Some(first) => format!("{}{}Id", first.to_uppercase(), chars.as_str()),
        None => "Id".to_string(),
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> HelperResult<T> {
    serde_json::from_slice(body).map_err(|e| HelperError::InvalidBody(e.to_string()))
}

async fn token_handler(State(state): State<HelperState>) -> HelperResult<String> {
    let tokens = state
        .tokens()
        .ok_or_else(|| HelperError::Token("no token source configured".to_string()))?;

    let mut manager = tokens.lock().await;
    let token = manager
        .ensure_valid_token()
        .await
        .map_err(|e| HelperError::Token(e.to_string()))?;
    Ok(token.to_string())
}

async fn election_handler(
    State(state): State<HelperState>,
    body: Bytes,
) -> HelperResult<impl IntoResponse> {
    let request: ElectionRequest = parse_body(&body)?;
    let before = state.elected();
    let elected = state.elect(&request.container_id).unwrap_or_default();

    if before.is_none() && !elected.is_empty() {
        info!("{} elected as the creator", elected);
    } else {
        debug!("{} asked for creation rights, {} holds them", request.container_id, elected);
    }
    Ok((StatusCode::OK, elected))
}

async fn cluster_id_handler(
    State(state): State<HelperState>,
    body: Bytes,
    id_field: String,
) -> HelperResult<StatusCode> {
    let payload: serde_json::Map<String, serde_json::Value> = parse_body(&body)?;
    let id = payload
        .get(&id_field)
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    if id.is_empty() {
        warn!("Request without {}, nothing recorded", id_field);
        return Ok(StatusCode::NO_CONTENT);
    }

    if state.store.write_cluster_id(id).await? {
        info!("Recorded cluster {}", id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn service_account_id_handler(
    State(state): State<HelperState>,
    body: Bytes,
) -> HelperResult<StatusCode> {
    let request: ServiceAccountIdRequest = parse_body(&body)?;
    if request.service_account_id.is_empty() {
        warn!("Request without ServiceAccountId, nothing recorded");
        return Ok(StatusCode::NO_CONTENT);
    }

    if state
        .store
        .write_service_account_id(&request.service_account_id)
        .await?
    {
        info!("Recorded service account {}", request.service_account_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn config_handler(
    State(state): State<HelperState>,
    body: Bytes,
) -> HelperResult<StatusCode> {
    let request: ConfigRequest = parse_body(&body)?;
    if request.bootstrap_url.is_empty() {
        warn!("Config without BootstrapUrl, nothing recorded");
        return Ok(StatusCode::NO_CONTENT);
    }

    if state
        .store
        .write_config(&request.bootstrap_url, &request.username, &request.password)
        .await?
    {
        info!("Recorded connection config for {}", request.bootstrap_url);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_id_field() {
        assert_eq!(cluster_id_field("kafka"), "KafkaId");
        assert_eq!(cluster_id_field("dinosaur"), "DinosaurId");
        assert_eq!(cluster_id_field(""), "Id");
    }
}
