//! Request builders for the managed-service API

use fleetload_config::ApiConfig;
use fleetload_http::{ApiRequest, ApiResponse, HttpError, Transport};
use serde_json::Value;
use std::sync::Arc;

/// Thin client over a [`Transport`] that knows the API's routes and carries
/// the default headers (including the bearer token) for every request
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    root: String,
    resource: String,
    default_headers: Vec<(String, String)>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, config: &ApiConfig) -> Self {
        Self {
            transport,
            root: config.api_root(),
            resource: config.resource.trim_matches('/').to_string(),
            default_headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
            ],
        }
    }

    /// Set or replace a header sent with every request
    pub fn set_default_header(&mut self, name: &str, value: impl Into<String>) {
        self.default_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.default_headers.push((name.to_string(), value.into()));
    }

    pub fn default_header(&self, name: &str) -> Option<&str> {
        self.default_headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Absolute URL for a path below the API root
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    pub fn clusters_url(&self) -> String {
        self.url(&self.resource)
    }

    pub fn cluster_url(&self, id: &str) -> String {
        self.url(&format!("{}/{}", self.resource, id))
    }

    pub fn service_accounts_url(&self) -> String {
        self.url("service_accounts")
    }

    pub fn service_account_url(&self, id: &str) -> String {
        self.url(&format!("service_accounts/{}", id))
    }

    fn with_defaults(&self, mut request: ApiRequest) -> ApiRequest {
        for (name, value) in &self.default_headers {
            if request.header(name).is_none() {
                request = request.with_header(name.clone(), value.clone());
            }
        }
        request
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        self.transport.send(self.with_defaults(request)).await
    }

    pub fn create_cluster_request(&self, body: Value) -> ApiRequest {
        ApiRequest::post_json(format!("{}?async=true", self.clusters_url()), body)
    }

    pub fn delete_cluster_request(&self, id: &str) -> ApiRequest {
        ApiRequest::delete(format!("{}?async=true", self.cluster_url(id)))
    }

    pub fn get_cluster_request(&self, id: &str) -> ApiRequest {
        ApiRequest::get(self.cluster_url(id))
    }

    pub fn list_clusters_request(&self) -> ApiRequest {
        ApiRequest::get(self.clusters_url())
    }

    pub fn create_service_account_request(&self, body: Value) -> ApiRequest {
        ApiRequest::post_json(self.service_accounts_url(), body)
    }

    pub fn delete_service_account_request(&self, id: &str) -> ApiRequest {
        ApiRequest::delete(self.service_account_url(id))
    }

    pub fn list_service_accounts_request(&self) -> ApiRequest {
        ApiRequest::get(self.service_accounts_url())
    }

    /// GET of an arbitrary path below the API root
    pub fn get_request(&self, path: &str) -> ApiRequest {
        ApiRequest::get(self.url(path))
    }
}
