//! HTTP transport implementation

use crate::errors::HttpError;
use crate::types::{ApiRequest, ApiResponse, RequestBody};
use fleetload_config::HttpConfig;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Sends one request and returns the response, whatever its status.
///
/// Only transport-level problems (connection refused, timeout, bad URL) are
/// errors; every HTTP status, including 4xx/5xx, is a successful send.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        (**self).send(request).await
    }
}

/// reqwest-backed transport with a shared connection pool
#[derive(Debug, Clone)]
pub struct HttpManager {
    client: Client,
}

impl HttpManager {
    /// Client with the default [`HttpConfig`]
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "building http client (timeout {}s, pool {})",
            config.timeout.as_secs(),
            config.pool_size
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_size)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.insecure)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    fn header_map(request: &ApiRequest) -> Result<HeaderMap, HttpError> {
        let mut header_map = HeaderMap::new();
        for (key, value) in &request.headers {
            let header_name = HeaderName::from_str(key)
                .map_err(|_| HttpError::InvalidHeaderName(key.to_string()))?;
            if let Ok(header_value) = HeaderValue::from_str(value) {
                header_map.insert(header_name, header_value);
            }
        }
        Ok(header_map)
    }
}

#[async_trait::async_trait]
impl Transport for HttpManager {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        trace!("Building {} request to {}", request.method, url);
        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), url)
            .headers(Self::header_map(&request)?);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(ref body) => builder.json(body),
            RequestBody::Form(ref fields) => builder.form(fields),
        };

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();

        // A body that cannot be read is treated as empty
        let body = response.text().await.unwrap_or_default();
        let elapsed = start.elapsed();

        debug!(
            "{} {} -> {} in {}ms",
            request.method,
            request.url,
            status,
            elapsed.as_millis()
        );

        Ok(ApiResponse {
            status,
            body,
            elapsed,
        })
    }
}
