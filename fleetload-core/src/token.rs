//! Bearer token acquisition and expiry tracking
//!
//! Tokens are JWTs whose `exp` claim is read without verifying the signature;
//! the expiry only decides when to refetch, it is never a trust decision.

use crate::error::{LoadTestError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use fleetload_config::{AuthMode, LoadTestConfig};
use fleetload_http::{ApiRequest, Transport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Where tokens come from
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a fresh token; may return an empty string if the source has none
    async fn fetch(&self) -> Result<String>;
}

/// OAuth2 client-credentials grant against an SSO token endpoint
pub struct ClientCredentialsSource {
    transport: Arc<dyn Transport>,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsSource {
    pub fn new(
        transport: Arc<dyn Transport>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for ClientCredentialsSource {
    async fn fetch(&self) -> Result<String> {
        let request = ApiRequest::post_form(
            self.token_url.clone(),
            vec![
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("client_id".to_string(), self.client_id.clone()),
                ("client_secret".to_string(), self.client_secret.clone()),
            ],
        );

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| LoadTestError::TokenFetch(e.to_string()))?;

        if !response.is_success() {
            return Err(LoadTestError::TokenFetch(format!(
                "token endpoint returned {}",
                response.status
            )));
        }

        Ok(response
            .json()
            .and_then(|body| body.get("access_token").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default())
    }
}

/// Short-lived tokens vended by the coordination helper (`GET /ocm_token`)
pub struct HelperTokenSource {
    transport: Arc<dyn Transport>,
    url: String,
}

impl HelperTokenSource {
    pub fn new(transport: Arc<dyn Transport>, helper_url: &str) -> Self {
        Self {
            transport,
            url: format!("{}/ocm_token", helper_url.trim_end_matches('/')),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for HelperTokenSource {
    async fn fetch(&self) -> Result<String> {
        let response = self
            .transport
            .send(ApiRequest::get(self.url.clone()))
            .await
            .map_err(|e| LoadTestError::TokenFetch(e.to_string()))?;

        if !response.is_success() {
            return Err(LoadTestError::TokenFetch(format!(
                "helper returned {}: {}",
                response.status,
                response.body.trim()
            )));
        }

        Ok(response.body.trim().to_string())
    }
}

/// A fixed token from configuration
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<String> {
        Ok(self.0.trim().to_string())
    }
}

/// Build the token source selected by the auth configuration
pub fn token_source_for(
    config: &LoadTestConfig,
    transport: Arc<dyn Transport>,
) -> Result<Arc<dyn TokenSource>> {
    let auth = &config.auth;
    let source: Arc<dyn TokenSource> = match auth.mode {
        AuthMode::ClientCredentials => {
            let missing = |setting: &str| {
                LoadTestError::TokenFetch(format!("{} is not configured", setting))
            };
            let client_id = auth.client_id.clone().ok_or_else(|| missing("client_id"))?;
            let client_secret = auth
                .client_secret
                .clone()
                .ok_or_else(|| missing("client_secret"))?;
            Arc::new(ClientCredentialsSource::new(
                transport,
                auth.token_url.clone(),
                client_id,
                client_secret,
            ))
        }
        AuthMode::Helper => Arc::new(HelperTokenSource::new(
            transport,
            &config.coordination.helper_url,
        )),
        AuthMode::Static => Arc::new(StaticTokenSource::new(
            auth.token.clone().unwrap_or_default(),
        )),
    };
    Ok(source)
}

/// Read the `exp` claim from a JWT without verifying it
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(seconds, 0)
}

/// A bearer token and when it stops being usable
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Holds one worker's credential and refetches it when it lapses
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    credential: Option<Credential>,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            credential: None,
        }
    }

    /// Return a usable token, fetching a new one when none is held or the
    /// held one has expired.
    ///
    /// A fetched token that is empty, expired, or has no readable expiry is
    /// fatal: retrying would only hammer the token endpoint for nothing.
    pub async fn ensure_valid_token(&mut self) -> Result<&str> {
        let now = Utc::now();
        let needs_fetch = self
            .credential
            .as_ref()
            .map_or(true, |credential| !credential.is_valid_at(now));

        if needs_fetch {
            debug!("Fetching a new bearer token");
            let token = self.source.fetch().await?;
            if token.is_empty() {
                return Err(LoadTestError::TokenEmpty);
            }

            let expires_at = decode_expiry(&token).ok_or(LoadTestError::TokenExpired)?;
            if expires_at <= Utc::now() {
                return Err(LoadTestError::TokenExpired);
            }

            info!("Obtained bearer token valid until {}", expires_at);
            self.credential = Some(Credential { token, expires_at });
        }

        match self.credential {
            Some(ref credential) => Ok(credential.token.as_str()),
            None => Err(LoadTestError::TokenEmpty),
        }
    }

    /// Forget the held token so the next call refetches
    pub fn invalidate(&mut self) {
        self.credential = None;
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// `Authorization` header value for the held token
    pub fn bearer(&self) -> Option<String> {
        self.credential
            .as_ref()
            .map(|credential| format!("Bearer {}", credential.token))
    }
}
