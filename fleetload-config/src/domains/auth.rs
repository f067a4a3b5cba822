//! Authentication configuration

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How workers obtain bearer tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `grant_type=client_credentials` exchange against the SSO token endpoint
    #[default]
    ClientCredentials,
    /// Short-lived tokens vended by the coordination helper
    Helper,
    /// A fixed token from configuration
    Static,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "client_credentials" | "sso" => Ok(AuthMode::ClientCredentials),
            "helper" | "ocm" => Ok(AuthMode::Helper),
            "static" | "token" => Ok(AuthMode::Static),
            _ => Err(format!("Invalid auth mode: {}", s)),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token acquisition mode
    pub mode: AuthMode,

    /// SSO token endpoint for the client-credentials exchange
    pub token_url: String,

    /// Client id for the client-credentials exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret for the client-credentials exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Fixed bearer token for static mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            token_url: "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token".to_string(),
            client_id: None,
            client_secret: None,
            token: None,
        }
    }
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.mode {
            AuthMode::ClientCredentials => {
                validate_url(&self.token_url, "token_url", self.domain_name())?;
                if self.client_id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingSetting {
                        setting: "auth.client_id",
                        env_var: "PERF_TEST_CLIENT_ID".to_string(),
                    });
                }
                if self.client_secret.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingSetting {
                        setting: "auth.client_secret",
                        env_var: "PERF_TEST_CLIENT_SECRET".to_string(),
                    });
                }
            }
            AuthMode::Static => {
                if self.token.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingSetting {
                        setting: "auth.token",
                        env_var: "PERF_TEST_TOKEN".to_string(),
                    });
                }
            }
            // The helper URL lives in the coordination domain
            AuthMode::Helper => {}
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}
