//! Configuration loading and environment variable handling

use crate::domains::LoadTestConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the default `PERF_TEST` prefix
    pub fn new() -> Self {
        Self {
            prefix: "PERF_TEST".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LoadTestConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: LoadTestConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LoadTestConfig> {
        let mut config = LoadTestConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<LoadTestConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LoadTestConfig) -> ConfigResult<()> {
        self.apply_run_overrides(&mut config.run)?;
        self.apply_workload_overrides(&mut config.workload)?;
        self.apply_api_overrides(&mut config.api)?;
        self.apply_auth_overrides(&mut config.auth)?;
        self.apply_coordination_overrides(&mut config.coordination)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_run_overrides(&self, config: &mut crate::domains::run::RunConfig) -> ConfigResult<()> {
        if let Ok(run_time) = self.get_env_var("RUN_TIME") {
            config.run_time = crate::domains::utils::parse_run_time(&run_time)
                .map_err(|e| ConfigError::Env(format!("Invalid RUN_TIME: {}", e)))?;
        }

        if let Some(users) = self.parse_env_var::<usize>("USERS")? {
            config.users = users;
        }

        if let Some(spawn_rate) = self.parse_env_var::<f64>("SPAWN_RATE")? {
            config.spawn_rate = spawn_rate;
        }

        if let Some(hold_off) = self.parse_env_var::<u64>("HOLD_OFF")? {
            config.hold_off = Duration::from_secs(hold_off);
        }

        if let Some(think_time) = self.parse_env_var::<u64>("THINK_TIME_MS")? {
            config.think_time_ms = think_time;
        }

        if let Ok(report_path) = self.get_env_var("REPORT_PATH") {
            config.report_path = Some(PathBuf::from(report_path));
        }

        Ok(())
    }

    fn apply_workload_overrides(
        &self,
        config: &mut crate::domains::workload::WorkloadConfig,
    ) -> ConfigResult<()> {
        if let Some(quota) = self.parse_env_var::<u32>("CLUSTERS_PER_WORKER")? {
            config.clusters_per_worker = quota;
        }

        if let Some(seed) = self.parse_env_var::<u32>("SEED_CLUSTERS_PER_WORKER")? {
            config.seed_clusters_per_worker = seed;
        }

        if let Some(populate_db) = self.parse_env_var::<bool>("POPULATE_DB")? {
            config.populate_db = populate_db;
        }

        if let Some(get_only) = self.parse_env_var::<bool>("GET_ONLY")? {
            config.get_only = get_only;
        }

        if let Some(single_creator) = self.parse_env_var::<bool>("SINGLE_CREATOR")? {
            config.single_creator = single_creator;
        }

        if let Some(cleanup) = self.parse_env_var::<bool>("CLEANUP")? {
            config.cleanup = cleanup;
        }

        if let Ok(path) = self.get_env_var("DISTRIBUTION_FILE") {
            config.distribution_file = Some(PathBuf::from(path));
        }

        Ok(())
    }

    fn apply_api_overrides(&self, config: &mut crate::domains::api::ApiConfig) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("API_BASE_URL") {
            config.base_url = base_url;
        }

        Ok(())
    }

    fn apply_auth_overrides(&self, config: &mut crate::domains::auth::AuthConfig) -> ConfigResult<()> {
        if let Ok(mode) = self.get_env_var("AUTH_MODE") {
            config.mode = crate::domains::auth::AuthMode::from_str(&mode)
                .map_err(|_| ConfigError::Env(format!("Invalid AUTH_MODE: {}", mode)))?;
        }

        if let Ok(token_url) = self.get_env_var("TOKEN_URL") {
            config.token_url = token_url;
        }

        if let Ok(client_id) = self.get_env_var("CLIENT_ID") {
            config.client_id = Some(client_id);
        }

        if let Ok(client_secret) = self.get_env_var("CLIENT_SECRET") {
            config.client_secret = Some(client_secret);
        }

        if let Ok(token) = self.get_env_var("TOKEN") {
            config.token = Some(token);
        }

        Ok(())
    }

    fn apply_coordination_overrides(
        &self,
        config: &mut crate::domains::coordination::CoordinationConfig,
    ) -> ConfigResult<()> {
        if let Ok(helper_url) = self.get_env_var("HELPER_URL") {
            config.helper_url = helper_url;
        }

        if let Some(persist) = self.parse_env_var::<bool>("PERSIST_RESULTS")? {
            config.persist_results = persist;
        }

        if let Ok(worker_id) = self.get_env_var("WORKER_ID") {
            config.worker_identity = Some(worker_id);
        }

        if let Ok(data_dir) = self.get_env_var("HELPER_DATA_DIR") {
            config.server.data_dir = PathBuf::from(data_dir);
        }

        if let Some(port) = self.parse_env_var::<u16>("HELPER_PORT")? {
            config.server.port = port;
        }

        Ok(())
    }

    fn apply_http_overrides(&self, config: &mut crate::domains::http::HttpConfig) -> ConfigResult<()> {
        if let Some(timeout) = self.parse_env_var::<u64>("HTTP_TIMEOUT")? {
            config.timeout = Duration::from_secs(timeout);
        }

        if let Some(insecure) = self.parse_env_var::<bool>("HTTP_INSECURE")? {
            config.insecure = insecure;
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Parse an optional environment variable, failing loudly on bad values
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::Env(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
