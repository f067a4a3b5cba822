//! Configuration for the fleetload harness
//!
//! A run is described by one [`LoadTestConfig`] with a section per concern.
//! Values come from a YAML file, then `PERF_TEST_*` environment variables
//! override them, then every section validates itself.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::utils::{parse_run_time, serde_duration};
pub use domains::{
    api::ApiConfig,
    auth::{AuthConfig, AuthMode},
    coordination::{CoordinationConfig, HelperServerConfig},
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    run::RunConfig,
    workload::WorkloadConfig,
    LoadTestConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
