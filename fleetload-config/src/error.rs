//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// An override variable is set but its value does not parse
    #[error("bad environment override: {0}")]
    Env(String),

    /// Required setting absent from both file and environment
    #[error("missing required setting {setting} (set {env_var})")]
    MissingSetting {
        setting: &'static str,
        env_var: String,
    },

    #[error("invalid {domain} setting: {message}")]
    Invalid { domain: String, message: String },
}
