//! Logging initialization for fleetload
//!
//! Library crates log through `tracing` macros; binaries call one of the init
//! functions here once at startup.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
