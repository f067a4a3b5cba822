//! CLI command implementations

pub mod config;
pub mod helper;
pub mod run;

pub use config::*;
pub use helper::*;
pub use run::*;
