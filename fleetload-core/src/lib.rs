//! Core of the fleetload harness
//!
//! Each virtual user is a [`Worker`] that owns a [`SessionState`] and walks
//! through the run phases (seeding, steady state, wind-down, reconciliation)
//! one [`Worker::tick`] at a time. Workers share nothing mutable apart from
//! the [`StatsRecorder`]; cross-worker coordination goes through the helper
//! service via [`Coordinator`] and [`PersistenceGateway`].

pub mod api;
pub mod classifier;
pub mod distribution;
pub mod election;
pub mod error;
pub mod persistence;
pub mod phase;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod token;
pub mod tracker;

pub use api::ApiClient;
pub use classifier::{classify, classify_response, matches_gone_reason, OperationKind, Outcome};
pub use distribution::{EndpointDistribution, WeightedEndpoint};
pub use election::{local_identity, Coordinator};
pub use error::{LoadTestError, Result};
pub use persistence::{ConnectionConfig, PersistenceGateway};
pub use phase::{Phase, PhaseThresholds};
pub use runner::Runner;
pub use scheduler::{Worker, WorkerContext};
pub use session::{ServiceAccountCredentials, SessionState};
pub use stats::{EndpointSummary, RunMetadata, RunReport, StatsRecorder};
pub use token::{
    decode_expiry, token_source_for, ClientCredentialsSource, Credential, HelperTokenSource,
    StaticTokenSource, TokenManager, TokenSource,
};
pub use tracker::{ResourceHandle, ResourceKind, ResourceTracker};
