//! HTTP transport for fleetload
//!
//! Workers never talk to reqwest directly. They go through the [`Transport`]
//! trait so the scheduler can be driven by [`MockTransport`] in tests and by
//! [`HttpManager`] in real runs.

pub mod client;
pub mod errors;
pub mod mock;
pub mod types;

pub use client::{HttpManager, Transport};
pub use errors::HttpError;
pub use mock::{MockResponse, MockTransport, RecordedRequest};
pub use types::{ApiRequest, ApiResponse, HttpMethod, RequestBody};
