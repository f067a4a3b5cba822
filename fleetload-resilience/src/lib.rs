//! Retry policies for fleetload
//!
//! Helper-service calls retry with a short random pause; deletes retry
//! with a pause that grows with the attempt number. Either can be bounded
//! or left to run until the call succeeds.

pub mod backoff;
pub mod retry;

pub use backoff::BackoffStrategy;
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
