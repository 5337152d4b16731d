//! Core abstractions for the balancing client
//!
//! This module contains the pieces that decide where a request goes and what
//! to do with the result:
//! - Endpoint pool and least-concurrent balancer
//! - Selection attempts and their resolution
//! - Retry classification primitives
//! - Attempt statistics
//! - Error types

pub mod attempt;
pub mod balancer;
pub mod error;
pub mod pool;
pub mod retry;
pub mod stats;

pub use attempt::ServiceAttempt;
pub use balancer::ServiceBalancer;
pub use error::{BalancerError, HttpClientError};
pub use pool::UriPool;
pub use retry::{is_retryable_status, retry_refused, FailureCategory, Outcome, NO_RETRY_HEADER};
pub use stats::{AttemptOutcome, AttemptStatsSink, BalancerStats, EndpointStats};
