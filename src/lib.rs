pub mod client;
pub mod config;
pub mod core;
pub mod discovery;
pub mod logging;
pub mod metrics;

pub use crate::client::{
    BalancingAsyncHttpClient, BalancingHttpClient, Request, Response, ResponseHandler,
};
pub use crate::config::{BalancingClientConfig, BalancingClientConfigBuilder, ConfigError};
pub use crate::core::{BalancerError, HttpClientError, ServiceAttempt, ServiceBalancer};
