//! Error types for the balancing client
//!
//! `BalancerError` is raised by endpoint selection, `HttpClientError` is what a
//! response handler sees on its error path.

use thiserror::Error;

/// Errors raised while choosing an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    #[error("Service type={service} is not available")]
    ServiceUnavailable { service: String },
}

/// Errors delivered to a response handler's error path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpClientError {
    #[error("Service type={service} is not available")]
    ServiceUnavailable { service: String },

    #[error("{uri} {reason}")]
    InvalidRequest { uri: String, reason: String },

    #[error("Connection failed for {uri}: {reason}")]
    Connect { uri: String, reason: String },

    #[error("Request to {uri} timed out")]
    Timeout { uri: String },

    #[error("Transport error for {uri}: {reason}")]
    Transport { uri: String, reason: String },

    #[error("Request was cancelled")]
    Cancelled,
}

impl HttpClientError {
    /// Short, label-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            HttpClientError::ServiceUnavailable { .. } => "service_unavailable",
            HttpClientError::InvalidRequest { .. } => "invalid_request",
            HttpClientError::Connect { .. } => "connect",
            HttpClientError::Timeout { .. } => "timeout",
            HttpClientError::Transport { .. } => "transport",
            HttpClientError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn invalid_request(uri: &str, reason: &str) -> Self {
        HttpClientError::InvalidRequest {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<BalancerError> for HttpClientError {
    fn from(err: BalancerError) -> Self {
        match err {
            BalancerError::ServiceUnavailable { service } => {
                HttpClientError::ServiceUnavailable { service }
            }
        }
    }
}

/// Convert from reqwest errors, keeping only the classification the retry logic needs
impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        let uri = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            HttpClientError::Timeout { uri }
        } else if err.is_connect() {
            HttpClientError::Connect {
                uri,
                reason: err.to_string(),
            }
        } else {
            HttpClientError::Transport {
                uri,
                reason: err.to_string(),
            }
        }
    }
}
