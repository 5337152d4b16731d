use std::fmt;

use http::{HeaderMap, StatusCode};

use super::error::HttpClientError;

/// Response header a server can set to ask that a failed response not be retried
pub const NO_RETRY_HEADER: &str = "x-retry";

/// Check if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// True when the response explicitly opts out of retries (`X-Retry: no`)
pub fn retry_refused(headers: &HeaderMap) -> bool {
    headers
        .get(NO_RETRY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("no"))
}

/// Why an attempt was marked bad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The endpoint answered with a failure status
    Status(StatusCode),
    /// The exchange failed below HTTP; carries `HttpClientError::kind`
    Transport(&'static str),
    /// The caller's handler rejected the response
    Handler,
    /// The logical request was cancelled while the attempt was in flight
    Cancelled,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::Status(status) => write!(f, "status_{}", status.as_u16()),
            FailureCategory::Transport(kind) => write!(f, "transport_{kind}"),
            FailureCategory::Handler => write!(f, "handler"),
            FailureCategory::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<&HttpClientError> for FailureCategory {
    fn from(err: &HttpClientError) -> Self {
        match err {
            HttpClientError::Cancelled => FailureCategory::Cancelled,
            other => FailureCategory::Transport(other.kind()),
        }
    }
}

/// Result of classifying one attempt
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// The caller's handler produced a value from a good response
    Success(T),
    /// The attempt failed in a way another endpoint might not
    RetryableFailure(FailureCategory),
    /// The attempt failed for good; carries what the caller gets back
    TerminalFailure(Result<T, E>, FailureCategory),
}

impl<T, E> Outcome<T, E> {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::RetryableFailure(_))
    }
}
