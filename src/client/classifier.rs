//! Outcome classification for balanced requests
//!
//! `RetryingResponseHandler` sits between the transport and the caller's
//! handler. It is the only place that looks at status codes to decide about
//! retries; the caller's handler never sees a response that is going to be
//! retried.

use std::convert::Infallible;

use super::handler::ResponseHandler;
use super::request::Request;
use super::response::Response;
use crate::core::{is_retryable_status, retry_refused, FailureCategory, HttpClientError, Outcome};

/// Wraps the caller's handler and classifies each exchange into an [`Outcome`]
#[derive(Debug, Clone)]
pub struct RetryingResponseHandler<H> {
    inner: H,
    final_attempt: bool,
}

impl<H: ResponseHandler> RetryingResponseHandler<H> {
    /// On the final attempt every response and error goes to `inner`, so the
    /// caller always gets a real answer instead of a retry signal.
    pub fn new(inner: H, final_attempt: bool) -> Self {
        Self {
            inner,
            final_attempt,
        }
    }

    pub fn is_final_attempt(&self) -> bool {
        self.final_attempt
    }
}

impl<H: ResponseHandler> ResponseHandler for RetryingResponseHandler<H> {
    type Output = Outcome<H::Output, H::Error>;
    type Error = Infallible;

    fn handle(&self, request: &Request, response: Response) -> Result<Self::Output, Infallible> {
        let status = response.status();
        if is_retryable_status(status) {
            let category = FailureCategory::Status(status);
            if !self.final_attempt && !retry_refused(response.headers()) {
                return Ok(Outcome::RetryableFailure(category));
            }
            return Ok(Outcome::TerminalFailure(
                self.inner.handle(request, response),
                category,
            ));
        }

        Ok(match self.inner.handle(request, response) {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::TerminalFailure(Err(err), FailureCategory::Handler),
        })
    }

    fn handle_error(
        &self,
        request: &Request,
        error: HttpClientError,
    ) -> Result<Self::Output, Infallible> {
        let category = FailureCategory::from(&error);
        if !self.final_attempt && category != FailureCategory::Cancelled {
            return Ok(Outcome::RetryableFailure(category));
        }
        Ok(Outcome::TerminalFailure(
            self.inner.handle_error(request, error),
            category,
        ))
    }
}

/// Unwrap a classifier result; the classifier itself never fails
pub(crate) fn into_outcome<T, E>(result: Result<Outcome<T, E>, Infallible>) -> Outcome<T, E> {
    match result {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    }
}
