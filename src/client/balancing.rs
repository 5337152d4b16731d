//! Blocking balancing client
//!
//! Each logical request walks through endpoints chosen by the
//! [`ServiceBalancer`] until one attempt produces a non-retryable outcome or the
//! attempt budget runs out. Retries are invisible to the caller's handler.

use tracing::{debug, warn};

use super::classifier::{into_outcome, RetryingResponseHandler};
use super::handler::ResponseHandler;
use super::request::Request;
use super::transport::{HttpClient, RequestStats};
use super::uri;
use crate::config::BalancingClientConfig;
use crate::core::{EndpointStats, FailureCategory, Outcome, ServiceBalancer};
use crate::metrics::BalancerMetrics;

pub struct BalancingHttpClient<C> {
    balancer: ServiceBalancer,
    http_client: C,
    max_attempts: u32,
}

impl<C: HttpClient> BalancingHttpClient<C> {
    pub fn new(balancer: ServiceBalancer, http_client: C, config: &BalancingClientConfig) -> Self {
        Self {
            balancer,
            http_client,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Execute a request with a relative target against the balanced service.
    ///
    /// # Panics
    ///
    /// Panics if the request target is not relative (it has a scheme, a host
    /// or a leading `/`). Use [`uri::validate_relative`] first when the target
    /// comes from untrusted input.
    pub fn execute<H>(&self, request: Request, handler: &H) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler,
    {
        uri::require_relative(request.uri());

        let mut attempt = match self.balancer.begin_attempt() {
            Ok(attempt) => attempt,
            Err(err) => return handler.handle_error(&request, err.into()),
        };
        let mut attempts_left = self.max_attempts;

        loop {
            let target = match uri::resolve(attempt.uri(), request.uri()) {
                Ok(target) => target,
                Err(err) => {
                    attempt.mark_bad(FailureCategory::from(&err));
                    return handler.handle_error(&request, err);
                }
            };
            let sub_request = request.with_uri(target.as_str());

            let final_attempt = attempts_left <= 1;
            attempts_left = attempts_left.saturating_sub(1);

            let classifier = RetryingResponseHandler::new(handler, final_attempt);
            match into_outcome(self.http_client.execute(sub_request, &classifier)) {
                Outcome::Success(value) => {
                    attempt.mark_good();
                    return Ok(value);
                }
                Outcome::TerminalFailure(result, category) => {
                    attempt.mark_bad(category);
                    if final_attempt && self.max_attempts > 1 {
                        warn!(
                            service = %self.balancer.service_type(),
                            endpoint = %target,
                            %category,
                            "Giving up after {} attempts",
                            self.max_attempts
                        );
                    }
                    return result;
                }
                Outcome::RetryableFailure(category) => {
                    attempt.mark_bad(category);
                    debug!(
                        service = %self.balancer.service_type(),
                        endpoint = %target,
                        %category,
                        attempts_left,
                        "Retrying on another endpoint"
                    );
                    BalancerMetrics::record_retry(self.balancer.service_type());
                    attempt = match attempt.next() {
                        Ok(next) => next,
                        Err(err) => return handler.handle_error(&request, err.into()),
                    };
                }
            }
        }
    }

    /// Transport counters for every exchange this client issued
    pub fn get_stats(&self) -> RequestStats {
        self.http_client.stats()
    }

    /// Per-endpoint attempt outcomes recorded by the balancer
    pub fn attempt_stats(&self) -> Vec<EndpointStats> {
        self.balancer.stats()
    }

    pub fn balancer(&self) -> &ServiceBalancer {
        &self.balancer
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl<C: HttpClient> HttpClient for BalancingHttpClient<C> {
    fn execute<H>(&self, request: Request, handler: &H) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler,
    {
        BalancingHttpClient::execute(self, request, handler)
    }

    fn stats(&self) -> RequestStats {
        self.http_client.stats()
    }
}
