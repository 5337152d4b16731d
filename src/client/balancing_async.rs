//! Non-blocking balancing client
//!
//! Same decisions as the blocking client, expressed as an explicit state
//! machine inside [`RetryFuture`]: the future holds the current attempt and
//! the transport future serving it. When that sub-future finishes with a
//! retryable outcome the next attempt is launched in place. Cancellation and
//! retry transitions both go through the same lock, so a cancel always reaches
//! whichever sub-future is live.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, warn};

use super::classifier::{into_outcome, RetryingResponseHandler};
use super::handler::ResponseHandler;
use super::request::Request;
use super::transport::{AsyncHttpClient, HttpResponseFuture, RequestStats};
use super::uri;
use crate::config::BalancingClientConfig;
use crate::core::{
    EndpointStats, FailureCategory, HttpClientError, Outcome, ServiceAttempt, ServiceBalancer,
};
use crate::metrics::BalancerMetrics;

type SubFuture<T, E> = HttpResponseFuture<Outcome<T, E>, Infallible>;
type LaunchFn<T, E> = Box<dyn Fn(Request, bool) -> SubFuture<T, E> + Send + Sync>;
type ErrorFn<T, E> = Box<dyn Fn(&Request, HttpClientError) -> Result<T, E> + Send + Sync>;

pub struct BalancingAsyncHttpClient<C> {
    balancer: ServiceBalancer,
    http_client: Arc<C>,
    max_attempts: u32,
}

impl<C> BalancingAsyncHttpClient<C>
where
    C: AsyncHttpClient + 'static,
{
    pub fn new(balancer: ServiceBalancer, http_client: C, config: &BalancingClientConfig) -> Self {
        Self {
            balancer,
            http_client: Arc::new(http_client),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Start a request with a relative target against the balanced service.
    ///
    /// An empty pool completes the returned future immediately through the
    /// handler's error path.
    ///
    /// # Panics
    ///
    /// Panics if the request target is not relative (it has a scheme, a host
    /// or a leading `/`).
    pub fn execute_async<H>(&self, request: Request, handler: Arc<H>) -> RetryFuture<H::Output, H::Error>
    where
        H: ResponseHandler + 'static,
        H::Output: 'static,
        H::Error: 'static,
    {
        uri::require_relative(request.uri());

        let http_client = Arc::clone(&self.http_client);
        let launch_handler = Arc::clone(&handler);
        let launch: LaunchFn<H::Output, H::Error> =
            Box::new(move |sub_request: Request, final_attempt: bool| {
                let classifier = Arc::new(RetryingResponseHandler::new(
                    Arc::clone(&launch_handler),
                    final_attempt,
                ));
                http_client.execute_async(sub_request, classifier)
            });
        let on_error: ErrorFn<H::Output, H::Error> =
            Box::new(move |request: &Request, error: HttpClientError| {
                handler.handle_error(request, error)
            });

        let future = RetryFuture {
            shared: Arc::new(RetryShared {
                request,
                service_type: self.balancer.service_type().to_string(),
                max_attempts: self.max_attempts,
                launch,
                on_error,
                state: Mutex::new(RetryState::new(self.max_attempts)),
            }),
        };

        let shared = &future.shared;
        let step = {
            let mut state = shared.state.lock();
            match self.balancer.begin_attempt() {
                Ok(attempt) => shared.launch_attempt(&mut state, attempt),
                Err(err) => shared.fail(&mut state, err.into()),
            }
        };
        shared.finish(step);

        future
    }

    /// Convenience wrapper awaiting [`execute_async`](Self::execute_async)
    pub async fn execute<H>(&self, request: Request, handler: Arc<H>) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler + 'static,
        H::Output: 'static,
        H::Error: 'static,
    {
        self.execute_async(request, handler).await
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

impl<C> AsyncHttpClient for BalancingAsyncHttpClient<C>
where
    C: AsyncHttpClient + 'static,
{
    fn execute_async<H>(
        &self,
        request: Request,
        handler: Arc<H>,
    ) -> HttpResponseFuture<H::Output, H::Error>
    where
        H: ResponseHandler + 'static,
        H::Output: 'static,
        H::Error: 'static,
    {
        let future = BalancingAsyncHttpClient::execute_async(self, request, handler);
        let shared = Arc::clone(&future.shared);
        HttpResponseFuture::new(future, Arc::new(move || shared.describe()))
    }

    fn stats(&self) -> RequestStats {
        self.http_client.stats()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// Result is being produced by the handler's error path, outside the lock
    Finishing,
    Done(&'static str),
}

/// Work left after a transition made under the state lock
#[must_use]
enum Step {
    Continue,
    /// Complete through the handler's error path once the lock is released
    Fail(HttpClientError),
}

struct RetryState<T, E> {
    phase: Phase,
    attempt: Option<ServiceAttempt>,
    attempt_number: u32,
    attempts_left: u32,
    uri: Option<Url>,
    sub_future: Option<SubFuture<T, E>>,
    result: Option<Result<T, E>>,
    waker: Option<Waker>,
}

impl<T, E> RetryState<T, E> {
    fn new(max_attempts: u32) -> Self {
        Self {
            phase: Phase::Running,
            attempt: None,
            attempt_number: 0,
            attempts_left: max_attempts,
            uri: None,
            sub_future: None,
            result: None,
            waker: None,
        }
    }

    fn mark_cancelled(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            if !attempt.is_resolved() {
                attempt.mark_bad(FailureCategory::Cancelled);
            }
        }
    }
}

impl<T, E> Drop for RetryState<T, E> {
    fn drop(&mut self) {
        // Abandon the exchange first, then give back the endpoint slot
        self.sub_future.take();
        self.mark_cancelled();
    }
}

struct RetryShared<T, E> {
    request: Request,
    service_type: String,
    max_attempts: u32,
    launch: LaunchFn<T, E>,
    on_error: ErrorFn<T, E>,
    state: Mutex<RetryState<T, E>>,
}

impl<T, E> RetryShared<T, E> {
    fn launch_attempt(&self, state: &mut RetryState<T, E>, mut attempt: ServiceAttempt) -> Step {
        let target = match uri::resolve(attempt.uri(), self.request.uri()) {
            Ok(target) => target,
            Err(err) => {
                attempt.mark_bad(FailureCategory::from(&err));
                state.attempt = Some(attempt);
                return self.fail(state, err);
            }
        };

        let final_attempt = state.attempts_left <= 1;
        state.attempts_left = state.attempts_left.saturating_sub(1);
        state.attempt_number += 1;

        let sub_future = (self.launch)(self.request.with_uri(target.as_str()), final_attempt);
        state.attempt = Some(attempt);
        state.uri = Some(target);
        state.sub_future = Some(sub_future);
        Step::Continue
    }

    fn on_outcome(&self, state: &mut RetryState<T, E>, outcome: Outcome<T, E>) -> Step {
        let attempt = match state.attempt.as_mut() {
            Some(attempt) => attempt,
            None => panic!("attempt outcome arrived with no attempt in flight"),
        };

        match outcome {
            Outcome::Success(value) => {
                attempt.mark_good();
                self.complete(state, Ok(value));
                Step::Continue
            }
            Outcome::TerminalFailure(result, category) => {
                attempt.mark_bad(category);
                if state.attempts_left == 0 && self.max_attempts > 1 {
                    warn!(
                        service = %self.service_type,
                        endpoint = %attempt,
                        %category,
                        "Giving up after {} attempts",
                        self.max_attempts
                    );
                }
                self.complete(state, result);
                Step::Continue
            }
            Outcome::RetryableFailure(category) => {
                attempt.mark_bad(category);
                debug!(
                    service = %self.service_type,
                    endpoint = %attempt,
                    %category,
                    attempts_left = state.attempts_left,
                    "Retrying on another endpoint"
                );
                BalancerMetrics::record_retry(&self.service_type);
                match attempt.next() {
                    Ok(next) => self.launch_attempt(state, next),
                    Err(err) => self.fail(state, err.into()),
                }
            }
        }
    }

    /// Claim completion for the error path; cancel() can no longer win
    fn fail(&self, state: &mut RetryState<T, E>, error: HttpClientError) -> Step {
        state.phase = Phase::Finishing;
        Step::Fail(error)
    }

    /// Run the handler's error path with the state lock released
    fn finish(&self, step: Step) {
        if let Step::Fail(error) = step {
            let result = (self.on_error)(&self.request, error);
            self.complete(&mut self.state.lock(), result);
        }
    }

    fn complete(&self, state: &mut RetryState<T, E>, result: Result<T, E>) {
        state.phase = Phase::Done(if result.is_ok() {
            "Succeeded with result"
        } else {
            "Failed with error"
        });
        state.result = Some(result);
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    fn describe(&self) -> String {
        let state = self.state.lock();
        match (state.phase, &state.uri, &state.sub_future) {
            (Phase::Done(label), _, _) => label.to_string(),
            (Phase::Finishing, _, _) => "Completing".to_string(),
            (Phase::Running, Some(uri), sub_future) => format!(
                "Attempt {} of {} to {}: {}",
                state.attempt_number,
                self.max_attempts,
                uri,
                sub_future
                    .as_ref()
                    .map_or_else(|| "handling response".to_string(), |sub| sub.state())
            ),
            (Phase::Running, None, _) => "Starting".to_string(),
        }
    }
}

/// Outer future of one logical request.
///
/// Resolves to whatever the caller's handler produced for the final attempt.
/// Dropping it abandons the in-flight exchange and marks the attempt bad.
///
/// The caller's handler never runs under the future's internal lock, so a
/// handler may call [`state`](Self::state), [`is_done`](Self::is_done) or
/// [`cancel`](Self::cancel) on the future it is serving. A cancel issued
/// while a response is being handled takes effect once the handler returns;
/// its value is then discarded.
pub struct RetryFuture<T, E> {
    shared: Arc<RetryShared<T, E>>,
}

impl<T, E> RetryFuture<T, E> {
    /// Cancel the logical request.
    ///
    /// The live sub-future is dropped, the current attempt is marked bad and
    /// the future completes through the handler's error path with
    /// `HttpClientError::Cancelled`. Returns false if it had already completed.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let abandoned = {
            let mut state = shared.state.lock();
            if state.phase != Phase::Running {
                return false;
            }
            state.phase = Phase::Finishing;
            let abandoned = state.sub_future.take();
            state.mark_cancelled();
            abandoned
        };
        drop(abandoned);
        debug!(service = %shared.service_type, "Request cancelled");

        let result = (shared.on_error)(&shared.request, HttpClientError::Cancelled);
        let mut state = shared.state.lock();
        shared.complete(&mut state, result);
        state.phase = Phase::Done("Cancelled");
        true
    }

    pub fn is_done(&self) -> bool {
        self.shared.state.lock().phase != Phase::Running
    }

    /// Human readable progress, e.g. `Attempt 2 of 3 to http://s2/v1/service: sending request`
    pub fn state(&self) -> String {
        self.shared.describe()
    }
}

impl<T, E> Future for RetryFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let shared = &self.shared;
        loop {
            // Take the sub-future out so the handler it drives runs unlocked
            let mut sub_future = {
                let mut state = shared.state.lock();
                if let Some(result) = state.result.take() {
                    return Poll::Ready(result);
                }
                match state.phase {
                    Phase::Running => {}
                    Phase::Finishing => {
                        state.waker = Some(cx.waker().clone());
                        return Poll::Pending;
                    }
                    Phase::Done(_) => panic!("RetryFuture polled after completion"),
                }
                match state.sub_future.take() {
                    Some(sub_future) => sub_future,
                    None => panic!("RetryFuture running without an exchange in flight"),
                }
            };

            let polled = Pin::new(&mut sub_future).poll(cx);

            let step = {
                let mut state = shared.state.lock();
                if state.phase != Phase::Running {
                    // Cancelled while the handler ran; the outcome is dropped
                    continue;
                }
                match polled {
                    Poll::Pending => {
                        state.sub_future = Some(sub_future);
                        state.waker = Some(cx.waker().clone());
                        return Poll::Pending;
                    }
                    Poll::Ready(result) => shared.on_outcome(&mut state, into_outcome(result)),
                }
            };
            shared.finish(step);
        }
    }
}

impl<T, E> fmt::Debug for RetryFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFuture")
            .field("state", &self.state())
            .finish()
    }
}
