// Shared fixtures for the balancing client integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use reqwest::Url;
use sgl_http_balancer::client::{
    AsyncHttpClient, HttpClient, HttpResponseFuture, Request, RequestStats,
    RequestStatsRecorder, Response, ResponseHandler,
};
use sgl_http_balancer::config::{BalancingClientConfig, BalancingClientConfigBuilder};
use sgl_http_balancer::core::{AttemptOutcome, EndpointStats, HttpClientError, ServiceBalancer};

pub const SERVICE: &str = "test-service";

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn balancer(uris: &[&str]) -> ServiceBalancer {
    ServiceBalancer::with_uris(SERVICE, uris.iter().map(|uri| url(uri)))
}

pub fn config(max_attempts: u32) -> BalancingClientConfig {
    BalancingClientConfigBuilder::new()
        .service_type(SERVICE)
        .max_attempts(max_attempts)
        .build()
        .unwrap()
}

pub fn status(code: u16) -> Response {
    Response::new(StatusCode::from_u16(code).unwrap())
}

pub fn connect_error(uri: &str) -> HttpClientError {
    HttpClientError::Connect {
        uri: uri.to_string(),
        reason: "connection refused".to_string(),
    }
}

/// Total attempts recorded with `outcome`, across endpoints and categories
pub fn outcome_count(stats: &[EndpointStats], outcome: AttemptOutcome) -> u64 {
    stats
        .iter()
        .filter(|entry| entry.outcome == outcome)
        .map(|entry| entry.count)
        .sum()
}

pub fn category_count(stats: &[EndpointStats], category: &str) -> u64 {
    stats
        .iter()
        .filter(|entry| entry.category == category)
        .map(|entry| entry.count)
        .sum()
}

pub enum Reply {
    Response(Response),
    Error(HttpClientError),
    /// Never completes; only meaningful for async calls
    Pending,
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<HttpClientError> for Reply {
    fn from(error: HttpClientError) -> Self {
        Reply::Error(error)
    }
}

struct Expectation {
    uri: Option<String>,
    reply: Reply,
}

#[derive(Default)]
struct Script {
    expected: VecDeque<Expectation>,
    calls: Vec<String>,
}

/// Scripted transport: each call consumes the next expectation in order
#[derive(Clone, Default)]
pub struct TestingHttpClient {
    script: Arc<Mutex<Script>>,
    stats: Arc<RequestStatsRecorder>,
    abandoned: Arc<AtomicUsize>,
}

impl TestingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the next call to target `uri` and answer it with `reply`
    pub fn expect_call(self, uri: &str, reply: impl Into<Reply>) -> Self {
        self.push(Some(uri.to_string()), reply.into());
        self
    }

    /// Expect a call to whichever endpoint the balancer picks
    pub fn expect_any_call(self, reply: impl Into<Reply>) -> Self {
        self.push(None, reply.into());
        self
    }

    pub fn expect_pending(self, uri: &str) -> Self {
        self.push(Some(uri.to_string()), Reply::Pending);
        self
    }

    fn push(&self, uri: Option<String>, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .expected
            .push_back(Expectation { uri, reply });
    }

    fn next_reply(&self, request: &Request) -> Reply {
        let mut script = self.script.lock().unwrap();
        let expectation = script
            .expected
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call to {}", request.uri()));
        if let Some(uri) = &expectation.uri {
            assert_eq!(request.uri(), uri, "call went to the wrong endpoint");
        }
        script.calls.push(request.uri().to_string());
        expectation.reply
    }

    /// URIs called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Pending exchanges whose future was dropped before completing
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn assert_done(&self) {
        let script = self.script.lock().unwrap();
        let remaining: Vec<_> = script
            .expected
            .iter()
            .map(|e| e.uri.clone().unwrap_or_else(|| "<any>".to_string()))
            .collect();
        assert!(remaining.is_empty(), "expected calls not made: {remaining:?}");
    }
}

impl HttpClient for TestingHttpClient {
    fn execute<H>(&self, request: Request, handler: &H) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler,
    {
        match self.next_reply(&request) {
            Reply::Response(response) => {
                self.stats
                    .record_response(Duration::ZERO, response.body().len());
                handler.handle(&request, response)
            }
            Reply::Error(error) => {
                self.stats.record_failure(Duration::ZERO);
                handler.handle_error(&request, error)
            }
            Reply::Pending => panic!("pending replies need an async client"),
        }
    }

    fn stats(&self) -> RequestStats {
        self.stats.snapshot()
    }
}

struct AbandonSignal(Arc<AtomicUsize>);

impl Drop for AbandonSignal {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl AsyncHttpClient for TestingHttpClient {
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
        let stats = Arc::clone(&self.stats);
        match self.next_reply(&request) {
            Reply::Response(response) => HttpResponseFuture::new(
                async move {
                    stats.record_response(Duration::ZERO, response.body().len());
                    handler.handle(&request, response)
                },
                Arc::new(|| "sending request".to_string()),
            ),
            Reply::Error(error) => HttpResponseFuture::new(
                async move {
                    stats.record_failure(Duration::ZERO);
                    handler.handle_error(&request, error)
                },
                Arc::new(|| "sending request".to_string()),
            ),
            Reply::Pending => {
                let signal = AbandonSignal(Arc::clone(&self.abandoned));
                HttpResponseFuture::new(
                    async move {
                        let _signal = signal;
                        futures::future::pending::<()>().await;
                        handler.handle_error(&request, HttpClientError::Cancelled)
                    },
                    Arc::new(|| "waiting for response".to_string()),
                )
            }
        }
    }

    fn stats(&self) -> RequestStats {
        self.stats.snapshot()
    }
}
