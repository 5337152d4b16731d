//! Transport boundary
//!
//! The balancing clients never do I/O themselves; they hand concrete requests
//! to an `HttpClient` or `AsyncHttpClient` and rely on it to call the handler.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;

use super::handler::ResponseHandler;
use super::request::Request;

/// Blocking transport
pub trait HttpClient: Send + Sync {
    /// Perform one exchange and pass its result to `handler`
    fn execute<H>(&self, request: Request, handler: &H) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler;

    fn stats(&self) -> RequestStats;
}

/// Non-blocking transport
pub trait AsyncHttpClient: Send + Sync {
    /// Start one exchange; the returned future resolves to the handler's result.
    ///
    /// Dropping the future abandons the exchange.
    fn execute_async<H>(
        &self,
        request: Request,
        handler: Arc<H>,
    ) -> HttpResponseFuture<H::Output, H::Error>
    where
        H: ResponseHandler + 'static,
        H::Output: 'static,
        H::Error: 'static;

    fn stats(&self) -> RequestStats;
}

pub type StateFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Future returned by an `AsyncHttpClient`, with a readable progress string
pub struct HttpResponseFuture<T, E> {
    inner: BoxFuture<'static, Result<T, E>>,
    state: StateFn,
}

impl<T, E> HttpResponseFuture<T, E> {
    pub fn new<F>(future: F, state: StateFn) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
            state,
        }
    }

    /// Human readable description of where the exchange currently is
    pub fn state(&self) -> String {
        (self.state)()
    }

    /// Shareable handle on [`state`](Self::state) that outlives a borrow of the future
    pub fn state_fn(&self) -> StateFn {
        Arc::clone(&self.state)
    }
}

impl<T, E> HttpResponseFuture<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Future that is already complete
    pub fn ready(result: Result<T, E>) -> Self {
        let state = if result.is_ok() {
            "Succeeded with result"
        } else {
            "Failed with error"
        };
        Self::new(
            futures::future::ready(result),
            Arc::new(move || state.to_string()),
        )
    }
}

impl<T, E> Future for HttpResponseFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T, E> fmt::Debug for HttpResponseFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponseFuture")
            .field("state", &self.state())
            .finish()
    }
}

/// Shared progress label a transport updates as an exchange moves along
#[derive(Debug, Clone)]
pub struct ProgressState {
    current: Arc<Mutex<&'static str>>,
}

impl ProgressState {
    pub fn new(initial: &'static str) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn set(&self, state: &'static str) {
        *self.current.lock() = state;
    }

    pub fn get(&self) -> &'static str {
        *self.current.lock()
    }

    pub fn reporter(&self) -> StateFn {
        let current = Arc::clone(&self.current);
        Arc::new(move || (*current.lock()).to_string())
    }
}

/// Aggregated transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub requests: u64,
    pub failures: u64,
    pub total_elapsed: Duration,
    pub bytes_read: u64,
}

/// Lock-free accumulator behind [`RequestStats`]
#[derive(Debug, Default)]
pub struct RequestStatsRecorder {
    requests: AtomicU64,
    failures: AtomicU64,
    elapsed_micros: AtomicU64,
    bytes_read: AtomicU64,
}

impl RequestStatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response(&self, elapsed: Duration, bytes: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.elapsed_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.elapsed_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_elapsed: Duration::from_micros(self.elapsed_micros.load(Ordering::Relaxed)),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}
