//! reqwest-backed transports
//!
//! These do the actual network I/O for concrete (absolute) request URIs. The
//! whole body is buffered before the handler runs.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;

use super::handler::ResponseHandler;
use super::request::Request;
use super::response::Response;
use super::transport::{
    AsyncHttpClient, HttpClient, HttpResponseFuture, ProgressState, RequestStats,
    RequestStatsRecorder,
};
use crate::config::BalancingClientConfig;
use crate::core::HttpClientError;

fn parse_target(request: &Request) -> Result<Url, HttpClientError> {
    Url::parse(request.uri())
        .map_err(|err| HttpClientError::invalid_request(request.uri(), &err.to_string()))
}

/// Blocking transport on top of `reqwest::blocking`.
///
/// Must not be created or dropped from inside an async runtime.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
    stats: Arc<RequestStatsRecorder>,
}

impl ReqwestHttpClient {
    pub fn new(config: &BalancingClientConfig) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client,
            stats: Arc::new(RequestStatsRecorder::new()),
        }
    }

    fn send(&self, request: &Request, url: Url) -> reqwest::Result<Response> {
        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?;
        Ok(Response::from_parts(status, headers, body))
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<H>(&self, request: Request, handler: &H) -> Result<H::Output, H::Error>
    where
        H: ResponseHandler,
    {
        let url = match parse_target(&request) {
            Ok(url) => url,
            Err(err) => return handler.handle_error(&request, err),
        };

        let start = Instant::now();
        match self.send(&request, url) {
            Ok(response) => {
                self.stats
                    .record_response(start.elapsed(), response.body().len());
                handler.handle(&request, response)
            }
            Err(err) => {
                self.stats.record_failure(start.elapsed());
                handler.handle_error(&request, err.into())
            }
        }
    }

    fn stats(&self) -> RequestStats {
        self.stats.snapshot()
    }
}

/// Async transport on top of `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestAsyncHttpClient {
    client: reqwest::Client,
    stats: Arc<RequestStatsRecorder>,
}

impl ReqwestAsyncHttpClient {
    pub fn new(config: &BalancingClientConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            stats: Arc::new(RequestStatsRecorder::new()),
        }
    }
}

impl AsyncHttpClient for ReqwestAsyncHttpClient {
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
        let progress = ProgressState::new("sending request");
        let reporter = progress.reporter();
        let client = self.client.clone();
        let stats = Arc::clone(&self.stats);

        let future = async move {
            let url = match parse_target(&request) {
                Ok(url) => url,
                Err(err) => {
                    progress.set("done");
                    return handler.handle_error(&request, err);
                }
            };

            let start = Instant::now();
            let mut builder = client
                .request(request.method().clone(), url)
                .headers(request.headers().clone());
            if let Some(body) = request.body() {
                builder = builder.body(body.clone());
            }

            let exchange = async {
                let response = builder.send().await?;
                progress.set("reading response body");
                let status = response.status();
                let headers = response.headers().clone();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>(Response::from_parts(status, headers, body))
            }
            .await;

            progress.set("handling response");
            let result = match exchange {
                Ok(response) => {
                    stats.record_response(start.elapsed(), response.body().len());
                    handler.handle(&request, response)
                }
                Err(err) => {
                    stats.record_failure(start.elapsed());
                    handler.handle_error(&request, err.into())
                }
            };
            progress.set("done");
            result
        };

        HttpResponseFuture::new(future, reporter)
    }

    fn stats(&self) -> RequestStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::handler::StatusResponseHandler;

    // Port 1 is reserved and nothing listens on it in the test environment
    const CLOSED_PORT_URI: &str = "http://127.0.0.1:1/v1/service";

    fn config() -> BalancingClientConfig {
        BalancingClientConfig {
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn is_connect_failure(err: &HttpClientError) -> bool {
        matches!(
            err,
            HttpClientError::Connect { .. } | HttpClientError::Transport { .. }
        )
    }

    #[test]
    fn test_blocking_connect_failure_reaches_error_path() {
        let client = ReqwestHttpClient::new(&config()).unwrap();
        let err = client
            .execute(Request::get(CLOSED_PORT_URI).build(), &StatusResponseHandler)
            .unwrap_err();
        assert!(is_connect_failure(&err), "unexpected error {err:?}");

        let stats = client.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_blocking_rejects_unparseable_target() {
        let client = ReqwestHttpClient::new(&config()).unwrap();
        let err = client
            .execute(Request::get("v1/service").build(), &StatusResponseHandler)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(client.stats().requests, 0);
    }

    #[tokio::test]
    async fn test_async_connect_failure_reaches_error_path() {
        let client = ReqwestAsyncHttpClient::new(&config()).unwrap();
        let future = client.execute_async(
            Request::get(CLOSED_PORT_URI).build(),
            Arc::new(StatusResponseHandler),
        );
        assert_eq!(future.state(), "sending request");

        let err = future.await.unwrap_err();
        assert!(is_connect_failure(&err), "unexpected error {err:?}");
        assert_eq!(client.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_async_rejects_unparseable_target() {
        let client = ReqwestAsyncHttpClient::new(&config()).unwrap();
        let err = client
            .execute_async(
                Request::get("not a uri").build(),
                Arc::new(StatusResponseHandler),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(client.stats().requests, 0);
    }
}
