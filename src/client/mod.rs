//! Request execution against a balanced service
//!
//! - Request/response values and handlers
//! - Transport traits and the reqwest transports
//! - Outcome classification
//! - Blocking and async balancing clients

pub mod balancing;
pub mod balancing_async;
pub mod classifier;
pub mod handler;
pub mod request;
pub mod reqwest_client;
pub mod response;
pub mod transport;
pub mod uri;

pub use balancing::BalancingHttpClient;
pub use balancing_async::{BalancingAsyncHttpClient, RetryFuture};
pub use classifier::RetryingResponseHandler;
pub use handler::{
    handler_fn, FnResponseHandler, FullResponseHandler, ResponseError, ResponseHandler,
    StatusResponseHandler, StringResponseHandler,
};
pub use request::{Request, RequestBuilder};
pub use reqwest_client::{ReqwestAsyncHttpClient, ReqwestHttpClient};
pub use response::Response;
pub use transport::{
    AsyncHttpClient, HttpClient, HttpResponseFuture, ProgressState, RequestStats,
    RequestStatsRecorder, StateFn,
};
