use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;

use super::request::Request;
use super::response::Response;
use crate::core::HttpClientError;

/// Turns the result of one exchange into the caller's value or error.
///
/// A transport calls exactly one of the two methods exactly once per request.
pub trait ResponseHandler: Send + Sync {
    type Output: Send;
    type Error: Send;

    /// A response was received
    fn handle(&self, request: &Request, response: Response) -> Result<Self::Output, Self::Error>;

    /// No response could be obtained
    fn handle_error(
        &self,
        request: &Request,
        error: HttpClientError,
    ) -> Result<Self::Output, Self::Error>;
}

impl<H: ResponseHandler + ?Sized> ResponseHandler for &H {
    type Output = H::Output;
    type Error = H::Error;

    fn handle(&self, request: &Request, response: Response) -> Result<Self::Output, Self::Error> {
        (**self).handle(request, response)
    }

    fn handle_error(
        &self,
        request: &Request,
        error: HttpClientError,
    ) -> Result<Self::Output, Self::Error> {
        (**self).handle_error(request, error)
    }
}

impl<H: ResponseHandler + ?Sized> ResponseHandler for Arc<H> {
    type Output = H::Output;
    type Error = H::Error;

    fn handle(&self, request: &Request, response: Response) -> Result<Self::Output, Self::Error> {
        (**self).handle(request, response)
    }

    fn handle_error(
        &self,
        request: &Request,
        error: HttpClientError,
    ) -> Result<Self::Output, Self::Error> {
        (**self).handle_error(request, error)
    }
}

/// Handler built from a pair of closures, see [`handler_fn`]
pub struct FnResponseHandler<F, G, T, E> {
    on_response: F,
    on_error: G,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Build a handler from a response closure and an error closure
pub fn handler_fn<F, G, T, E>(on_response: F, on_error: G) -> FnResponseHandler<F, G, T, E>
where
    F: Fn(&Request, Response) -> Result<T, E> + Send + Sync,
    G: Fn(&Request, HttpClientError) -> Result<T, E> + Send + Sync,
{
    FnResponseHandler {
        on_response,
        on_error,
        _marker: PhantomData,
    }
}

impl<F, G, T, E> ResponseHandler for FnResponseHandler<F, G, T, E>
where
    F: Fn(&Request, Response) -> Result<T, E> + Send + Sync,
    G: Fn(&Request, HttpClientError) -> Result<T, E> + Send + Sync,
    T: Send,
    E: Send,
{
    type Output = T;
    type Error = E;

    fn handle(&self, request: &Request, response: Response) -> Result<T, E> {
        (self.on_response)(request, response)
    }

    fn handle_error(&self, request: &Request, error: HttpClientError) -> Result<T, E> {
        (self.on_error)(request, error)
    }
}

/// Error from the stock handlers that expect a successful status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("Unexpected status {status} from {uri}: {body}")]
    UnexpectedStatus {
        status: StatusCode,
        uri: String,
        body: String,
    },

    #[error(transparent)]
    Client(#[from] HttpClientError),
}

/// Returns the body as text for 2xx responses
#[derive(Debug, Default, Clone, Copy)]
pub struct StringResponseHandler;

impl ResponseHandler for StringResponseHandler {
    type Output = String;
    type Error = ResponseError;

    fn handle(&self, request: &Request, response: Response) -> Result<String, ResponseError> {
        if !response.status().is_success() {
            return Err(ResponseError::UnexpectedStatus {
                status: response.status(),
                uri: request.uri().to_string(),
                body: response.text().into_owned(),
            });
        }
        Ok(response.text().into_owned())
    }

    fn handle_error(
        &self,
        _request: &Request,
        error: HttpClientError,
    ) -> Result<String, ResponseError> {
        Err(error.into())
    }
}

/// Returns the status code of whatever response arrives
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusResponseHandler;

impl ResponseHandler for StatusResponseHandler {
    type Output = StatusCode;
    type Error = HttpClientError;

    fn handle(&self, _request: &Request, response: Response) -> Result<StatusCode, HttpClientError> {
        Ok(response.status())
    }

    fn handle_error(
        &self,
        _request: &Request,
        error: HttpClientError,
    ) -> Result<StatusCode, HttpClientError> {
        Err(error)
    }
}

/// Returns the whole response, failing only when none was received
#[derive(Debug, Default, Clone, Copy)]
pub struct FullResponseHandler;

impl ResponseHandler for FullResponseHandler {
    type Output = Response;
    type Error = HttpClientError;

    fn handle(&self, _request: &Request, response: Response) -> Result<Response, HttpClientError> {
        Ok(response)
    }

    fn handle_error(
        &self,
        _request: &Request,
        error: HttpClientError,
    ) -> Result<Response, HttpClientError> {
        Err(error)
    }
}
