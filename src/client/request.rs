use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// An HTTP request as passed between the caller, the balancer and the transport.
///
/// Callers of the balancing clients use a relative target (`v1/service`); the
/// balancer rewrites it against the chosen endpoint before handing it on.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn get(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::GET).uri(uri)
    }

    pub fn post(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::POST).uri(uri)
    }

    pub fn put(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::PUT).uri(uri)
    }

    pub fn delete(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::DELETE).uri(uri)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Same request aimed at a different target
    pub fn with_uri(&self, uri: impl Into<String>) -> Request {
        Request {
            method: self.method.clone(),
            uri: uri.into(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
        }
    }
}
