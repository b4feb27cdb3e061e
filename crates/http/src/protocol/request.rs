//! HTTP request handling implementation.
//!
//! [`RequestHeader`] wraps `http::Request<()>` as produced by the header decoder.
//! [`Request`] is the in-flight message shared between the connection engine and
//! the request handler: the header plus two one-shot readiness signals and the
//! slot the engine fills with the finalized body.

use std::sync::{Mutex, PoisonError};

use http::request::Parts;
use http::{HeaderMap, Method, Request as HttpRequest, Uri, Version};
use tracing::trace;

use crate::protocol::body::RequestBody;
use crate::protocol::{ParseError, ReadySignal};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: HttpRequest<()>,
}

impl AsRef<HttpRequest<()>> for RequestHeader {
    fn as_ref(&self) -> &HttpRequest<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> HttpRequest<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Header names are lower-case, lookups are case-insensitive.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: HttpRequest::from_parts(parts, ()) }
    }
}

impl From<HttpRequest<()>> for RequestHeader {
    #[inline]
    fn from(inner: HttpRequest<()>) -> Self {
        Self { inner }
    }
}

/// The request side of one in-flight message.
///
/// The engine fires `headers_ready` when it builds the request and completes
/// the body once the message ends; `body_ready` fires strictly after the body
/// parser finished.
#[derive(Debug)]
pub struct Request {
    header: RequestHeader,
    headers_ready: ReadySignal,
    body_ready: ReadySignal,
    body: Mutex<Option<Result<RequestBody, ParseError>>>,
}

impl Request {
    pub fn new(header: RequestHeader) -> Self {
        Self { header, headers_ready: ReadySignal::new(), body_ready: ReadySignal::new(), body: Mutex::new(None) }
    }

    /// A request whose header and body are both ready.
    pub fn with_body(header: RequestHeader, body: RequestBody) -> Self {
        let request = Self::new(header);
        request.headers_ready.fire();
        request.complete_body(Ok(body));
        request
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn headers_ready(&self) -> &ReadySignal {
        &self.headers_ready
    }

    pub fn body_ready(&self) -> &ReadySignal {
        &self.body_ready
    }

    /// Stores the finalized body and fires `body_ready`.
    ///
    /// Only the first completion counts.
    pub fn complete_body(&self, body: Result<RequestBody, ParseError>) {
        if self.body_ready.is_fired() {
            return;
        }

        *self.body.lock().unwrap_or_else(PoisonError::into_inner) = Some(body);
        self.body_ready.fire();
        trace!("request body ready");
    }

    /// Waits for the body and takes it.
    ///
    /// # Errors
    ///
    /// - the body parser's error, for a malformed body
    /// - [`ParseError::BodyConsumed`] if the body was already taken
    pub async fn body(&self) -> Result<RequestBody, ParseError> {
        self.body_ready.wait().await;
        self.body.lock().unwrap_or_else(PoisonError::into_inner).take().unwrap_or(Err(ParseError::BodyConsumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;

    fn header(method: Method, uri: &str) -> RequestHeader {
        HttpRequest::builder().method(method).uri(uri).body(()).unwrap().into()
    }

    #[tokio::test]
    async fn body_waits_for_completion() {
        let request = Arc::new(Request::new(header(Method::POST, "/upload")));

        let reader = tokio::spawn({
            let request = request.clone();
            async move { request.body().await }
        });
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        request.complete_body(Ok(RequestBody::Raw(Bytes::from_static(b"payload"))));
        let body = reader.await.unwrap().unwrap();
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"payload"));

        // taken once
        assert!(matches!(request.body().await, Err(ParseError::BodyConsumed)));
    }

    #[tokio::test]
    async fn malformed_body_surfaces_on_read() {
        let request = Request::new(header(Method::POST, "/upload"));
        request.complete_body(Err(ParseError::malformed_body("missing terminal boundary")));

        // a second completion is ignored
        request.complete_body(Ok(RequestBody::Raw(Bytes::new())));

        assert!(request.body().await.unwrap_err().is_malformed_body());
    }
}
