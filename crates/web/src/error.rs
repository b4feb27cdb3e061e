//! Errors of the web layer.
//!
//! [`RouteError`] covers route registration and lookup. [`WebError`] is what
//! handlers return; every kind maps to a structured [`StatusError`] through
//! [`WebError::status_error`], which the default error handler writes out.

use std::error::Error;
use std::fmt;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use tern_http::protocol::{ParseError, SendError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route already defined: {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// A value matched the placeholder's regex but its converter rejected it
    #[error("can't convert path parameter {name} from {value:?}: {reason}")]
    ParamConversion { name: String, value: String, reason: String },
}

impl RouteError {
    pub fn invalid_pattern<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn param_conversion<S: ToString>(name: &str, value: &str, reason: S) -> Self {
        Self::ParamConversion { name: name.to_string(), value: value.to_string(), reason: reason.to_string() }
    }
}

/// An error carrying the response it should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub code: StatusCode,
    pub content: Bytes,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl StatusError {
    /// An error whose content is the status' reason phrase.
    pub fn new(code: StatusCode) -> Self {
        let content = Bytes::from_static(code.canonical_reason().unwrap_or("Unknown").as_bytes());
        Self { code, content, headers: Vec::new() }
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// A redirect to `location`, usually with `302 Found`.
    pub fn redirect(location: HeaderValue, code: StatusCode) -> Self {
        Self::new(code).with_header(http::header::LOCATION, location)
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl Error for StatusError {}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("route not found: {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("malformed body: {reason}")]
    MalformedBody { reason: String },

    #[error("unsupported content type {actual:?}, expected {expected}")]
    UnsupportedContentType { expected: String, actual: Option<String> },

    #[error("origin not allowed: {origin}")]
    OriginNotAllowed { origin: String },

    #[error("session not found: {id}")]
    SessionNotFound { id: String },

    #[error("response headers already sent")]
    DoubleHeadersSent,

    #[error("http error: {0}")]
    Status(StatusError),

    #[error("internal error: {source}")]
    Internal { source: Box<dyn Error + Send + Sync> },
}

impl WebError {
    pub fn malformed_body<S: ToString>(reason: S) -> Self {
        Self::MalformedBody { reason: reason.to_string() }
    }

    pub fn unsupported_content_type<S: ToString>(expected: S, actual: Option<&str>) -> Self {
        Self::UnsupportedContentType { expected: expected.to_string(), actual: actual.map(str::to_string) }
    }

    pub fn internal<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Internal { source: e.into() }
    }

    /// The response this error turns into.
    pub fn status_error(&self) -> StatusError {
        match self {
            WebError::RouteNotFound { .. } | WebError::SessionNotFound { .. } => StatusError::new(StatusCode::NOT_FOUND),
            WebError::MalformedBody { .. } | WebError::UnsupportedContentType { .. } => StatusError::new(StatusCode::BAD_REQUEST),
            WebError::OriginNotAllowed { .. } => StatusError::new(StatusCode::FORBIDDEN),
            WebError::DoubleHeadersSent | WebError::Internal { .. } => StatusError::new(StatusCode::INTERNAL_SERVER_ERROR),
            WebError::Status(status_error) => status_error.clone(),
        }
    }
}

impl From<StatusError> for WebError {
    fn from(e: StatusError) -> Self {
        WebError::Status(e)
    }
}

impl From<RouteError> for WebError {
    fn from(e: RouteError) -> Self {
        match e {
            RouteError::RouteNotFound { method, path } => WebError::RouteNotFound { method, path },
            e => WebError::internal(e),
        }
    }
}

impl From<ParseError> for WebError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::MalformedBody { reason } | ParseError::InvalidBody { reason } => WebError::MalformedBody { reason },
            e => WebError::internal(e),
        }
    }
}

impl From<SendError> for WebError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::HeadersAlreadySent => WebError::DoubleHeadersSent,
            e => WebError::internal(e),
        }
    }
}

impl From<serde_json::Error> for WebError {
    fn from(e: serde_json::Error) -> Self {
        WebError::malformed_body(e)
    }
}

impl From<serde_urlencoded::de::Error> for WebError {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        WebError::malformed_body(e)
    }
}
