use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use mime::Mime;
use serde::de::DeserializeOwned;
use tern_http::protocol::body::{FormField, RequestBody};
use tern_http::protocol::{Request, Response};
use tracing::debug;

use crate::error::WebError;
use crate::router::ParamValue;

/// Converted path parameters, in pattern order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    params: Vec<(String, ParamValue)>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { params: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, name: String, value: ParamValue) {
        self.params.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Query string pairs. Repeated keys keep every value, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses an `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Result<Self, WebError> {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query)?;
        Ok(Self { pairs })
    }

    /// The first value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Everything a request handler gets to see about its request.
///
/// Cloning is cheap, all parts are shared.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Arc<Request>,
    response: Arc<Response>,
    path: Arc<str>,
    path_params: Arc<PathParams>,
    query: Arc<QueryParams>,
}

impl RequestContext {
    pub fn new(request: Arc<Request>, response: Arc<Response>, path: impl Into<Arc<str>>, path_params: PathParams, query: QueryParams) -> Self {
        Self { request, response, path: path.into(), path_params: Arc::new(path_params), query: Arc::new(query) }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// The response, for handlers that write it themselves.
    pub fn response(&self) -> &Arc<Response> {
        &self.response
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// The percent-decoded path the router matched against
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Looks `name` up in the path parameters, then in the query.
    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.path_params
            .get(name)
            .cloned()
            .or_else(|| self.query.get(name).map(|value| ParamValue::Str(value.to_string())))
    }

    /// The value of cookie `name` from the `cookie` headers
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers()
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Waits for the finalized body. The body can be taken once.
    pub async fn body(&self) -> Result<RequestBody, WebError> {
        Ok(self.request.body().await?)
    }

    /// Waits for the body and returns it as bytes.
    pub async fn bytes(&self) -> Result<Bytes, WebError> {
        match self.body().await? {
            RequestBody::Raw(bytes) => Ok(bytes),
            RequestBody::FormData(_) => Err(WebError::unsupported_content_type("a non multipart body", Some(mime::MULTIPART_FORM_DATA.as_ref()))),
        }
    }

    /// Waits for a `multipart/form-data` body and returns its fields.
    pub async fn form(&self) -> Result<Vec<FormField>, WebError> {
        self.expect_content_type(&mime::MULTIPART_FORM_DATA)?;
        match self.body().await? {
            RequestBody::FormData(fields) => Ok(fields),
            RequestBody::Raw(_) => Err(WebError::malformed_body("multipart body without boundary")),
        }
    }

    /// Waits for an `application/json` body and deserializes it.
    ///
    /// The content type is checked before waiting for the body. A charset other
    /// than utf-8 is ignored and the body decoded as utf-8.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        let content_type = self.expect_content_type(&mime::APPLICATION_JSON)?;
        if let Some(charset) = content_type.get_param(mime::CHARSET).filter(|charset| *charset != mime::UTF_8) {
            debug!(%charset, "unsupported json charset, decoding as utf-8");
        }

        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Waits for an `application/x-www-form-urlencoded` body and deserializes it.
    pub async fn urlencoded<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        self.expect_content_type(&mime::APPLICATION_WWW_FORM_URLENCODED)?;
        let bytes = self.bytes().await?;
        Ok(serde_urlencoded::from_bytes(&bytes)?)
    }

    /// Deserializes the raw query string.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        Ok(serde_urlencoded::from_str(self.uri().query().unwrap_or_default())?)
    }

    fn expect_content_type(&self, expected: &Mime) -> Result<Mime, WebError> {
        let actual = self.headers().get(http::header::CONTENT_TYPE).and_then(|value| value.to_str().ok());

        match actual.and_then(|value| value.parse::<Mime>().ok()) {
            Some(content_type) if content_type.essence_str() == expected.essence_str() => Ok(content_type),
            _ => Err(WebError::unsupported_content_type(expected, actual)),
        }
    }
}
