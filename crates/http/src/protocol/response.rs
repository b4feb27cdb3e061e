//! HTTP response handling implementation.
//!
//! A [`Response`] is created per request message and shared between the
//! connection engine and the request handler. It frames the status line and
//! headers at most once per [`begin`](Response::begin), then streams body bytes
//! through the connection's [`Output`].
//!
//! A response to a `HEAD` request is [head only](Response::head_only): it frames
//! the same `content-length` but never writes body bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, StatusCode, Version};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::HeaderEncoder;
use crate::connection::Output;
use crate::protocol::SendError;

/// The content-type every response starts with
pub const DEFAULT_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Everything the header encoder needs to frame a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: Version,
    pub status: StatusCode,
    pub content_length: u64,
    pub headers: ResponseHeaders,
    pub cookies: Vec<HeaderValue>,
}

/// Response header fields, emitted in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing every existing value with the same name.
    ///
    /// The header keeps the position of its first occurrence.
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        match self.entries.iter().position(|(n, _)| n == name) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0;
                self.entries.retain(|(n, _)| {
                    if n != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Adds a header, keeping any existing values with the same name.
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    /// Returns the first value for `name`
    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &HeaderName) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The response side of one request message.
#[derive(Debug)]
pub struct Response {
    version: Version,
    headers: Mutex<ResponseHeaders>,
    cookies: Mutex<Vec<HeaderValue>>,
    headers_sent: AtomicBool,
    written: AtomicBool,
    head_only: bool,
    output: Output,
}

impl Response {
    pub fn new(version: Version, output: Output) -> Self {
        let mut headers = ResponseHeaders::new();
        headers.insert(http::header::CONTENT_TYPE, DEFAULT_CONTENT_TYPE);

        Self {
            version,
            headers: Mutex::new(headers),
            cookies: Mutex::new(Vec::new()),
            headers_sent: AtomicBool::new(false),
            written: AtomicBool::new(false),
            head_only: false,
            output,
        }
    }

    /// Drops body bytes when `head_only` is set, as a `HEAD` response must.
    #[must_use]
    pub fn head_only(mut self, head_only: bool) -> Self {
        self.head_only = head_only;
        self
    }

    #[inline]
    pub fn is_head_only(&self) -> bool {
        self.head_only
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Locks the header list for reading or modification.
    pub fn headers(&self) -> MutexGuard<'_, ResponseHeaders> {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers().insert(name, value);
    }

    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers().append(name, value);
    }

    /// Queues a `set-cookie` line, written after the regular headers.
    pub fn add_cookie(&self, cookie: HeaderValue) {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner).push(cookie);
    }

    /// Whether the status line and headers went out and no `send` has completed since.
    #[inline]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent.load(Ordering::Acquire)
    }

    /// Whether any byte of this response reached the output.
    #[inline]
    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::Acquire)
    }

    /// Writes the status line, `content-length`, the headers and the cookies.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::HeadersAlreadySent`] when headers were already framed.
    pub async fn begin(&self, status: StatusCode, content_length: u64) -> Result<(), SendError> {
        if self.headers_sent.swap(true, Ordering::AcqRel) {
            return Err(SendError::HeadersAlreadySent);
        }

        let head = ResponseHead {
            version: self.version,
            status,
            content_length,
            headers: self.headers().clone(),
            cookies: self.cookies.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        };

        let mut buffer = BytesMut::new();
        HeaderEncoder.encode(head, &mut buffer)?;

        trace!(status = status.as_u16(), content_length, "writing response head");
        self.written.store(true, Ordering::Release);
        self.output.write(&buffer).await?;
        Ok(())
    }

    /// Writes body bytes after [`begin`](Self::begin).
    ///
    /// A head only response discards them.
    pub async fn write(&self, data: &[u8]) -> Result<(), SendError> {
        self.written.store(true, Ordering::Release);
        if self.head_only {
            trace!(len = data.len(), "head only response, body bytes dropped");
            return Ok(());
        }
        Ok(self.output.write(data).await?)
    }

    /// Frames and writes a complete response, then flushes it.
    ///
    /// Once the body went out the "headers sent" flag is cleared again.
    pub async fn send(&self, body: impl Into<Bytes>, status: StatusCode) -> Result<(), SendError> {
        let body = body.into();
        self.begin(status, body.len() as u64).await?;
        self.write(&body).await?;
        self.output.flush().await?;
        self.headers_sent.store(false, Ordering::Release);
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), SendError> {
        Ok(self.output.flush().await?)
    }
}
