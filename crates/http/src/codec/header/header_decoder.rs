//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! This module decodes the request line and header fields from raw bytes into a
//! [`RequestHeader`], and decides how much payload follows.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: configurable, 8KB by default
//! - Maximum announced body size: configurable, 16MB by default
//! - Only HTTP/1.0 and HTTP/1.1
//! - No chunked transfer-encoding: requests announcing one are rejected
//!
//! # Implementation Details
//!
//! The decoder works in multiple stages:
//!
//! 1. Parse raw bytes using `httparse`
//! 2. Record header name/value byte ranges
//! 3. Convert to typed `http::Request` structure
//! 4. Determine the payload size based on headers
//!
//! Recording byte ranges lets the header values share the frozen header bytes
//! instead of being copied one by one.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Default maximum size in bytes allowed for the entire header section
pub(crate) const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Default maximum `content-length` a request may announce
pub(crate) const DEFAULT_MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
    max_headers: usize,
    max_body_bytes: u64,
}

impl HeaderDecoder {
    /// Creates a decoder with the given limits. `max_headers` is capped at 64.
    pub fn new(max_header_bytes: usize, max_headers: usize) -> Self {
        Self { max_header_bytes, max_headers: max_headers.min(MAX_HEADER_NUM), max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Rejects requests announcing a `content-length` above `max_body_bytes`.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES, MAX_HEADER_NUM)
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete header was successfully parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Minimum valid HTTP request needs at least "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request header");
                ensure!(body_offset <= self.max_header_bytes, ParseError::too_large_header(body_offset, self.max_header_bytes));

                let header_count = req.headers.len();
                ensure!(header_count <= self.max_headers, ParseError::too_many_headers(self.max_headers));

                let mut header_index: [HeaderIndex; MAX_HEADER_NUM] = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, req.headers, &mut header_index);

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let mut header_builder = Request::builder()
                    .method(req.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(req.path.ok_or(ParseError::InvalidUri)?)
                    .version(version);

                let headers = header_builder.headers_mut().ok_or(ParseError::InvalidUri)?;
                headers.reserve(header_count);

                let header_bytes = src.split_to(body_offset).freeze();
                for index in &header_index[..header_count] {
                    // header names are lower-cased by HeaderName
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                        .map_err(ParseError::invalid_header)?;

                    headers.append(name, value);
                }

                // an invalid method or uri only surfaces when the builder finishes
                let request = header_builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?;
                let header = RequestHeader::from(request);
                let payload_size = parse_payload(&header, self.max_body_bytes)?;

                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                Ok(None)
            }
        }
    }
}

/// Stores the byte range positions of a header's name and value within the original buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

/// Determines the payload size based on the request headers.
///
/// # Errors
///
/// Returns `ParseError` if:
/// - A Transfer-Encoding header is present (chunked bodies are not supported)
/// - Content-Length value is invalid
/// - Content-Length exceeds `max_body_bytes`
///
/// The body is framed by Content-Length whatever the method.
fn parse_payload(header: &RequestHeader, max_body_bytes: u64) -> Result<PayloadSize, ParseError> {
    if let Some(te_value) = header.headers().get(http::header::TRANSFER_ENCODING) {
        let encoding = String::from_utf8_lossy(te_value.as_bytes());
        return Err(ParseError::unsupported_transfer_encoding(encoding.trim()));
    }

    match header.headers().get(http::header::CONTENT_LENGTH) {
        None => Ok(PayloadSize::new_empty()),
        Some(cl_value) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            ensure!(length <= max_body_bytes, ParseError::too_large_body(length, max_body_bytes));

            Ok(PayloadSize::new_length(length))
        }
    }
}
