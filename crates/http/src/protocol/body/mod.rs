//! Request body accumulation and finalization.
//!
//! Body bytes arrive as payload chunks while the request handler may already be
//! running. A [`BodyParser`] accumulates them and, once the message is complete,
//! finalizes them into a [`RequestBody`]:
//!
//! - [`RawBody`]: keeps the bytes as an opaque blob
//! - [`FormDataParser`]: splits a `multipart/form-data` payload into fields and files
//!
//! The connection picks the variant once per message from the `content-type`
//! header through [`BodyStrategy::select`].

mod form_data;
mod raw_body;

pub use form_data::FormDataParser;
pub use form_data::FormField;
pub use form_data::FormFile;
pub use form_data::FormValue;
pub use raw_body::RawBody;

use crate::protocol::ParseError;
use bytes::Bytes;
use http::HeaderMap;
use mime::Mime;
use tracing::debug;

/// Accumulates body bytes and finalizes them once the message is complete.
pub trait BodyParser {
    /// Appends a chunk of body bytes.
    fn feed(&mut self, data: &[u8]);

    /// Finalizes the accumulated bytes. Calling it more than once is a no-op.
    fn process(&mut self) -> Result<(), ParseError>;
}

/// The body parser selected for one request.
#[derive(Debug)]
pub enum BodyStrategy {
    Raw(RawBody),
    FormData(FormDataParser),
}

/// A finalized request body.
#[derive(Debug)]
pub enum RequestBody {
    Raw(Bytes),
    FormData(Vec<FormField>),
}

impl BodyStrategy {
    /// Chooses the parser from the request's `content-type`.
    ///
    /// `multipart/form-data; boundary=X` selects [`FormDataParser`], everything else
    /// (including no content-type at all) selects [`RawBody`].
    pub fn select(headers: &HeaderMap) -> Self {
        let boundary = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Mime>().ok())
            .filter(|mime| mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA)
            .and_then(|mime| mime.get_param(mime::BOUNDARY).map(|b| b.as_str().to_string()));

        match boundary {
            Some(boundary) if !boundary.is_empty() => {
                debug!(boundary = %boundary, "selected multipart body parser");
                BodyStrategy::FormData(FormDataParser::new(boundary))
            }
            _ => BodyStrategy::Raw(RawBody::new()),
        }
    }

    pub fn is_form_data(&self) -> bool {
        matches!(self, BodyStrategy::FormData(_))
    }

    /// Finalizes the parser and hands out the resulting body.
    pub fn finish(mut self) -> Result<RequestBody, ParseError> {
        self.process()?;
        Ok(match self {
            BodyStrategy::Raw(raw) => RequestBody::Raw(raw.into_bytes()),
            BodyStrategy::FormData(form) => RequestBody::FormData(form.into_fields()),
        })
    }
}

impl BodyParser for BodyStrategy {
    fn feed(&mut self, data: &[u8]) {
        match self {
            BodyStrategy::Raw(raw) => raw.feed(data),
            BodyStrategy::FormData(form) => form.feed(data),
        }
    }

    fn process(&mut self) -> Result<(), ParseError> {
        match self {
            BodyStrategy::Raw(raw) => raw.process(),
            BodyStrategy::FormData(form) => form.process(),
        }
    }
}

impl RequestBody {
    /// Returns the raw bytes, or `None` for a multipart body
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            RequestBody::Raw(bytes) => Some(bytes),
            RequestBody::FormData(_) => None,
        }
    }

    /// Returns the multipart fields, or `None` for a raw body
    pub fn into_fields(self) -> Option<Vec<FormField>> {
        match self {
            RequestBody::Raw(_) => None,
            RequestBody::FormData(fields) => Some(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn select_form_data() {
        let headers = headers_with_content_type("multipart/form-data; boundary=----abc123");
        assert!(BodyStrategy::select(&headers).is_form_data());
    }

    #[test]
    fn select_raw_for_other_types() {
        assert!(!BodyStrategy::select(&HeaderMap::new()).is_form_data());
        assert!(!BodyStrategy::select(&headers_with_content_type("application/json")).is_form_data());
        // multipart without a boundary can't be split
        assert!(!BodyStrategy::select(&headers_with_content_type("multipart/form-data")).is_form_data());
    }

    #[test]
    fn raw_body_keeps_every_chunk() {
        let mut strategy = BodyStrategy::select(&HeaderMap::new());
        strategy.feed(b"hello ");
        strategy.feed(b"world");

        let body = strategy.finish().unwrap();
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"hello world"));
    }
}
