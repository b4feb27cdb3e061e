//! HTTP header processing module for encoding and decoding headers
//!
//! - [`HeaderDecoder`]: decodes the request line and header fields from raw bytes,
//!   enforcing the header size and count limits
//! - [`HeaderEncoder`]: serializes a response head (status line, content-length,
//!   headers, cookies)

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;

pub(crate) use header_decoder::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, MAX_HEADER_NUM};
