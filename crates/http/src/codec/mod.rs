//! HTTP codec module for encoding and decoding HTTP messages
//!
//! Requests are decoded incrementally with a state machine: the header first,
//! then the payload framed by `content-length`. Response heads are encoded in
//! one shot, the body is written by the [`Response`](crate::protocol::Response) directly.
//!
//! - [`RequestDecoder`]: decodes incoming HTTP requests, tracking [`MessageState`]
//! - [`HeaderDecoder`]: request line and header fields
//! - [`HeaderEncoder`]: response status line and header fields

mod body;
mod header;
mod request_decoder;

pub use header::HeaderDecoder;
pub use header::HeaderEncoder;
pub(crate) use header::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use request_decoder::MessageState;
pub use request_decoder::RequestDecoder;
