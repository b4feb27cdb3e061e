//! Request payload decoding.
//!
//! - [`PayloadDecoder`]: picks the framing from the decoded header's [`PayloadSize`](crate::protocol::PayloadSize)
//! - `LengthDecoder`: consumes exactly `content-length` bytes

mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
