//! HTTP request decoder module
//!
//! This module decodes HTTP/1.x requests from a byte stream that doesn't have to
//! line up with message boundaries. Partial input stays in the buffer until the
//! next read completes it.
//!
//! # Components
//!
//! - [`RequestDecoder`]: Main decoder that coordinates header and payload parsing
//! - Header parsing: Uses [`HeaderDecoder`] for parsing request headers
//! - Payload handling: Uses [`PayloadDecoder`] for handling request bodies if any
//!
//! # Example
//!
//! ```no_run
//! use tern_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let header = decoder.decode(&mut buffer);
//! let eof = decoder.decode(&mut buffer);
//! ```

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

/// Where the decoder stands within the current message.
///
/// ```text
/// AwaitRequestLine -> ParsingHeaders -> HeadersComplete -> ParsingBody -> MessageComplete
///        ^                                                                      |
///        +----------------------------------------------------------------------+
/// ```
///
/// `ParsingBody` is skipped for messages without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    AwaitRequestLine,
    ParsingHeaders,
    HeadersComplete,
    ParsingBody,
    MessageComplete,
}

/// A decoder for HTTP requests that handles both headers and payload
///
/// Every message is decoded as one `Message::Header` followed by zero or more
/// `Message::Payload(PayloadItem::Chunk(_))` and exactly one
/// `Message::Payload(PayloadItem::Eof)`.
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    state: MessageState,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_header_decoder(header_decoder: HeaderDecoder) -> Self {
        Self { header_decoder, payload_decoder: None, state: MessageState::AwaitRequestLine }
    }

    #[inline]
    pub fn state(&self) -> MessageState {
        self.state
    }

    fn transition(&mut self, state: MessageState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "message state changed");
            self.state = state;
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::with_header_decoder(HeaderDecoder::default())
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    /// Attempts to decode an HTTP request from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: Successfully decoded request headers
    /// - `Ok(Some(Message::Payload(_)))`: Successfully decoded a payload chunk or the end of the body
    /// - `Ok(None)`: Need more data to proceed
    /// - `Err(_)`: Encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => {
                    self.transition(MessageState::ParsingBody);
                    Some(Message::Payload(item))
                }
                Some(item @ PayloadItem::Eof) => {
                    // no need payload decoder in this request now
                    self.payload_decoder.take();
                    self.transition(MessageState::MessageComplete);
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        if self.state == MessageState::MessageComplete {
            self.transition(MessageState::AwaitRequestLine);
        }

        // parse request
        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                self.transition(MessageState::HeadersComplete);
                Some(Message::Header((header, payload_size)))
            }
            None if src.is_empty() => None,
            None => {
                self.transition(MessageState::ParsingHeaders);
                None
            }
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    fn expect_header(message: Option<Message<(RequestHeader, PayloadSize)>>) -> (RequestHeader, PayloadSize) {
        match message {
            Some(Message::Header(header)) => header,
            _ => panic!("expected a request header"),
        }
    }

    fn expect_payload(message: Option<Message<(RequestHeader, PayloadSize)>>) -> PayloadItem {
        match message {
            Some(Message::Payload(item)) => item,
            _ => panic!("expected a payload item"),
        }
    }

    #[test]
    fn header_split_across_reads() {
        let mut decoder = RequestDecoder::new();
        let mut buffer = BytesMut::new();
        assert_eq!(decoder.state(), MessageState::AwaitRequestLine);

        buffer.extend_from_slice(b"POST /upload HTTP/1.1\r\nContent-");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert_eq!(decoder.state(), MessageState::ParsingHeaders);

        buffer.extend_from_slice(b"Length: 5\r\n\r\nhel");
        let (header, payload_size) = expect_header(decoder.decode(&mut buffer).unwrap());
        assert_eq!(header.uri().path(), "/upload");
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(decoder.state(), MessageState::HeadersComplete);

        assert_eq!(expect_payload(decoder.decode(&mut buffer).unwrap()), PayloadItem::Chunk(Bytes::from_static(b"hel")));
        assert_eq!(decoder.state(), MessageState::ParsingBody);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo");
        assert_eq!(expect_payload(decoder.decode(&mut buffer).unwrap()), PayloadItem::Chunk(Bytes::from_static(b"lo")));
        assert!(expect_payload(decoder.decode(&mut buffer).unwrap()).is_eof());
        assert_eq!(decoder.state(), MessageState::MessageComplete);
    }

    #[test]
    fn two_messages_back_to_back() {
        let str = indoc! {r##"
        GET /first HTTP/1.1
        Host: localhost

        GET /second HTTP/1.1
        Host: localhost

        "##};

        let mut decoder = RequestDecoder::new();
        let mut buffer = BytesMut::from(str);

        let (first, _) = expect_header(decoder.decode(&mut buffer).unwrap());
        assert_eq!(first.uri().path(), "/first");
        assert!(expect_payload(decoder.decode(&mut buffer).unwrap()).is_eof());

        let (second, _) = expect_header(decoder.decode(&mut buffer).unwrap());
        assert_eq!(second.uri().path(), "/second");
        assert!(expect_payload(decoder.decode(&mut buffer).unwrap()).is_eof());

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert_eq!(decoder.state(), MessageState::AwaitRequestLine);
    }
}
