//! Decoder for request bodies framed by a `content-length` header.

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Hands out body bytes until exactly `remaining` bytes have been consumed.
///
/// Bytes past the announced length are left in the buffer: they belong to the
/// next message on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Number of body bytes still expected
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_content_length() {
        let mut buffer = BytesMut::from(&b"1012345678GET / HTTP/1.1\r\n\r\n"[..]);

        let mut decoder = LengthDecoder::new(10);
        let payload = decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(payload.as_bytes().unwrap().as_ref(), b"1012345678");
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n\r\n");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn partial_chunks() {
        let mut decoder = LengthDecoder::new(6);

        let mut buffer = BytesMut::from(&b"abc"[..]);
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk("abc".into())));
        assert_eq!(decoder.remaining(), 3);

        // waiting for the rest
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"def");
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk("def".into())));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }
}
