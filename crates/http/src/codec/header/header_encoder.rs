//! HTTP header encoder implementation for serializing HTTP response headers
//!
//! The wire layout is fixed:
//!
//! ```text
//! HTTP/<version> <code> <reason>\r\n
//! content-length: <n>\r\n
//! <name>: <value>\r\n        (insertion order)
//! set-cookie: <cookie>\r\n   (one per cookie)
//! \r\n
//! ```
//!
//! A `content-length` entry in the header list is ignored, the framed length always wins.

use crate::protocol::{ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
pub struct HeaderEncoder;

impl Encoder<ResponseHead> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the response head into the provided bytes buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP version is neither HTTP/1.0 nor HTTP/1.1
    fn encode(&mut self, head: ResponseHead, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let version = match head.version {
            Version::HTTP_11 => "1.1",
            Version::HTTP_10 => "1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        write!(
            FastWrite(dst),
            "HTTP/{} {} {}\r\ncontent-length: {}\r\n",
            version,
            head.status.as_str(),
            head.status.canonical_reason().unwrap_or("Unknown"),
            head.content_length
        )?;

        for (header_name, header_value) in head.headers.iter() {
            if header_name == header::CONTENT_LENGTH {
                continue;
            }
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }

        for cookie in &head.cookies {
            dst.put_slice(b"set-cookie: ");
            dst.put_slice(cookie.as_bytes());
            dst.put_slice(b"\r\n");
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// Formatting goes straight into the reserved buffer without an intermediate `String`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseHeaders;
    use http::{HeaderValue, StatusCode};

    fn head(version: Version, status: StatusCode, content_length: u64) -> ResponseHead {
        ResponseHead { version, status, content_length, headers: ResponseHeaders::new(), cookies: Vec::new() }
    }

    #[test]
    fn encodes_in_insertion_order() {
        let mut head = head(Version::HTTP_11, StatusCode::OK, 2);
        head.headers.append(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        head.headers.append(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        head.headers.append(header::CONTENT_LENGTH, HeaderValue::from_static("999"));
        head.cookies.push(HeaderValue::from_static("a=1"));
        head.cookies.push(HeaderValue::from_static("b=2"));

        let mut dst = BytesMut::new();
        HeaderEncoder.encode(head, &mut dst).unwrap();

        assert_eq!(
            &dst[..],
            &b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\ncontent-type: application/json\r\ncache-control: no-store\r\nset-cookie: a=1\r\nset-cookie: b=2\r\n\r\n"[..]
        );
    }

    #[test]
    fn keeps_http_10() {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode(head(Version::HTTP_10, StatusCode::SERVICE_UNAVAILABLE, 0), &mut dst).unwrap();
        assert_eq!(&dst[..], &b"HTTP/1.0 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n"[..]);
    }

    #[test]
    fn rejects_http_2() {
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode(head(Version::HTTP_2, StatusCode::OK, 0), &mut dst).is_err());
    }
}
