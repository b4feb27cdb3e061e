//! Protocol selection from the first bytes of a connection.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// The connection preface every HTTP/2 client sends first
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// The protocol a connection speaks, chosen once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    Http1,
    /// Recognised so it can be refused, HTTP/2 framing isn't served
    Http2Preface,
}

impl ProtocolVariant {
    /// Classifies the bytes read so far, `None` while they are still ambiguous.
    pub fn sniff(initial: &[u8]) -> Option<Self> {
        if initial.len() >= HTTP2_PREFACE.len() {
            return Some(if initial.starts_with(HTTP2_PREFACE) { ProtocolVariant::Http2Preface } else { ProtocolVariant::Http1 });
        }

        if HTTP2_PREFACE.starts_with(initial) { None } else { Some(ProtocolVariant::Http1) }
    }
}

/// Reads until the protocol is known.
///
/// Returns the variant with every byte consumed while sniffing, or `None` if the
/// peer closed the connection before sending anything.
pub(crate) async fn select_protocol<R>(reader: &mut R) -> io::Result<Option<(ProtocolVariant, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
{
    let mut initial = Vec::with_capacity(HTTP2_PREFACE.len());
    loop {
        let mut chunk = [0u8; 64];
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            // a peer hanging up mid-preface is treated as HTTP/1, the decoder reports the truncation
            return Ok((!initial.is_empty()).then_some((ProtocolVariant::Http1, initial)));
        }

        initial.extend_from_slice(&chunk[..n]);
        if let Some(variant) = ProtocolVariant::sniff(&initial) {
            debug!(protocol = ?variant, "selected connection protocol");
            return Ok(Some((variant, initial)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_http1() {
        assert_eq!(ProtocolVariant::sniff(b"GET / HTTP/1.1\r\n"), Some(ProtocolVariant::Http1));
        assert_eq!(ProtocolVariant::sniff(b"POST"), Some(ProtocolVariant::Http1));
        assert_eq!(ProtocolVariant::sniff(b"PUT"), Some(ProtocolVariant::Http1));
    }

    #[test]
    fn sniff_http2() {
        assert_eq!(ProtocolVariant::sniff(b"PRI * HT"), None);
        assert_eq!(ProtocolVariant::sniff(HTTP2_PREFACE), Some(ProtocolVariant::Http2Preface));
    }

    #[tokio::test]
    async fn select_keeps_consumed_bytes() {
        let mut reader: &[u8] = b"GET / HTTP/1.1\r\n\r\n";
        let (variant, initial) = select_protocol(&mut reader).await.unwrap().unwrap();
        assert_eq!(variant, ProtocolVariant::Http1);
        assert_eq!(initial, b"GET / HTTP/1.1\r\n\r\n");
    }
}
