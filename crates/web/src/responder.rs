//! Converts handler results into replies.
//!
//! A handler returns anything that implements [`Responder`]. The dispatcher turns
//! it into a [`Reply`] and frames it on the connection's response.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use tern_http::protocol::{Response, SendError};
use tracing::error;

/// A complete response waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl Reply {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// An empty `200 OK`
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, Bytes::new())
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Copies the headers over and sends status, headers and body at once.
    pub async fn send_to(self, response: &Response) -> Result<(), SendError> {
        for (name, value) in self.headers {
            response.insert_header(name, value);
        }
        response.send(self.body, self.status).await
    }
}

/// Types a handler may return.
pub trait Responder {
    fn into_reply(self) -> Reply;
}

impl Responder for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl Responder for () {
    fn into_reply(self) -> Reply {
        Reply::empty()
    }
}

impl Responder for &'static str {
    fn into_reply(self) -> Reply {
        Bytes::from_static(self.as_bytes()).into_reply()
    }
}

impl Responder for String {
    fn into_reply(self) -> Reply {
        Bytes::from(self).into_reply()
    }
}

impl Responder for Bytes {
    fn into_reply(self) -> Reply {
        Reply::new(StatusCode::OK, self)
    }
}

impl Responder for Vec<u8> {
    fn into_reply(self) -> Reply {
        Reply::new(StatusCode::OK, self).with_header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
    }
}

/// `None` is an empty reply.
impl<T: Responder> Responder for Option<T> {
    fn into_reply(self) -> Reply {
        match self {
            Some(t) => t.into_reply(),
            None => Reply::empty(),
        }
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_reply(self) -> Reply {
        let (status, responder) = self;
        Reply { status, ..responder.into_reply() }
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn into_reply(self) -> Reply {
        let (responder, status) = self;
        (status, responder).into_reply()
    }
}

impl<T: Responder> Responder for Box<T> {
    fn into_reply(self) -> Reply {
        (*self).into_reply()
    }
}

/// Serializes `T` as an `application/json` reply.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> Responder for Json<T> {
    fn into_reply(self) -> Reply {
        match serde_json::to_vec(&self.0) {
            Ok(body) => Reply::new(StatusCode::OK, body)
                .with_header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            Err(e) => {
                error!(cause = %e, "can't serialize json reply");
                Reply::new(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use std::collections::BTreeMap;
    use tern_http::connection::Output;
    use tern_http::protocol::Gate;
    use tokio::io::AsyncReadExt;

    #[test]
    fn plain_values() {
        assert_eq!("hi".into_reply(), Reply::new(StatusCode::OK, "hi"));
        assert_eq!(String::from("hi").into_reply(), Reply::new(StatusCode::OK, "hi"));
        assert_eq!(().into_reply(), Reply::empty());
        assert_eq!(None::<String>.into_reply(), Reply::empty());
    }

    #[test]
    fn status_tuples() {
        assert_eq!((StatusCode::CREATED, "made").into_reply(), Reply::new(StatusCode::CREATED, "made"));
        assert_eq!(("gone", StatusCode::GONE).into_reply(), Reply::new(StatusCode::GONE, "gone"));
    }

    #[test]
    fn json_sets_content_type() {
        let reply = Json(BTreeMap::from([("id", 7)])).into_reply();
        assert_eq!(&reply.body[..], br#"{"id":7}"#);
        assert_eq!(reply.headers, vec![(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))]);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("no"))
        }
    }

    #[test]
    fn json_failure_is_500() {
        assert_eq!(Json(Unserializable).into_reply().status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_to_replaces_content_type() {
        let (mut client, server) = tokio::io::duplex(1024);
        let response = Response::new(http::Version::HTTP_11, Output::new(server, Gate::new()));

        Json(BTreeMap::from([("ok", true)])).into_reply().send_to(&response).await.unwrap();
        drop(response);

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "HTTP/1.1 200 OK\r\ncontent-length: 11\r\ncontent-type: application/json\r\n\r\n{\"ok\":true}");
    }
}
