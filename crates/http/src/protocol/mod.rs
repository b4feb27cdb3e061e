//! Core HTTP protocol abstractions.
//!
//! - **Message Handling** ([`message`]): header/payload items produced by the decoder
//!   - [`Message`], [`PayloadItem`], [`PayloadSize`]
//!
//! - **Request** ([`request`]): [`RequestHeader`] and the in-flight [`Request`]
//!
//! - **Response** ([`response`]): [`Response`] with at-most-once framing, [`ResponseHead`]
//!   and insertion-ordered [`ResponseHeaders`]
//!
//! - **Signals** ([`signal`]): [`ReadySignal`] for headers-ready/body-ready and
//!   [`Gate`] for read/write backpressure
//!
//! - **Body** ([`body`]): [`BodyParser`](body::BodyParser) variants selected per request
//!
//! - **Error Handling** ([`error`]): [`HttpError`], [`ParseError`], [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHeader;

mod response;
pub use response::DEFAULT_CONTENT_TYPE;
pub use response::Response;
pub use response::ResponseHead;
pub use response::ResponseHeaders;

mod signal;
pub use signal::Gate;
pub use signal::ReadySignal;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
