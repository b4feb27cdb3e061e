//! The per-connection HTTP/1 message engine of the tern server
//!
//! This crate decodes requests incrementally, dispatches each one to a
//! [`handler::Handler`] as soon as its header is complete, keeps feeding the body
//! to a body parser while the handler runs, and frames the response through a
//! backpressure-gated output.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::StatusCode;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use tern_http::connection::HttpConnection;
//! use tern_http::handler::make_handler;
//! use tern_http::protocol::{Request, Response, SendError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!(cause = %e, "connection closed with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Arc<Request>, response: Arc<Response>) -> Result<(), SendError> {
//!     info!(path = request.uri().path(), "serving request");
//!     response.send("Hello World!\r\n", StatusCode::OK).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the engine, protocol sniffing, output and flow control
//! - [`protocol`]: requests, responses, readiness signals, body parsers and errors
//! - [`codec`]: request decoding and response head encoding
//! - [`handler`]: the handler trait the engine dispatches to
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, an HTTP/2 preface closes the connection
//! - No chunked transfer-encoding on requests
//! - Maximum header size: 8KB by default
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
