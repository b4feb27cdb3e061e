//! HTTP connection handling module
//!
//! - [`HttpConnection`]: the per-connection engine. It sniffs the protocol from
//!   the first bytes, decodes HTTP/1 messages, spawns the handler for every
//!   request as soon as its header is complete and settles the response when the
//!   handler finishes or is cancelled.
//! - [`Output`]: the shared, backpressure-gated write half
//! - [`FlowControl`]: pause/resume notifications from the transport
//! - [`ProtocolVariant`]: the protocol chosen for a connection

mod http_connection;
mod output;
mod selector;

pub use http_connection::ConnectionConfig;
pub use http_connection::FlowControl;
pub use http_connection::HttpConnection;
pub use output::Output;
pub use selector::HTTP2_PREFACE;
pub use selector::ProtocolVariant;
