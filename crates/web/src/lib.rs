//! Routing, dispatch and sessions on top of [`tern_http`].
//!
//! Handlers are async fns taking a [`RequestContext`]. They are registered on a
//! [`Router`] under patterns with typed placeholders and served by a [`Server`]:
//!
//! ```no_run
//! use tern_web::router::get;
//! use tern_web::{handler_fn, RequestContext, Router, Server, WebError};
//!
//! async fn hello(ctx: RequestContext) -> Result<String, WebError> {
//!     let name = ctx.param("name").map(|name| name.to_string()).unwrap_or_default();
//!     Ok(format!("Hello {name}!"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder().route("/hello/{name:str}", get(handler_fn(hello))).build().unwrap();
//!     let server = Server::builder().router(router).address("127.0.0.1:8080").build().unwrap();
//!     server.start().await;
//! }
//! ```

mod error;
mod error_handler;
mod handler;
mod lifecycle;
mod request;
mod responder;
mod server;

pub mod router;
pub mod session;

pub use error::RouteError;
pub use error::StatusError;
pub use error::WebError;
pub use error_handler::DefaultErrorHandler;
pub use error_handler::ErrorChain;
pub use error_handler::ErrorHandler;
pub use error_handler::Handling;
pub use handler::BoxedHandler;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use lifecycle::Dispatcher;
pub use request::PathParams;
pub use request::QueryParams;
pub use request::RequestContext;
pub use responder::Json;
pub use responder::Reply;
pub use responder::Responder;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
