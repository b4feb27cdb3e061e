//! The central error chain.
//!
//! Errors returned by request handlers travel through a list of
//! [`ErrorHandler`]s, most recently registered first, until one of them claims
//! the error. [`DefaultErrorHandler`] always sits at the end and writes the
//! error's [`StatusError`](crate::StatusError) form if nothing has been sent yet.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tern_http::protocol::Response;
use tracing::{error, warn};

use crate::error::WebError;

/// Whether an error handler took care of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Handled,
    Unhandled,
}

#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(&self, error: &WebError, response: &Response) -> Handling;
}

/// Writes the structured error unless the response already went out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle(&self, error: &WebError, response: &Response) -> Handling {
        if response.is_written() {
            return Handling::Unhandled;
        }

        let status_error = error.status_error();
        if status_error.code.is_server_error() {
            error!(cause = %error, status = status_error.code.as_u16(), "request failed");
        } else {
            warn!(cause = %error, status = status_error.code.as_u16(), "request rejected");
        }

        for (name, value) in status_error.headers {
            response.insert_header(name, value);
        }
        match response.send(status_error.content, status_error.code).await {
            Ok(()) => Handling::Handled,
            Err(e) => {
                warn!(cause = %e, "can't send error response");
                Handling::Unhandled
            }
        }
    }
}

/// Error handlers in the order they are asked.
#[derive(Clone)]
pub struct ErrorChain {
    handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl ErrorChain {
    /// A chain holding only the [`DefaultErrorHandler`].
    pub fn new() -> Self {
        Self { handlers: vec![Arc::new(DefaultErrorHandler)] }
    }

    /// Registers `handler` in front of every handler registered before.
    pub fn push(&mut self, handler: impl ErrorHandler + 'static) {
        self.handlers.insert(0, Arc::new(handler));
    }

    pub async fn handle(&self, error: &WebError, response: &Response) -> Handling {
        for handler in &self.handlers {
            if handler.handle(error, response).await == Handling::Handled {
                return Handling::Handled;
            }
        }
        Handling::Unhandled
    }
}

impl fmt::Debug for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorChain").field("handlers", &self.handlers.len()).finish()
    }
}

impl Default for ErrorChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use http::{HeaderValue, StatusCode, Version};
    use std::sync::Mutex;
    use tern_http::connection::Output;
    use tern_http::protocol::Gate;
    use tokio::io::AsyncReadExt;

    struct Recording {
        name: &'static str,
        claims: bool,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ErrorHandler for Recording {
        async fn handle(&self, _error: &WebError, _response: &Response) -> Handling {
            self.seen.lock().unwrap().push(self.name);
            if self.claims { Handling::Handled } else { Handling::Unhandled }
        }
    }

    #[tokio::test]
    async fn most_recent_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = ErrorChain::new();
        chain.push(Recording { name: "first", claims: true, seen: seen.clone() });
        chain.push(Recording { name: "second", claims: false, seen: seen.clone() });

        let response = Response::new(Version::HTTP_11, Output::sink());
        let handling = chain.handle(&WebError::malformed_body("x"), &response).await;

        assert_eq!(handling, Handling::Handled);
        assert_eq!(*seen.lock().unwrap(), vec!["second", "first"]);
        assert!(!response.is_written());
    }

    #[tokio::test]
    async fn default_sends_redirect() {
        let (mut client, server) = tokio::io::duplex(1024);
        let response = Response::new(Version::HTTP_11, Output::new(server, Gate::new()));

        let error = WebError::from(StatusError::redirect(HeaderValue::from_static("/login"), StatusCode::FOUND));
        assert_eq!(ErrorChain::new().handle(&error, &response).await, Handling::Handled);
        drop(response);

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(
            received,
            "HTTP/1.1 302 Found\r\ncontent-length: 5\r\ncontent-type: text/plain; charset=utf-8\r\nlocation: /login\r\n\r\nFound"
        );
    }

    #[tokio::test]
    async fn default_gives_up_after_the_response_started() {
        let response = Response::new(Version::HTTP_11, Output::sink());
        response.begin(StatusCode::OK, 10).await.unwrap();

        assert_eq!(ErrorChain::new().handle(&WebError::internal("late"), &response).await, Handling::Unhandled);
    }
}
