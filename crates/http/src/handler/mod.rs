//! Request handler abstraction for the connection engine.
//!
//! The engine spawns one [`Handler::call`] per request as soon as the header is
//! decoded. The handler writes through the shared [`Response`] and may await
//! [`Request::body`] to suspend until the body is complete.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{Request, Response};

pub type HandlerError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Arc<Request>, response: Arc<Response>) -> Result<(), HandlerError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Arc<Request>, Arc<Response>) -> Fut + Send + Sync,
    Err: Into<HandlerError>,
    Fut: Future<Output = Result<(), Err>> + Send,
{
    async fn call(&self, request: Arc<Request>, response: Arc<Response>) -> Result<(), HandlerError> {
        (self.f)(request, response).await.map_err(Into::into)
    }
}

pub fn make_handler<F, Err, Ret>(f: F) -> HandlerFn<F>
where
    Err: Into<HandlerError>,
    Ret: Future<Output = Result<(), Err>>,
    F: Fn(Arc<Request>, Arc<Response>) -> Ret,
{
    HandlerFn { f }
}
