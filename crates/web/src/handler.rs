use std::future::Future;

use async_trait::async_trait;

use crate::error::WebError;
use crate::request::RequestContext;
use crate::responder::{Reply, Responder};

/// A routed request handler.
///
/// It either writes the response itself through
/// [`RequestContext::response`] or returns a [`Reply`] that the dispatcher sends.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: RequestContext) -> Result<Reply, WebError>;
}

pub type BoxedHandler = Box<dyn RequestHandler>;

#[async_trait]
impl RequestHandler for BoxedHandler {
    async fn invoke(&self, ctx: RequestContext) -> Result<Reply, WebError> {
        (**self).invoke(ctx).await
    }
}

/// Adapts an async fn taking a [`RequestContext`] into a [`RequestHandler`].
#[derive(Debug)]
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

#[async_trait]
impl<F, Fut, R, E> RequestHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Responder,
    E: Into<WebError>,
{
    async fn invoke(&self, ctx: RequestContext) -> Result<Reply, WebError> {
        let responder = (self.f)(ctx).await.map_err(Into::into)?;
        Ok(responder.into_reply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use http::StatusCode;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    #[test]
    fn async_fn_is_handler() {
        async fn index(_ctx: RequestContext) -> Result<&'static str, WebError> {
            Ok("hello")
        }

        async fn forbidden(_ctx: RequestContext) -> Result<(), StatusError> {
            Err(StatusError::new(StatusCode::FORBIDDEN))
        }

        assert_is_handler(&handler_fn(index));
        assert_is_handler(&handler_fn(forbidden));

        let boxed: BoxedHandler = Box::new(handler_fn(index));
        assert_is_handler(&boxed);
    }
}
