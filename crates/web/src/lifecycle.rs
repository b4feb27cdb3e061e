//! Per-request dispatch: decode, route, invoke, reply.
//!
//! [`Dispatcher`] is the [`Handler`] the connection engine spawns for every
//! request once its header is complete. The body may still be arriving while
//! the route is resolved and the handler runs.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use percent_encoding::percent_decode_str;
use tern_http::handler::{Handler, HandlerError};
use tern_http::protocol::{Request, Response};
use tracing::{debug, trace};

use crate::error::{StatusError, WebError};
use crate::error_handler::{ErrorChain, Handling};
use crate::handler::{BoxedHandler, RequestHandler};
use crate::request::{QueryParams, RequestContext};
use crate::router::Router;

#[derive(Debug)]
pub struct Dispatcher {
    router: Router<BoxedHandler>,
    error_chain: ErrorChain,
}

impl Dispatcher {
    pub fn new(router: Router<BoxedHandler>, error_chain: ErrorChain) -> Self {
        Self { router, error_chain }
    }

    async fn dispatch(&self, request: &Arc<Request>, response: &Arc<Response>) -> Result<(), WebError> {
        let path = percent_decode_str(request.uri().path())
            .decode_utf8()
            .map_err(|_| StatusError::new(StatusCode::BAD_REQUEST).with_content("path is not valid utf-8"))?
            .into_owned();

        let (handler, path_params) = self.router.find(request.method(), &path)?;
        let query = QueryParams::parse(request.uri().query().unwrap_or_default())?;
        trace!(method = %request.method(), %path, params = path_params.len(), "route resolved");

        let ctx = RequestContext::new(request.clone(), response.clone(), path, path_params, query);
        let reply = handler.invoke(ctx).await?;

        if response.is_written() {
            debug!("handler wrote the response itself, dropping its reply");
            return Ok(());
        }
        reply.send_to(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for Dispatcher {
    async fn call(&self, request: Arc<Request>, response: Arc<Response>) -> Result<(), HandlerError> {
        request.headers_ready().wait().await;

        let Err(error) = self.dispatch(&request, &response).await else {
            return Ok(());
        };

        match self.error_chain.handle(&error, &response).await {
            Handling::Handled => Ok(()),
            Handling::Unhandled => Err(Box::new(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::ErrorHandler;
    use crate::handler::handler_fn;
    use crate::responder::Json;
    use crate::router::{get, post, ParamValue};
    use http::HeaderValue;
    use indoc::indoc;
    use serde::{Deserialize, Serialize};
    use tern_http::connection::HttpConnection;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn exchange(dispatcher: Dispatcher, request: &[u8]) -> String {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let handle = tokio::spawn(HttpConnection::new(reader, writer).process(Arc::new(dispatcher)));

        client.write_all(request).await.unwrap();
        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        let _ = handle.await.unwrap();
        received
    }

    async fn number_id(ctx: RequestContext) -> Result<String, WebError> {
        let number = ctx.param("number").and_then(|value| value.as_i64()).unwrap_or_default();
        let id = ctx.param("id").and_then(|value| value.as_i64()).unwrap_or_default();
        Ok(format!("number-id {number} {id}"))
    }

    async fn exact(_ctx: RequestContext) -> Result<&'static str, WebError> {
        Ok("exact")
    }

    async fn greet(ctx: RequestContext) -> Result<String, WebError> {
        let name = ctx.param("name").map(|value| value.to_string()).unwrap_or_default();
        let greeting = ctx.query().get("greeting").unwrap_or("hello").to_string();
        Ok(format!("{greeting} {name}"))
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        name: String,
        count: u32,
    }

    async fn double(ctx: RequestContext) -> Result<Json<Item>, WebError> {
        let item: Item = ctx.json().await?;
        Ok(Json(Item { count: item.count * 2, ..item }))
    }

    async fn login_required(_ctx: RequestContext) -> Result<(), StatusError> {
        Err(StatusError::redirect(HeaderValue::from_static("/login"), StatusCode::FOUND))
    }

    async fn streamed(ctx: RequestContext) -> Result<&'static str, WebError> {
        let response = ctx.response();
        response.begin(StatusCode::OK, 6).await?;
        response.write(b"stream").await?;
        response.flush().await?;
        Ok("ignored")
    }

    fn dispatcher() -> Dispatcher {
        let router = Router::builder()
            .route("/test/{number:int}-{id:int}", get(handler_fn(number_id)))
            .route("/test/exact", get(handler_fn(exact)))
            .route("/hello/{name}", get(handler_fn(greet)))
            .route("/double", post(handler_fn(double)))
            .route("/private", get(handler_fn(login_required)))
            .route("/stream", get(handler_fn(streamed)))
            .build()
            .unwrap();
        Dispatcher::new(router, ErrorChain::new())
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_default()
    }

    #[tokio::test]
    async fn routes_with_converted_params() {
        let response = exchange(dispatcher(), b"GET /test/24-42 HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body(&response), "number-id 24 42");

        let response = exchange(dispatcher(), b"GET /test/exact HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert_eq!(body(&response), "exact");
    }

    #[tokio::test]
    async fn decodes_path_and_query() {
        let response = exchange(dispatcher(), b"GET /hello/J%C3%B6rg?greeting=hi%20there HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert_eq!(body(&response), "hi there J\u{f6}rg");
    }

    #[tokio::test]
    async fn invalid_utf8_path_is_400() {
        let response = exchange(dispatcher(), b"GET /hello/%FF HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(body(&response), "path is not valid utf-8");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = exchange(dispatcher(), b"GET /nowhere HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let response = exchange(dispatcher(), b"DELETE /test/exact HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let request = indoc! {b"
            POST /double HTTP/1.1\r
            content-type: application/json; charset=utf-8\r
            content-length: 25\r
            connection: close\r
            \r
            {\"name\":\"bolt\",\"count\":4}"};
        let response = exchange(dispatcher(), request).await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-type: application/json\r\n"));
        assert_eq!(body(&response), r#"{"name":"bolt","count":8}"#);
    }

    #[tokio::test]
    async fn json_without_content_type_is_400() {
        let request = b"POST /double HTTP/1.1\r\ncontent-length: 25\r\nconnection: close\r\n\r\n{\"name\":\"bolt\",\"count\":4}";
        let response = exchange(dispatcher(), request).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn redirect() {
        let response = exchange(dispatcher(), b"GET /private HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(response.contains("location: /login\r\n"));
    }

    #[tokio::test]
    async fn handler_written_response_wins() {
        let response = exchange(dispatcher(), b"GET /stream HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert_eq!(body(&response), "stream");
    }

    #[tokio::test]
    async fn head_shares_the_get_handler_without_body() {
        let router = Router::builder().route("/page", get(handler_fn(exact)).and(http::Method::HEAD)).build().unwrap();
        let response =
            exchange(Dispatcher::new(router, ErrorChain::new()), b"HEAD /page HTTP/1.1\r\nconnection: close\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\ncontent-length: 5\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    struct NotFoundPage;

    #[async_trait]
    impl ErrorHandler for NotFoundPage {
        async fn handle(&self, error: &WebError, response: &Response) -> Handling {
            if !matches!(error, WebError::RouteNotFound { .. }) {
                return Handling::Unhandled;
            }
            match response.send("custom 404", StatusCode::NOT_FOUND).await {
                Ok(()) => Handling::Handled,
                Err(_) => Handling::Unhandled,
            }
        }
    }

    #[tokio::test]
    async fn custom_error_handler_runs_first() {
        let router = Router::builder().route("/", get(handler_fn(exact))).build().unwrap();
        let mut error_chain = ErrorChain::new();
        error_chain.push(NotFoundPage);

        let response = exchange(Dispatcher::new(router, error_chain), b"GET /missing HTTP/1.1\r\nconnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(body(&response), "custom 404");
    }

    #[test]
    fn params_are_typed() {
        let router = dispatcher().router;
        let (_, params) = router.find(&http::Method::GET, "/test/1-2").unwrap();
        assert_eq!(params.get("id"), Some(&ParamValue::Int(2)));
    }
}
