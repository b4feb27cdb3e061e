use http::Method;
use tern_web::router::{get, post};
use tern_web::{handler_fn, RequestContext, Router, Server, StatusError, WebError};

async fn hello_world(_ctx: RequestContext) -> Result<&'static str, WebError> {
    Ok("hello world")
}

async fn hello(ctx: RequestContext) -> Result<String, WebError> {
    let name = ctx.param("name").map(|name| name.to_string()).unwrap_or_default();
    let greeting = ctx.query().get("greeting").unwrap_or("hello");
    Ok(format!("{greeting} {name}"))
}

async fn show_user(ctx: RequestContext) -> Result<String, WebError> {
    let id = ctx.param("id").and_then(|id| id.as_i64()).unwrap_or_default();
    Ok(format!("user #{id}"))
}

async fn create_user(ctx: RequestContext) -> Result<(http::StatusCode, String), WebError> {
    let body = ctx.bytes().await?;
    Ok((http::StatusCode::CREATED, format!("created from {} bytes", body.len())))
}

async fn old_home(_ctx: RequestContext) -> Result<(), StatusError> {
    Err(StatusError::redirect(http::HeaderValue::from_static("/"), http::StatusCode::MOVED_PERMANENTLY))
}

#[tokio::main]
async fn main() {
    let users = Router::builder()
        .route("/{id:int}", get(handler_fn(show_user)))
        .route("/", post(handler_fn(create_user)));

    let router = Router::builder()
        .route("/", get(handler_fn(hello_world)))
        .route("/hello/{name}", get(handler_fn(hello)))
        .route("/home", get(handler_fn(old_home)).and(Method::HEAD))
        .nest("/users", users)
        .build()
        .unwrap();

    Server::builder().router(router).address("127.0.0.1:3000").build().unwrap().start().await;
}
