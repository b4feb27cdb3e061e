use std::sync::Arc;

use http::HeaderValue;
use tern_web::router::get;
use tern_web::session::{MemorySessionStorage, Session, SessionStorage};
use tern_web::{handler_fn, RequestContext, Router, Server, WebError};

const COOKIE_NAME: &str = "sid";

async fn visits(ctx: RequestContext, storage: Arc<dyn SessionStorage>) -> Result<String, WebError> {
    let session = Session::open(storage, ctx.cookie(COOKIE_NAME)).await?;

    let count = session
        .write(|data| {
            let count = data.get("visits").and_then(|value| value.as_u64()).unwrap_or(0) + 1;
            data.insert("visits".to_string(), count.into());
            count
        })
        .await?;

    let cookie = HeaderValue::try_from(format!("{COOKIE_NAME}={}; Path=/; HttpOnly", session.id())).map_err(WebError::internal)?;
    ctx.response().add_cookie(cookie);

    Ok(format!("visit number {count}"))
}

#[tokio::main]
async fn main() {
    let storage: Arc<dyn SessionStorage> = Arc::new(MemorySessionStorage::new());

    let handler = handler_fn(move |ctx| visits(ctx, storage.clone()));
    let router = Router::builder().route("/", get(handler)).build().unwrap();

    Server::builder().router(router).address("127.0.0.1:3000").build().unwrap().start().await;
}
