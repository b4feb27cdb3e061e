use tern_http::protocol::body::FormField;
use tern_web::router::post;
use tern_web::{handler_fn, RequestContext, Router, Server, WebError};

/// curl -F title=notes -F file=@Cargo.toml localhost:3000/upload
async fn upload(ctx: RequestContext) -> Result<String, WebError> {
    let mut summary = Vec::new();

    for field in ctx.form().await? {
        match field {
            FormField::Inline(value) => {
                summary.push(format!("{} = {}", value.name, String::from_utf8_lossy(&value.content)));
            }
            FormField::File(mut file) => {
                let content = file.read_to_vec().map_err(WebError::internal)?;
                summary.push(format!("{}: {} ({} bytes, {} lines)", file.name, file.filename, file.size(), content.split(|b| *b == b'\n').count()));
            }
        }
    }

    Ok(summary.join("\n"))
}

#[tokio::main]
async fn main() {
    let router = Router::builder().route("/upload", post(handler_fn(upload))).build().unwrap();
    Server::builder().router(router).address("127.0.0.1:3000").build().unwrap().start().await;
}
