use serde::{Deserialize, Serialize};
use tern_web::router::post;
use tern_web::{handler_fn, Json, RequestContext, Router, Server, WebError};

#[derive(Debug, Deserialize)]
struct Order {
    item: String,
    quantity: u32,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct Invoice {
    item: String,
    total: f64,
}

/// curl -X POST -H 'content-type: application/json' -d '{"item":"tea","quantity":3,"unit_price":2.5}' localhost:3000/invoice
async fn invoice(ctx: RequestContext) -> Result<Json<Invoice>, WebError> {
    let order: Order = ctx.json().await?;
    Ok(Json(Invoice { total: f64::from(order.quantity) * order.unit_price, item: order.item }))
}

#[tokio::main]
async fn main() {
    let router = Router::builder().route("/invoice", post(handler_fn(invoice))).build().unwrap();
    Server::builder().router(router).address("127.0.0.1:3000").build().unwrap().start().await;
}
