//! Drives a small item API through the router without a network listener.
//!
//! ```sh
//! cargo run -p micro-bind-web --example items
//! ```

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use micro_bind::spec::{FieldSpec, ParamSpec, ParamSpecs, RecordSpec, TypeSpec};
use micro_bind::BoundParams;
use micro_bind_web::router::{get, post, put};
use micro_bind_web::{ApiError, Json, ResponseModel, Router, handler_fn};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct ItemQuery {
    item_id: i64,
    q: Option<String>,
    short: bool,
}

async fn read_item(params: BoundParams) -> Result<Json<serde_json::Value>, ApiError> {
    let query: ItemQuery = params.deserialize().map_err(|e| ApiError::http(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    if query.item_id == 404 {
        return Err(ApiError::http(StatusCode::NOT_FOUND, "Item not found"));
    }
    let mut item = json!({"item_id": query.item_id});
    if let Some(q) = query.q {
        item["q"] = json!(q);
    }
    if !query.short {
        item["description"] = json!("This is an amazing item that has a long description");
    }
    Ok(Json(item))
}

async fn update_item(params: BoundParams) -> Json<serde_json::Value> {
    Json(params.to_json())
}

async fn create_user(params: BoundParams) -> Json<serde_json::Value> {
    Json(params.get("user").map_or(serde_json::Value::Null, micro_bind::Value::to_json))
}

fn router() -> Result<Router, Box<dyn Error>> {
    let item = RecordSpec::builder("Item")
        .field(FieldSpec::new("name", TypeSpec::Str))
        .field(FieldSpec::new("description", TypeSpec::Str).optional().max_length(300))
        .field(FieldSpec::new("price", TypeSpec::Float).gt(0))
        .field(FieldSpec::new("tax", TypeSpec::Float).optional())
        .build()?;

    let user_base = RecordSpec::builder("UserBase")
        .field(FieldSpec::new("username", TypeSpec::Str))
        .field(FieldSpec::new("email", TypeSpec::Email))
        .field(FieldSpec::new("full_name", TypeSpec::Str).optional())
        .build()?;
    let user_in = RecordSpec::builder("UserIn").extends(&user_base).field(FieldSpec::new("password", TypeSpec::Str)).build()?;

    let router = Router::builder()
        .route(
            "/items/{item_id}",
            get(handler_fn(read_item)).params(ParamSpecs::new([
                ParamSpec::path("item_id", TypeSpec::Int).ge(1).le(1000),
                ParamSpec::query("q", TypeSpec::Str).optional().max_length(50),
                ParamSpec::query("short", TypeSpec::Bool).default(false),
            ])?),
        )
        .route(
            "/items/{item_id}",
            put(handler_fn(update_item)).params(ParamSpecs::new([
                ParamSpec::path("item_id", TypeSpec::Int),
                ParamSpec::body("item", TypeSpec::record(&item)).embed(),
                ParamSpec::body("importance", TypeSpec::Int).gt(0),
            ])?),
        )
        .route(
            "/users",
            post(handler_fn(create_user))
                .params(ParamSpecs::new([ParamSpec::body("user", TypeSpec::record(&user_in))])?)
                .response_model(ResponseModel::new(TypeSpec::record(&user_base)).status(StatusCode::CREATED)),
        )
        .build()?;
    Ok(router)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Result<(), Box<dyn Error>> {
    let mut builder = Request::builder().method(method.clone()).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Full::new(Bytes::from(json.to_string()))
        }
        None => Full::default(),
    };
    let response = router.handle(builder.body(body)?).await;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    info!(%method, uri, %status, "response: {}", String::from_utf8_lossy(&bytes));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let router = router()?;

    send(&router, Method::GET, "/items/5?q=somequery&short=on", None).await?;
    send(&router, Method::GET, "/items/404", None).await?;
    send(&router, Method::GET, "/items/foo?q=a-query-string-that-is-much-longer-than-fifty-characters", None).await?;
    send(
        &router,
        Method::PUT,
        "/items/5",
        Some(json!({"item": {"name": "Foo", "price": 42.0}, "importance": 5})),
    )
    .await?;
    send(&router, Method::PUT, "/items/5", Some(json!({"name": "Foo", "price": -1}))).await?;
    send(
        &router,
        Method::POST,
        "/users",
        Some(json!({"username": "john", "password": "secret", "email": "john@example.com"})),
    )
    .await?;
    send(&router, Method::DELETE, "/users", None).await?;
    Ok(())
}
