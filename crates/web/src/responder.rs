//! Conversion of handler results into HTTP responses.
//!
//! The [`Responder`] trait decides how a handler's return value turns into a response. It is
//! implemented for the usual suspects: `Result`, `Option`, strings, status tuples, pre-built
//! responses, [`Json`] payloads and [`ApiError`].

use crate::RequestContext;
use crate::error::ApiError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;

/// Body type of every response produced by this crate.
pub type ResponseBody = Full<Bytes>;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub trait Responder {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody>;
}

/// Handlers may return `Result`; both arms render through their own `Responder`.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => e.response_to(req),
        }
    }
}

/// `None` becomes an empty `200 OK`.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(req),
            None => Response::new(ResponseBody::default()),
        }
    }
}

/// A ready-made response is passed through with its body converted.
impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

/// Renders `T`, then overrides the status code.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(req);
        *response.status_mut() = status;
        response
    }
}

/// Same as `(StatusCode, T)` with the status last.
impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let (responder, status) = self;
        (status, responder).response_to(req)
    }
}

/// Renders the boxed responder.
impl<T: Responder> Responder for Box<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        (*self).response_to(req)
    }
}

/// An empty `200 OK`.
impl Responder for () {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        Response::new(ResponseBody::default())
    }
}

/// A `text/plain` body without copying.
impl Responder for &'static str {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        text_response(Bytes::from_static(self.as_bytes()))
    }
}

/// A `text/plain` body.
impl Responder for String {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        text_response(Bytes::from(self))
    }
}

/// A `200 OK` JSON body.
impl Responder for serde_json::Value {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        json_response(StatusCode::OK, &self)
    }
}

/// Errors render as their status code and JSON detail.
impl Responder for ApiError {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        self.into_response()
    }
}

/// For handlers that cannot fail, e.g. `Result<T, Infallible>`.
impl Responder for Infallible {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        match self {}
    }
}

/// A serializable payload sent as `application/json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => with_content_type(StatusCode::OK, Bytes::from(bytes), JSON_CONTENT_TYPE),
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                let mut response = Response::new(ResponseBody::default());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

pub(crate) fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<ResponseBody> {
    with_content_type(status, Bytes::from(value.to_string()), JSON_CONTENT_TYPE)
}

fn text_response(body: Bytes) -> Response<ResponseBody> {
    with_content_type(StatusCode::OK, body, TEXT_CONTENT_TYPE)
}

fn with_content_type(status: StatusCode, body: Bytes, content_type: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PathParams;
    use http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn respond<R: Responder>(responder: R) -> (StatusCode, Option<String>, Bytes) {
        let parts = Request::builder().body(()).unwrap().into_parts().0;
        let params = PathParams::empty();
        let req = RequestContext::new(&parts, &params);
        let response = responder.response_to(&req);
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).map(|v| v.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn strings_are_plain_text() {
        let (status, content_type, body) = respond("hello world").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
        assert_eq!(body, "hello world");

        let (_, _, body) = respond(String::from("owned")).await;
        assert_eq!(body, "owned");
    }

    #[tokio::test]
    async fn json_payload() {
        #[derive(Serialize)]
        struct Item {
            name: &'static str,
            price: f64,
        }

        let (status, content_type, body) = respond(Json(Item { name: "Foo", price: 42.0 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap(), json!({"name": "Foo", "price": 42.0}));
    }

    #[tokio::test]
    async fn status_tuples_override_status() {
        let (status, _, _) = respond((StatusCode::CREATED, "created")).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, _) = respond((Json(json!({})), StatusCode::ACCEPTED)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn results_pick_their_branch() {
        let ok: Result<&'static str, ApiError> = Ok("fine");
        assert_eq!(respond(ok).await.2, "fine");

        let err: Result<&'static str, ApiError> = Err(ApiError::http(StatusCode::NOT_FOUND, "Item not found"));
        let (status, _, body) = respond(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"detail":"Item not found"}"#);
    }

    #[tokio::test]
    async fn empty_responses() {
        let (status, content_type, body) = respond(None::<String>).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.is_none());
        assert!(body.is_empty());
        assert!(respond(()).await.2.is_empty());
    }
}
