//! Errors that end a request early, and their HTTP rendering.

use crate::responder::{ResponseBody, json_response};
use http::{Method, Response, StatusCode};
use micro_bind::{BindingErrors, FieldError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request validation failed: {0}")]
    Validation(#[from] BindingErrors),

    #[error("{status}: {detail}")]
    Http { status: StatusCode, detail: String },

    #[error("{status}: custom error")]
    Custom { status: StatusCode, body: serde_json::Value },

    #[error("no route for path {path}")]
    NotFound { path: String },

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {reason}")]
    BodyRead { reason: String },

    #[error("response does not match its declared model: {0}")]
    ResponseValidation(BindingErrors),
}

impl ApiError {
    /// An error raised by a handler, rendered as `{"detail": detail}`.
    pub fn http<S: ToString>(status: StatusCode, detail: S) -> Self {
        Self::Http { status, detail: detail.to_string() }
    }

    /// An error with an arbitrary JSON body.
    pub fn custom(status: StatusCode, body: serde_json::Value) -> Self {
        Self::Custom { status, body }
    }

    pub fn body_read<S: ToString>(reason: S) -> Self {
        Self::BodyRead { reason: reason.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Http { status, .. } | Self::Custom { status, .. } => *status,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead { .. } => StatusCode::BAD_REQUEST,
            Self::ResponseValidation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON payload sent to the client.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Validation(errors) => json!({ "detail": errors.iter().map(field_error_json).collect::<Vec<_>>() }),
            Self::Http { detail, .. } => json!({ "detail": detail }),
            Self::Custom { body, .. } => body.clone(),
            Self::NotFound { .. } => json!({ "detail": "Not Found" }),
            Self::MethodNotAllowed { .. } => json!({ "detail": "Method Not Allowed" }),
            Self::PayloadTooLarge { limit } => json!({ "detail": format!("request body exceeds {limit} bytes") }),
            Self::BodyRead { reason } => json!({ "detail": reason }),
            Self::ResponseValidation(_) => json!({ "detail": "Internal Server Error" }),
        }
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        if let Self::ResponseValidation(errors) = &self {
            error!(errors = %errors, "handler output rejected by response model");
        }
        json_response(self.status(), &self.body())
    }
}

fn field_error_json(error: &FieldError) -> serde_json::Value {
    let mut entry = json!({
        "type": error.kind().code(),
        "loc": error.location(),
        "msg": error.message(),
    });
    if let (Some(input), Some(map)) = (error.input(), entry.as_object_mut()) {
        map.insert("input".to_string(), input.clone());
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use micro_bind::spec::Source;
    use micro_bind::ErrorKind;

    async fn body_json(response: Response<ResponseBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_lists_every_error() {
        let errors = BindingErrors::from_errors(vec![
            FieldError::missing("item_id", Source::Path),
            FieldError::new("q", Source::Query, ErrorKind::TypeCoercionFailed, "value is not a valid integer").with_input("abc"),
        ])
        .unwrap();

        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            mime::APPLICATION_JSON.as_ref()
        );

        let body = body_json(response).await;
        assert_eq!(body["detail"][0]["loc"], json!(["path", "item_id"]));
        assert_eq!(body["detail"][0]["type"], json!("missing"));
        assert!(body["detail"][0].get("input").is_none());
        assert_eq!(body["detail"][1]["loc"], json!(["query", "q"]));
        assert_eq!(body["detail"][1]["input"], json!("abc"));
    }

    #[tokio::test]
    async fn http_error_carries_detail() {
        let response = ApiError::http(StatusCode::NOT_FOUND, "Item not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"detail": "Item not found"}));
    }

    #[tokio::test]
    async fn custom_error_keeps_its_body() {
        let payload = json!({"message": "Oops! yolo did something. There goes a rainbow..."});
        let response = ApiError::custom(StatusCode::IM_A_TEAPOT, payload.clone()).into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_json(response).await, payload);
    }

    #[test]
    fn statuses() {
        assert_eq!(ApiError::NotFound { path: "/x".into() }.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::MethodNotAllowed { method: Method::PUT }.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::PayloadTooLarge { limit: 10 }.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::body_read("reset").status(), StatusCode::BAD_REQUEST);
    }
}
