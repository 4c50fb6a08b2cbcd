//! Declared response types for routes.
//!
//! A [`ResponseModel`] projects a handler's JSON output through a [`TypeSpec`]: fields the
//! type does not declare are dropped, absent ones take their defaults, and output that does not
//! fit the type turns into a `500` instead of leaking to the client.

use crate::error::ApiError;
use crate::responder::{JSON_CONTENT_TYPE, ResponseBody};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use http_body_util::BodyExt;
use micro_bind::spec::{Source, TypeSpec};
use micro_bind::{BindingErrors, ErrorKind, FieldError, ShapeOptions, shape};

#[derive(Debug, Clone)]
pub struct ResponseModel {
    ty: TypeSpec,
    status: Option<StatusCode>,
    options: ShapeOptions,
}

impl ResponseModel {
    pub fn new(ty: TypeSpec) -> Self {
        Self { ty, status: None, options: ShapeOptions::default() }
    }

    /// Status used when the handler leaves the default `200 OK`.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Omit record fields the handler did not set instead of filling their defaults.
    #[must_use]
    pub fn exclude_unset(mut self, exclude_unset: bool) -> Self {
        self.options.exclude_unset = exclude_unset;
        self
    }

    pub fn ty(&self) -> &TypeSpec {
        &self.ty
    }

    /// Reshapes a successful response. Error responses pass through untouched.
    pub(crate) async fn apply(&self, response: Response<ResponseBody>) -> Response<ResponseBody> {
        if !response.status().is_success() {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let shaped = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(output) => shape(&self.ty, &output, self.options),
            Err(e) => Err(not_json(&e)),
        };
        let shaped = match shaped {
            Ok(shaped) => shaped,
            Err(errors) => return ApiError::ResponseValidation(errors).into_response(),
        };

        if let Some(status) = self.status.filter(|_| parts.status == StatusCode::OK) {
            parts.status = status;
        }
        parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        parts.headers.remove(CONTENT_LENGTH);
        Response::from_parts(parts, ResponseBody::new(Bytes::from(shaped.to_string())))
    }
}

fn not_json(e: &serde_json::Error) -> BindingErrors {
    let error = FieldError::whole(Source::Body, ErrorKind::TypeCoercionFailed, format!("response is not valid JSON: {e}"));
    BindingErrors::from_errors(vec![error]).unwrap_or_else(|| unreachable!("one error was given"))
}
