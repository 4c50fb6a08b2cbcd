//! Builds a [`RequestDescriptor`] from an `http` request.

use crate::error::ApiError;
use crate::request::PathParams;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use micro_bind::RequestDescriptor;
use mime::Mime;
use std::error::Error;
use tracing::{trace, warn};

type BoxError = Box<dyn Error + Send + Sync>;

/// Collects the body (at most `limit` bytes) and gathers path parameters, query pairs, headers
/// and cookies into a descriptor.
///
/// # Errors
/// `PayloadTooLarge` when the body is longer than `limit`, `BodyRead` when the body stream
/// fails.
pub async fn collect<B>(parts: &Parts, body: B, path_params: &PathParams<'_, '_>, limit: usize) -> Result<RequestDescriptor, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => return Err(ApiError::PayloadTooLarge { limit }),
        Err(e) => return Err(ApiError::body_read(e)),
    };
    trace!(path = parts.uri.path(), body_size = bytes.len(), "collected request body");

    let mut builder = RequestDescriptor::builder();
    for (name, value) in path_params.to_pairs() {
        let value = decode_path_value(&value);
        builder = builder.path_param(name, value);
    }
    if let Some(query) = parts.uri.query() {
        builder = builder.query_string(query);
    }
    builder = builder.headers(parts.headers.clone());

    let content_type = content_type(parts);
    if !bytes.is_empty() || content_type.is_some() {
        builder = builder.body(content_type, bytes);
    }
    Ok(builder.build())
}

/// Matched segments are still percent-encoded.
fn decode_path_value(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(value = raw, error = %e, "keep path value that does not decode to utf-8");
            raw.to_string()
        }
    }
}

fn content_type(parts: &Parts) -> Option<Mime> {
    let value = parts.headers.get(CONTENT_TYPE)?;
    match value.to_str().ok().and_then(|s| s.parse::<Mime>().ok()) {
        Some(mime) => Some(mime),
        None => {
            warn!(content_type = ?value, "ignore invalid content type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Request;
    use http_body_util::Full;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[tokio::test]
    async fn gathers_every_source() {
        let parts = parts(
            Request::builder()
                .uri("/items/5?q=a&q=b&limit=10")
                .header("x-token", "secret")
                .header("cookie", "ads_id=abc; session=1")
                .header(CONTENT_TYPE, "application/json")
                .body(())
                .unwrap(),
        );
        let descriptor = collect(&parts, Full::new(Bytes::from_static(br#"{"a":1}"#)), &PathParams::empty(), 1024).await.unwrap();

        assert_eq!(descriptor.query_values("q").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(descriptor.query_values("limit").collect::<Vec<_>>(), vec!["10"]);
        assert_eq!(descriptor.header_values("x-token").collect::<Vec<_>>(), vec!["secret"]);
        assert_eq!(descriptor.cookie("ads_id"), Some("abc"));
        assert_eq!(descriptor.cookie("session"), Some("1"));

        let body = descriptor.body().unwrap();
        assert_eq!(body.content_type(), Some(&mime::APPLICATION_JSON));
        assert_eq!(body.bytes().as_ref(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn empty_body_without_content_type_is_absent() {
        let parts = parts(Request::builder().uri("/").body(()).unwrap());
        let descriptor = collect(&parts, Full::new(Bytes::new()), &PathParams::empty(), 1024).await.unwrap();
        assert!(descriptor.body().is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let parts = parts(Request::builder().uri("/").body(()).unwrap());
        let result = collect(&parts, Full::new(Bytes::from(vec![b'x'; 64])), &PathParams::empty(), 16).await;
        assert!(matches!(result, Err(ApiError::PayloadTooLarge { limit: 16 })));
    }

    #[test]
    fn path_values_are_percent_decoded() {
        assert_eq!(decode_path_value("foo%20bar"), "foo bar");
        assert_eq!(decode_path_value("a+b%2Fc"), "a+b/c");
        assert_eq!(decode_path_value("%FF"), "%FF");
    }

    #[tokio::test]
    async fn invalid_content_type_is_dropped() {
        let parts = parts(Request::builder().uri("/").header(CONTENT_TYPE, "not a mime").body(()).unwrap());
        let descriptor = collect(&parts, Full::new(Bytes::from_static(b"{}")), &PathParams::empty(), 1024).await.unwrap();
        assert!(descriptor.body().unwrap().content_type().is_none());
    }
}
