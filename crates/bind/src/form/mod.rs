//! Form bodies: `application/x-www-form-urlencoded` and `multipart/form-data`.

mod multipart;

use crate::request::{RawBody, UploadPart};
use thiserror::Error;

/// Text fields and file parts of one form submission, in body order.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadPart>,
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("unsupported form content type `{0}`")]
    UnsupportedContentType(String),

    #[error("multipart body has no boundary")]
    MissingBoundary,

    #[error("malformed form body: {0}")]
    Malformed(String),

    #[error("form has more than {0} fields")]
    TooManyFields(usize),
}

impl FormError {
    pub fn malformed<S: ToString>(reason: S) -> Self {
        Self::Malformed(reason.to_string())
    }
}

/// Parses a form body according to its content type. A body without a content type is read as
/// url-encoded.
///
/// # Errors
/// [`FormError`] when the content type is not a form type or the body cannot be parsed.
pub fn parse_form(body: &RawBody, max_fields: usize) -> Result<FormData, FormError> {
    let Some(content_type) = body.content_type() else {
        return parse_urlencoded(body.bytes(), max_fields);
    };
    match (content_type.type_(), content_type.subtype()) {
        (mime::APPLICATION, mime::WWW_FORM_URLENCODED) => parse_urlencoded(body.bytes(), max_fields),
        (mime::MULTIPART, mime::FORM_DATA) => {
            let boundary = content_type.get_param(mime::BOUNDARY).ok_or(FormError::MissingBoundary)?;
            multipart::parse(body.bytes(), boundary.as_str(), max_fields)
        }
        _ => Err(FormError::UnsupportedContentType(content_type.essence_str().to_string())),
    }
}

fn parse_urlencoded(bytes: &[u8], max_fields: usize) -> Result<FormData, FormError> {
    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).map_err(FormError::malformed)?;
    if fields.len() > max_fields {
        return Err(FormError::TooManyFields(max_fields));
    }
    Ok(FormData { fields, files: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestDescriptor;

    fn raw(content_type: Option<&str>, body: &'static [u8]) -> RawBody {
        let content_type = content_type.map(|ct| ct.parse().unwrap());
        RequestDescriptor::builder().body(content_type, body).build().body().cloned().unwrap()
    }

    #[test]
    fn urlencoded_fields() {
        let form = parse_form(&raw(Some("application/x-www-form-urlencoded"), b"username=j%C3%B6rg&password=se+cret"), 10).unwrap();
        assert_eq!(
            form.fields,
            vec![("username".to_string(), "jörg".to_string()), ("password".to_string(), "se cret".to_string())]
        );
        assert!(form.files.is_empty());
    }

    #[test]
    fn missing_boundary() {
        let result = parse_form(&raw(Some("multipart/form-data"), b""), 10);
        assert!(matches!(result, Err(FormError::MissingBoundary)));
    }

    #[test]
    fn json_is_not_a_form() {
        let result = parse_form(&raw(Some("application/json"), b"{}"), 10);
        assert!(matches!(result, Err(FormError::UnsupportedContentType(ct)) if ct == "application/json"));
    }
}
