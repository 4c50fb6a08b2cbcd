//! The raw, transport-independent view of one request.
//!
//! A [`RequestDescriptor`] is built once per request by the transport layer (see
//! `micro-bind-web` for the `http` adapter) and only read by the binder.

use bytes::Bytes;
use cookie::Cookie;
use http::header::{COOKIE, HeaderName};
use http::{HeaderMap, HeaderValue};
use mime::Mime;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// A re-openable byte stream behind an uploaded file.
///
/// Every call to [`open`](UploadSource::open) yields a fresh reader over the whole contents.
/// The binder drops each reader as soon as the part is read.
#[cfg_attr(test, mockall::automock)]
pub trait UploadSource: Send + Sync {
    /// # Errors
    /// When the stream cannot be opened.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

impl UploadSource for Bytes {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.clone())))
    }
}

/// Upload contents spooled to a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

impl UploadSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.0)?))
    }
}

/// One file part of a form submission.
#[derive(Clone)]
pub struct UploadPart {
    field: String,
    filename: String,
    content_type: Option<String>,
    source: Arc<dyn UploadSource>,
}

impl UploadPart {
    pub fn new(
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        source: Arc<dyn UploadSource>,
    ) -> Self {
        Self { field: field.into(), filename: filename.into(), content_type, source }
    }

    /// An in-memory part.
    pub fn from_bytes(field: impl Into<String>, filename: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self::new(field, filename, content_type, Arc::new(data))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn source(&self) -> &dyn UploadSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPart")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Body bytes and the content type they were declared with.
#[derive(Debug, Clone)]
pub struct RawBody {
    content_type: Option<Mime>,
    bytes: Bytes,
}

impl RawBody {
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    path: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Option<RawBody>,
    form: Option<Vec<(String, String)>>,
    files: Vec<UploadPart>,
}

impl RequestDescriptor {
    pub fn builder() -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::default()
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Every value of the query key `name`, in appearance order.
    pub fn query_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query.iter().filter(move |(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Every value of the header `name`, matched case-insensitively. Values that are not
    /// visible ASCII are skipped.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let values = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => self.headers.get_all(name).iter().collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        values.into_iter().filter_map(|value| value.to_str().ok())
    }

    /// The first cookie named exactly `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&RawBody> {
        self.body.as_ref()
    }

    /// Form fields already parsed by the transport, if any.
    pub fn form(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    pub fn files(&self) -> &[UploadPart] {
        &self.files
    }
}

#[derive(Debug, Default)]
pub struct RequestDescriptorBuilder {
    inner: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    /// A value matched by the router.
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.path.push((name.into(), value.into()));
        self
    }

    /// Appends the pairs of a raw, percent-encoded query string. An unparsable query string is
    /// logged and ignored.
    #[must_use]
    pub fn query_string(mut self, query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => self.inner.query.extend(pairs),
            Err(e) => warn!(query, error = %e, "ignore invalid query string"),
        }
        self
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.query.push((name.into(), value.into()));
        self
    }

    /// Appends a header; invalid names or values are logged and skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.inner.headers.append(name, value);
            }
            _ => warn!(name, "skip invalid header"),
        }
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in &headers {
            self.inner.headers.append(name, value.clone());
        }
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.cookies.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, content_type: Option<Mime>, bytes: impl Into<Bytes>) -> Self {
        self.inner.body = Some(RawBody { content_type, bytes: bytes.into() });
        self
    }

    /// A JSON body.
    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.body(Some(mime::APPLICATION_JSON), value.to_string())
    }

    /// A pre-parsed form field. Once any are set the body is not parsed for form sources.
    #[must_use]
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.form.get_or_insert_with(Vec::new).push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn file(mut self, part: UploadPart) -> Self {
        self.inner.form.get_or_insert_with(Vec::new);
        self.inner.files.push(part);
        self
    }

    /// Finishes the descriptor, adding the cookies found in `Cookie` headers after the ones set
    /// explicitly.
    pub fn build(mut self) -> RequestDescriptor {
        let parsed: Vec<(String, String)> = self
            .inner
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        self.inner.cookies.extend(parsed);
        self.inner
    }
}
