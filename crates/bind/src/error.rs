//! Error types produced by spec construction and by binding.
//!
//! Two families live here and they never mix:
//!
//! - [`ConfigError`]: the parameter spec itself is invalid. Raised once, while routes are
//!   being registered, and meant to abort setup.
//! - [`FieldError`] / [`BindingErrors`]: the client sent something that does not satisfy the
//!   spec. Collected per request and returned as a value.

use crate::spec::Source;
use std::fmt;
use thiserror::Error;

/// Which constraint rejected a coerced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    MinLength,
    MaxLength,
    Pattern,
    Enum,
}

impl ConstraintKind {
    /// The constraint family: `numeric`, `length`, `pattern` or `enum`.
    pub fn family(self) -> &'static str {
        match self {
            ConstraintKind::GreaterThan
            | ConstraintKind::GreaterThanEqual
            | ConstraintKind::LessThan
            | ConstraintKind::LessThanEqual => "numeric",
            ConstraintKind::MinLength | ConstraintKind::MaxLength => "length",
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::Enum => "enum",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ConstraintKind::GreaterThan => "greater_than",
            ConstraintKind::GreaterThanEqual => "greater_than_equal",
            ConstraintKind::LessThan => "less_than",
            ConstraintKind::LessThanEqual => "less_than_equal",
            ConstraintKind::MinLength => "too_short",
            ConstraintKind::MaxLength => "too_long",
            ConstraintKind::Pattern => "pattern_mismatch",
            ConstraintKind::Enum => "enum",
        }
    }
}

/// The reason a single parameter failed to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingRequired,
    TypeCoercionFailed,
    ConstraintViolated(ConstraintKind),
    MalformedBody,
    UploadFailed,
}

impl ErrorKind {
    /// Stable machine-readable code, suitable for the `type` field of an error response.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingRequired => "missing",
            ErrorKind::TypeCoercionFailed => "type_error",
            ErrorKind::ConstraintViolated(kind) => kind.code(),
            ErrorKind::MalformedBody => "malformed_body",
            ErrorKind::UploadFailed => "upload_failed",
        }
    }
}

/// One validation failure tied to a specific parameter.
///
/// `path` addresses the failing element below the parameter itself: record field names and
/// sequence indices, outermost first. It is empty when the parameter value as a whole failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    name: String,
    source: Source,
    path: Vec<String>,
    kind: ErrorKind,
    message: String,
    input: Option<serde_json::Value>,
}

impl FieldError {
    pub fn new(name: impl Into<String>, source: Source, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { name: name.into(), source, path: Vec::new(), kind, message: message.into(), input: None }
    }

    pub fn missing(name: impl Into<String>, source: Source) -> Self {
        Self::new(name, source, ErrorKind::MissingRequired, "field required")
    }

    /// An error about a body as a whole rather than one parameter, e.g. invalid JSON.
    pub fn whole(source: Source, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(String::new(), source, kind, message)
    }

    #[must_use]
    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: impl Into<serde_json::Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// The declared parameter name (never the alias). Empty for [`whole`](FieldError::whole)
    /// body errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending raw value, when there was one.
    pub fn input(&self) -> Option<&serde_json::Value> {
        self.input.as_ref()
    }

    /// `source`, `name`, then the nested path, e.g. `["body", "item", "price"]`.
    pub fn location(&self) -> Vec<String> {
        let mut loc = Vec::with_capacity(self.path.len() + 2);
        loc.push(self.source.as_str().to_string());
        if !self.name.is_empty() {
            loc.push(self.name.clone());
        }
        loc.extend(self.path.iter().cloned());
        loc
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location().join("."))?;
        write!(f, ": {} [{}]", self.message, self.kind.code())
    }
}

/// The ordered, non-empty list of every problem found while binding one request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} parameter error(s), first: {}", .0.len(), .0[0])]
pub struct BindingErrors(Vec<FieldError>);

impl BindingErrors {
    /// Wraps collected errors, returning `None` when there are none.
    pub fn from_errors(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() { None } else { Some(Self(errors)) }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// Errors reported against the parameter `name`, in order.
    pub fn for_param<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| e.name == name)
    }
}

impl IntoIterator for BindingErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A parameter spec that can never bind correctly. Fatal at route setup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate parameter name `{name}`")]
    DuplicateName { name: String },

    #[error("duplicate field `{field}` in record `{record}`")]
    DuplicateField { record: String, field: String },

    #[error("unknown parameter source `{tag}`")]
    UnknownSource { tag: String },

    #[error("unknown type `{ty}` for `{name}`")]
    UnknownType { name: String, ty: String },

    #[error("path parameter `{name}` is always required and cannot have a default")]
    PathDefault { name: String },

    #[error("parameter `{name}` from {origin} cannot have type {ty}")]
    UnsupportedType { name: String, origin: Source, ty: String },

    #[error("constraint `{constraint}` does not apply to `{name}` of type {ty}")]
    ConstraintMismatch { name: String, constraint: &'static str, ty: String },

    #[error("invalid pattern for `{name}`: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("default value of `{name}` does not match type {ty}")]
    InvalidDefault { name: String, ty: String },

    #[error("`embed` only applies to body parameters, `{name}` is a {origin} parameter")]
    EmbedOutsideBody { name: String, origin: Source },

    #[error("body parameter `{body}` cannot be combined with form/file parameter `{form}`")]
    MixedBodyAndForm { body: String, form: String },

    #[error("path parameter `{name}` does not appear in route `{route}`")]
    UnknownPathParam { name: String, route: String },

    #[error("invalid declaration: {reason}")]
    InvalidDeclaration { reason: String },
}

impl ConfigError {
    pub fn duplicate_name<S: ToString>(name: S) -> Self {
        Self::DuplicateName { name: name.to_string() }
    }

    pub fn unsupported_type<N: ToString, T: ToString>(name: N, origin: Source, ty: T) -> Self {
        Self::UnsupportedType { name: name.to_string(), origin, ty: ty.to_string() }
    }

    pub fn constraint_mismatch<N: ToString, T: ToString>(name: N, constraint: &'static str, ty: T) -> Self {
        Self::ConstraintMismatch { name: name.to_string(), constraint, ty: ty.to_string() }
    }

    pub fn invalid_declaration<S: ToString>(reason: S) -> Self {
        Self::InvalidDeclaration { reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_starts_with_source_and_name() {
        let error = FieldError::missing("item", Source::Body).with_path(vec!["price".into()]);
        assert_eq!(error.location(), vec!["body", "item", "price"]);
        assert_eq!(error.to_string(), "body.item.price: field required [missing]");

        let error = FieldError::whole(Source::Body, ErrorKind::MalformedBody, "invalid JSON");
        assert_eq!(error.location(), vec!["body"]);
    }

    #[test]
    fn binding_errors_are_never_empty() {
        assert!(BindingErrors::from_errors(Vec::new()).is_none());

        let errors = BindingErrors::from_errors(vec![
            FieldError::missing("a", Source::Query),
            FieldError::missing("b", Source::Header),
            FieldError::new("a", Source::Query, ErrorKind::TypeCoercionFailed, "bad"),
        ])
        .unwrap();

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.for_param("a").count(), 2);
        assert!(errors.to_string().starts_with("3 parameter error(s)"));
    }

    #[test]
    fn constraint_codes_and_families() {
        let kind = ErrorKind::ConstraintViolated(ConstraintKind::LessThanEqual);
        assert_eq!(kind.code(), "less_than_equal");
        assert_eq!(ConstraintKind::LessThanEqual.family(), "numeric");
        assert_eq!(ConstraintKind::MaxLength.family(), "length");
        assert_eq!(ConstraintKind::Enum.family(), "enum");
    }
}
