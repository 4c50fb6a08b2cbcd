//! Parameter specifications.
//!
//! A handler's inputs are declared once, at route registration time, as a [`ParamSpecs`]: an
//! ordered, validated and immutable list of [`ParamSpec`]s. Each spec names where the raw value
//! comes from ([`Source`]), what it is coerced into ([`TypeSpec`]), whether it is required, and
//! the [`Constraints`] the coerced value must satisfy.
//!
//! ```
//! use micro_bind::spec::{ParamSpec, ParamSpecs, TypeSpec};
//!
//! let specs = ParamSpecs::new([
//!     ParamSpec::path("item_id", TypeSpec::Int).ge(0).lt(1000),
//!     ParamSpec::query("q", TypeSpec::Str).optional().max_length(50),
//! ])
//! .unwrap();
//!
//! assert_eq!(specs.len(), 2);
//! ```

mod decl;
mod types;

pub use decl::RecordRegistry;
pub use types::FieldSpec;
pub use types::RecordBuilder;
pub use types::RecordSpec;
pub use types::TypeSpec;

use crate::error::ConfigError;
use crate::value::Value;
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Where a parameter's raw value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    Form,
    File,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Path => "path",
            Source::Query => "query",
            Source::Header => "header",
            Source::Cookie => "cookie",
            Source::Body => "body",
            Source::Form => "form",
            Source::File => "file",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ConfigError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "path" => Ok(Source::Path),
            "query" => Ok(Source::Query),
            "header" => Ok(Source::Header),
            "cookie" => Ok(Source::Cookie),
            "body" => Ok(Source::Body),
            "form" => Ok(Source::Form),
            "file" => Ok(Source::File),
            _ => Err(ConfigError::UnknownSource { tag: tag.to_string() }),
        }
    }
}

/// A numeric bound. Integer bounds compare exactly against integer values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss, reason = "mixed int/float comparisons are done in f64")]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub(crate) fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(i64::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A regular expression constraint, compiled when the owning spec is validated.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(text))
    }
}

/// Constraints checked against a coerced value, in declaration-independent fixed order:
/// numeric bounds, length bounds, pattern, allowed values.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub(crate) gt: Option<Number>,
    pub(crate) ge: Option<Number>,
    pub(crate) lt: Option<Number>,
    pub(crate) le: Option<Number>,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) one_of: Option<Vec<String>>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.ge.is_none()
            && self.lt.is_none()
            && self.le.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.one_of.is_none()
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn allowed_values(&self) -> Option<&[String]> {
        self.one_of.as_deref()
    }

    /// Checks every constraint applies to `ty` and compiles the pattern.
    pub(crate) fn prepare(&mut self, owner: &str, ty: &TypeSpec) -> Result<(), ConfigError> {
        let element = ty.element();
        let numeric = [("gt", self.gt), ("ge", self.ge), ("lt", self.lt), ("le", self.le)];
        for (constraint, bound) in numeric {
            if bound.is_some() && !element.is_numeric() {
                return Err(ConfigError::constraint_mismatch(owner, constraint, ty));
            }
        }
        let lengthy = element.is_textual() || ty.is_seq();
        if self.min_length.is_some() && !lengthy {
            return Err(ConfigError::constraint_mismatch(owner, "min_length", ty));
        }
        if self.max_length.is_some() && !lengthy {
            return Err(ConfigError::constraint_mismatch(owner, "max_length", ty));
        }
        if self.one_of.is_some() && !element.is_scalar() {
            return Err(ConfigError::constraint_mismatch(owner, "one_of", ty));
        }
        if let Some(pattern) = &mut self.pattern {
            if !element.is_textual() {
                return Err(ConfigError::constraint_mismatch(owner, "pattern", ty));
            }
            let regex = Regex::new(&pattern.source)
                .map_err(|e| ConfigError::InvalidPattern { name: owner.to_string(), reason: e.to_string() })?;
            pattern.regex = Some(regex);
        }
        Ok(())
    }
}

/// Generates the constraint builder methods shared by parameter and record field specs.
macro_rules! constraint_setters {
    () => {
        /// Rejects values `<= bound`.
        #[must_use]
        pub fn gt(mut self, bound: impl Into<$crate::spec::Number>) -> Self {
            self.constraints.gt = Some(bound.into());
            self
        }

        /// Rejects values `< bound`.
        #[must_use]
        pub fn ge(mut self, bound: impl Into<$crate::spec::Number>) -> Self {
            self.constraints.ge = Some(bound.into());
            self
        }

        /// Rejects values `>= bound`.
        #[must_use]
        pub fn lt(mut self, bound: impl Into<$crate::spec::Number>) -> Self {
            self.constraints.lt = Some(bound.into());
            self
        }

        /// Rejects values `> bound`.
        #[must_use]
        pub fn le(mut self, bound: impl Into<$crate::spec::Number>) -> Self {
            self.constraints.le = Some(bound.into());
            self
        }

        #[must_use]
        pub fn min_length(mut self, min: usize) -> Self {
            self.constraints.min_length = Some(min);
            self
        }

        #[must_use]
        pub fn max_length(mut self, max: usize) -> Self {
            self.constraints.max_length = Some(max);
            self
        }

        /// Requires a regex match somewhere in the value; anchor with `^...$` for a full match.
        #[must_use]
        pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
            self.constraints.pattern = Some($crate::spec::Pattern::new(pattern.into()));
            self
        }

        /// Restricts the value to a closed set of tokens.
        #[must_use]
        pub fn one_of<I, S>(mut self, allowed: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.constraints.one_of = Some(allowed.into_iter().map(Into::into).collect());
            self
        }
    };
}

pub(crate) use constraint_setters;

impl Pattern {
    pub(crate) fn new(source: String) -> Self {
        Self { source, regex: None }
    }
}

/// Declaration of one expected input.
///
/// Parameters are required unless [`optional`](ParamSpec::optional) or
/// [`default`](ParamSpec::default) is called.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    source: Source,
    ty: TypeSpec,
    required: bool,
    default: Option<Value>,
    constraints: Constraints,
    alias: Option<String>,
    embed: bool,
    deprecated: bool,
    include_in_schema: bool,
    convert_underscores: bool,
    title: Option<String>,
    description: Option<String>,
}

macro_rules! source_constructor {
    ($method:ident, $source:ident) => {
        pub fn $method(name: impl Into<String>, ty: TypeSpec) -> Self {
            Self::new(name, Source::$source, ty)
        }
    };
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, source: Source, ty: TypeSpec) -> Self {
        Self {
            name: name.into(),
            source,
            ty,
            required: true,
            default: None,
            constraints: Constraints::default(),
            alias: None,
            embed: false,
            deprecated: false,
            include_in_schema: true,
            convert_underscores: true,
            title: None,
            description: None,
        }
    }

    source_constructor!(path, Path);
    source_constructor!(query, Query);
    source_constructor!(header, Header);
    source_constructor!(cookie, Cookie);
    source_constructor!(body, Body);
    source_constructor!(form, Form);
    source_constructor!(file, File);

    /// Not required; binds to null when absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self.default = None;
        self
    }

    /// Not required; binds to `value` when absent. Defaults are used as declared, they are not
    /// checked against the constraints.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    /// Reads the value under `alias` instead of the parameter name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Expects the body as an object with this parameter under its own key.
    #[must_use]
    pub fn embed(mut self) -> Self {
        self.embed = true;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// Header parameters look `user_agent` up as `user-agent` unless this is turned off.
    #[must_use]
    pub fn convert_underscores(mut self, convert: bool) -> Self {
        self.convert_underscores = convert;
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    constraint_setters!();

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn ty(&self) -> &TypeSpec {
        &self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_embed(&self) -> bool {
        self.embed
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn in_schema(&self) -> bool {
        self.include_in_schema
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The key the raw value is looked up under.
    pub fn lookup_key(&self) -> Cow<'_, str> {
        match (&self.alias, self.source) {
            (Some(alias), _) => Cow::Borrowed(alias),
            (None, Source::Header) if self.convert_underscores => Cow::Owned(self.name.replace('_', "-")),
            (None, _) => Cow::Borrowed(&self.name),
        }
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        let ty = &self.ty;
        let supported = match self.source {
            Source::Path | Source::Cookie => ty.is_scalar(),
            Source::Query | Source::Header | Source::Form => ty.element().is_scalar(),
            Source::File => ty.element().is_upload(),
            Source::Body => !ty.contains_upload(),
        };
        if !supported {
            return Err(ConfigError::unsupported_type(&self.name, self.source, ty));
        }
        if self.source == Source::Path && !self.required {
            return Err(ConfigError::PathDefault { name: self.name.clone() });
        }
        if self.embed && self.source != Source::Body {
            return Err(ConfigError::EmbedOutsideBody { name: self.name.clone(), origin: self.source });
        }
        self.constraints.prepare(&self.name, &self.ty)?;
        if let Some(default) = self.default.take() {
            if !default.conforms_to(&self.ty) {
                return Err(ConfigError::InvalidDefault { name: self.name.clone(), ty: self.ty.to_string() });
            }
            self.default = Some(default.widen(&self.ty));
        }
        Ok(())
    }
}

/// The validated, immutable parameter set of one handler.
///
/// Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct ParamSpecs {
    params: Arc<[ParamSpec]>,
}

impl ParamSpecs {
    /// Validates `params` as one handler's inputs.
    ///
    /// # Errors
    /// A [`ConfigError`] for the first declaration that could never bind correctly: duplicate
    /// names, path parameters with defaults, types a source cannot carry, constraints that do not
    /// apply to the declared type, invalid patterns, defaults of the wrong type, `embed` outside
    /// the body, and body parameters declared next to form or file parameters.
    pub fn new(params: impl IntoIterator<Item = ParamSpec>) -> Result<Self, ConfigError> {
        let mut params: Vec<ParamSpec> = params.into_iter().collect();

        let mut names = HashSet::with_capacity(params.len());
        for param in &mut params {
            if !names.insert(param.name.clone()) {
                return Err(ConfigError::duplicate_name(&param.name));
            }
            param.validate()?;
        }

        let body = params.iter().find(|p| p.source == Source::Body);
        let form = params.iter().find(|p| matches!(p.source, Source::Form | Source::File));
        if let (Some(body), Some(form)) = (body, form) {
            return Err(ConfigError::MixedBodyAndForm { body: body.name.clone(), form: form.name.clone() });
        }

        Ok(Self { params: params.into() })
    }

    /// An empty parameter set, for handlers that take no input.
    pub fn empty() -> Self {
        Self { params: Arc::from(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamSpec> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameters read from `source`, in declaration order.
    pub fn from_source(&self, source: Source) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(move |p| p.source == source)
    }

    /// Parameters that should be published in an API schema.
    pub fn schema_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.include_in_schema)
    }

    pub(crate) fn has_form_sources(&self) -> bool {
        self.params.iter().any(|p| matches!(p.source, Source::Form | Source::File))
    }
}

impl<'a> IntoIterator for &'a ParamSpecs {
    type Item = &'a ParamSpec;
    type IntoIter = std::slice::Iter<'a, ParamSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
