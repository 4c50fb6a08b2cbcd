//! Declared types and structured record definitions.

use crate::error::ConfigError;
use crate::spec::Constraints;
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The declared type a raw input is coerced into.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Str,
    Int,
    Float,
    Bool,
    /// A string in e-mail address format.
    Email,
    /// An absolute `http`/`https` URL.
    Url,
    /// An RFC 3339 timestamp with its UTC offset.
    DateTime,
    /// Untyped JSON, passed through as is.
    Any,
    /// An uploaded file: filename, content type and contents.
    File,
    /// The contents of an uploaded file only.
    Bytes,
    Seq(Box<TypeSpec>),
    /// A mapping whose keys are coerced from their string form into the key type.
    Map(Box<TypeSpec>, Box<TypeSpec>),
    Record(Arc<RecordSpec>),
}

impl TypeSpec {
    pub fn seq(item: TypeSpec) -> Self {
        TypeSpec::Seq(Box::new(item))
    }

    pub fn map(key: TypeSpec, value: TypeSpec) -> Self {
        TypeSpec::Map(Box::new(key), Box::new(value))
    }

    pub fn record(record: &Arc<RecordSpec>) -> Self {
        TypeSpec::Record(Arc::clone(record))
    }

    /// Types that can be produced from a single string.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeSpec::Str | TypeSpec::Int | TypeSpec::Float | TypeSpec::Bool | TypeSpec::Email | TypeSpec::Url | TypeSpec::DateTime
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeSpec::Int | TypeSpec::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, TypeSpec::Str | TypeSpec::Email | TypeSpec::Url)
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, TypeSpec::File | TypeSpec::Bytes)
    }

    /// Whether an upload type appears anywhere in this type, including record fields.
    pub fn contains_upload(&self) -> bool {
        match self {
            TypeSpec::File | TypeSpec::Bytes => true,
            TypeSpec::Seq(item) => item.contains_upload(),
            TypeSpec::Map(key, value) => key.contains_upload() || value.contains_upload(),
            TypeSpec::Record(record) => record.fields().iter().any(|field| field.ty().contains_upload()),
            _ => false,
        }
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, TypeSpec::Seq(_))
    }

    /// The item type of a sequence, or the type itself.
    pub fn element(&self) -> &TypeSpec {
        match self {
            TypeSpec::Seq(item) => item,
            other => other,
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Str => f.write_str("str"),
            TypeSpec::Int => f.write_str("int"),
            TypeSpec::Float => f.write_str("float"),
            TypeSpec::Bool => f.write_str("bool"),
            TypeSpec::Email => f.write_str("email"),
            TypeSpec::Url => f.write_str("url"),
            TypeSpec::DateTime => f.write_str("datetime"),
            TypeSpec::Any => f.write_str("any"),
            TypeSpec::File => f.write_str("file"),
            TypeSpec::Bytes => f.write_str("bytes"),
            TypeSpec::Seq(item) => write!(f, "list[{item}]"),
            TypeSpec::Map(key, value) => write!(f, "dict[{key}, {value}]"),
            TypeSpec::Record(record) => f.write_str(record.name()),
        }
    }
}

/// One field of a [`RecordSpec`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    ty: TypeSpec,
    required: bool,
    default: Option<Value>,
    constraints: Constraints,
    alias: Option<String>,
    description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            constraints: Constraints::default(),
            alias: None,
            description: None,
        }
    }

    /// Not required; binds to null when absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self.default = None;
        self
    }

    /// Not required; binds to `value` when absent.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    crate::spec::constraint_setters!();

    pub fn name(&self) -> &str {
        &self.name
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

    /// The key this field is read from: the alias if declared, otherwise the name.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn validate(&mut self, record: &str) -> Result<(), ConfigError> {
        let owner = format!("{record}.{}", self.name);
        if self.ty.contains_upload() {
            return Err(ConfigError::unsupported_type(owner, crate::spec::Source::Body, &self.ty));
        }
        self.constraints.prepare(&owner, &self.ty)?;
        if let Some(default) = self.default.take() {
            if !default.conforms_to(&self.ty) {
                return Err(ConfigError::InvalidDefault { name: owner, ty: self.ty.to_string() });
            }
            self.default = Some(default.widen(&self.ty));
        }
        Ok(())
    }
}

/// A named structured record: a flat, immutable table of fields.
///
/// Records are only built through [`RecordSpec::builder`], which validates every field, so a
/// record reachable from a [`TypeSpec`] is always well formed.
#[derive(Debug)]
pub struct RecordSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

impl RecordSpec {
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder { name: name.into(), fields: Vec::new(), own: HashSet::new(), error: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Builds a [`RecordSpec`], flattening any base records it extends.
#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    own: HashSet<String>,
    error: Option<ConfigError>,
}

impl RecordBuilder {
    /// Copies every field of `base`. Fields declared afterwards with the same name replace the
    /// inherited ones in place, keeping the base ordering.
    #[must_use]
    pub fn extends(mut self, base: &RecordSpec) -> Self {
        for field in &base.fields {
            match self.fields.iter_mut().find(|f| f.name == field.name) {
                Some(slot) => *slot = field.clone(),
                None => self.fields.push(field.clone()),
            }
        }
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        if !self.own.insert(field.name.clone()) {
            self.error.get_or_insert(ConfigError::DuplicateField { record: self.name.clone(), field: field.name });
            return self;
        }
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn build(self) -> Result<Arc<RecordSpec>, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut fields = self.fields;
        for field in &mut fields {
            field.validate(&self.name)?;
        }
        Ok(Arc::new(RecordSpec { name: self.name, fields }))
    }
}
