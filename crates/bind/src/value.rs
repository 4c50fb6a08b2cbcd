//! Coerced values and the bound parameter set handed to handlers.

use crate::spec::TypeSpec;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number};

/// A raw input after coercion into its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(DateTime<FixedOffset>),
    File(UploadedFile),
    Bytes(Bytes),
    Seq(Vec<Value>),
    /// Entries in input order, keys already coerced into the key type.
    Map(Vec<(Value, Value)>),
    /// Fields in record declaration order.
    Record(Vec<(String, Value)>),
    /// Untyped JSON kept as is.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers are widened.
    #[allow(clippy::cast_precision_loss, reason = "widening for read access only")]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Value::File(file) => Some(file),
            _ => None,
        }
    }

    /// A field of a record value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(key, _)| key == name).map(|(_, value)| value),
            _ => None,
        }
    }

    /// Whether this value could have been produced by coercing into `ty`. `Null` fits anything.
    pub fn conforms_to(&self, ty: &TypeSpec) -> bool {
        match (self, ty) {
            (Value::Null, _) | (_, TypeSpec::Any) => true,
            (Value::Bool(_), TypeSpec::Bool)
            | (Value::Int(_), TypeSpec::Int | TypeSpec::Float)
            | (Value::Float(_), TypeSpec::Float)
            | (Value::Str(_), TypeSpec::Str | TypeSpec::Email | TypeSpec::Url)
            | (Value::DateTime(_), TypeSpec::DateTime)
            | (Value::File(_), TypeSpec::File)
            | (Value::Bytes(_), TypeSpec::Bytes) => true,
            (Value::Seq(items), TypeSpec::Seq(item)) => items.iter().all(|v| v.conforms_to(item)),
            (Value::Map(entries), TypeSpec::Map(key, value)) => {
                entries.iter().all(|(k, v)| k.conforms_to(key) && v.conforms_to(value))
            }
            (Value::Record(fields), TypeSpec::Record(record)) => fields
                .iter()
                .all(|(name, v)| record.field(name).is_some_and(|field| v.conforms_to(field.ty()))),
            _ => false,
        }
    }

    /// Converts integers into floats wherever `ty` expects a float. Assumes the value conforms.
    #[allow(clippy::cast_precision_loss, reason = "integer defaults for float parameters")]
    pub(crate) fn widen(self, ty: &TypeSpec) -> Value {
        match (self, ty) {
            (Value::Int(i), TypeSpec::Float) => Value::Float(i as f64),
            (Value::Seq(items), TypeSpec::Seq(item)) => Value::Seq(items.into_iter().map(|v| v.widen(item)).collect()),
            (Value::Map(entries), TypeSpec::Map(key, value)) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k.widen(key), v.widen(value))).collect())
            }
            (Value::Record(fields), TypeSpec::Record(record)) => Value::Record(
                fields
                    .into_iter()
                    .map(|(name, v)| {
                        let v = match record.field(&name) {
                            Some(field) => v.widen(field.ty()),
                            None => v,
                        };
                        (name, v)
                    })
                    .collect(),
            ),
            (other, _) => other,
        }
    }

    /// The JSON rendering used for responses and error inputs.
    ///
    /// Files become `{filename, content_type, size}`, raw bytes a lossy UTF-8 string, timestamps
    /// RFC 3339 strings and map keys their string form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::File(file) => file.to_json(),
            Value::Bytes(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => {
                let object: Map<_, _> = entries.iter().map(|(k, v)| (k.key_string(), v.to_json())).collect();
                serde_json::Value::Object(object)
            }
            Value::Record(fields) => {
                let object: Map<_, _> = fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                serde_json::Value::Object(object)
            }
            Value::Json(json) => json.clone(),
        }
    }

    fn key_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            other => other.to_json().to_string(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<UploadedFile> for Value {
    fn from(value: UploadedFile) -> Self {
        Value::File(value)
    }
}

/// Untyped JSON; only conforms to [`TypeSpec::Any`].
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

/// A fully read upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self { filename: filename.into(), content_type, data }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.size(),
        })
    }
}

/// The result of a successful bind: one value per declared parameter, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    values: Vec<(String, Value)>,
}

impl BoundParams {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { values: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, name: &str, value: Value) {
        self.values.push((name.to_string(), value));
    }

    /// The value bound to the parameter `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Deserializes one parameter through its JSON rendering. An unknown name reads as null, so
    /// `Option<T>` targets yield `None`.
    ///
    /// # Errors
    /// When the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, serde_json::Error> {
        let json = self.get(name).map_or(serde_json::Value::Null, Value::to_json);
        serde_json::from_value(json)
    }

    /// Deserializes the whole parameter set, keyed by parameter name.
    ///
    /// # Errors
    /// When the parameter object does not deserialize into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let object: Map<_, _> = self.values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        serde_json::Value::Object(object)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for BoundParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
