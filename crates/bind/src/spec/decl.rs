//! JSON declarations of parameter sets and records.
//!
//! Routes can declare their inputs as data instead of code:
//!
//! ```json
//! {
//!   "records": [
//!     { "name": "Item", "fields": [
//!       { "name": "name", "type": "str" },
//!       { "name": "price", "type": "float", "gt": 0 }
//!     ] }
//!   ],
//!   "params": [
//!     { "name": "item_id", "in": "path", "type": "int", "ge": 0 },
//!     { "name": "q", "in": "query", "type": "list[str]", "default": ["foo", "bar"], "alias": "q-item" },
//!     { "name": "item", "in": "body", "type": "Item", "embed": true }
//!   ]
//! }
//! ```
//!
//! Records are resolved in order, so a record may extend or reference the ones declared
//! before it, or any record already in the [`RecordRegistry`] passed in.

use crate::coerce;
use crate::error::ConfigError;
use crate::spec::{FieldSpec, ParamSpec, ParamSpecs, RecordSpec, Source, TypeSpec};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Named records that declarations can refer to by type name.
#[derive(Debug, Clone, Default)]
pub struct RecordRegistry {
    records: HashMap<String, Arc<RecordSpec>>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, record: &Arc<RecordSpec>) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&mut self, record: &Arc<RecordSpec>) {
        self.records.insert(record.name().to_string(), Arc::clone(record));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordSpec>> {
        self.records.get(name)
    }

    /// Builds a registry from a JSON document with a `records` array.
    ///
    /// # Errors
    /// [`ConfigError`] when the document is not valid or a record is ill-formed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: Document = serde_json::from_str(json).map_err(ConfigError::invalid_declaration)?;
        let mut registry = RecordRegistry::new();
        registry.declare(document.records)?;
        Ok(registry)
    }

    fn declare(&mut self, records: Vec<RecordDecl>) -> Result<(), ConfigError> {
        for decl in records {
            let mut builder = RecordSpec::builder(&decl.name);
            if let Some(base) = &decl.extends {
                let base = self
                    .get(base)
                    .ok_or_else(|| ConfigError::UnknownType { name: decl.name.clone(), ty: base.clone() })?;
                builder = builder.extends(base);
            }
            for field in decl.fields {
                builder = builder.field(field.into_field(self)?);
            }
            let record = builder.build()?;
            self.insert(&record);
        }
        Ok(())
    }
}

impl ParamSpecs {
    /// Parses and validates a JSON parameter declaration.
    ///
    /// # Errors
    /// [`ConfigError`] for malformed JSON, unknown `in` tags or type names, and every error
    /// [`ParamSpecs::new`] reports.
    pub fn from_json(json: &str, records: &RecordRegistry) -> Result<Self, ConfigError> {
        let document: Document = serde_json::from_str(json).map_err(ConfigError::invalid_declaration)?;

        let mut registry = records.clone();
        registry.declare(document.records)?;

        let params = document.params.into_iter().map(|decl| decl.into_param(&registry)).collect::<Result<Vec<_>, _>>()?;
        ParamSpecs::new(params)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    records: Vec<RecordDecl>,
    #[serde(default)]
    params: Vec<Decl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDecl {
    name: String,
    extends: Option<String>,
    #[serde(default)]
    fields: Vec<Decl>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Bound {
    Int(i64),
    Float(f64),
}

impl From<Bound> for crate::spec::Number {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Int(i) => crate::spec::Number::Int(i),
            Bound::Float(f) => crate::spec::Number::Float(f),
        }
    }
}

/// One parameter or record field. `in` is only meaningful (and required) for parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Decl {
    name: String,
    #[serde(rename = "in")]
    source: Option<String>,
    #[serde(rename = "type")]
    ty: String,
    required: Option<bool>,
    default: Option<serde_json::Value>,
    alias: Option<String>,
    #[serde(default)]
    embed: bool,
    #[serde(default)]
    deprecated: bool,
    include_in_schema: Option<bool>,
    convert_underscores: Option<bool>,
    title: Option<String>,
    description: Option<String>,
    gt: Option<Bound>,
    ge: Option<Bound>,
    lt: Option<Bound>,
    le: Option<Bound>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    #[serde(rename = "enum")]
    one_of: Option<Vec<String>>,
}

/// Applies the optional constraint keys of a declaration to a builder.
macro_rules! apply_constraints {
    ($builder:ident, $decl:ident) => {{
        let mut builder = $builder;
        if let Some(bound) = $decl.gt {
            builder = builder.gt(bound);
        }
        if let Some(bound) = $decl.ge {
            builder = builder.ge(bound);
        }
        if let Some(bound) = $decl.lt {
            builder = builder.lt(bound);
        }
        if let Some(bound) = $decl.le {
            builder = builder.le(bound);
        }
        if let Some(min) = $decl.min_length {
            builder = builder.min_length(min);
        }
        if let Some(max) = $decl.max_length {
            builder = builder.max_length(max);
        }
        if let Some(pattern) = $decl.pattern {
            builder = builder.pattern(pattern);
        }
        if let Some(allowed) = $decl.one_of {
            builder = builder.one_of(allowed);
        }
        builder
    }};
}

impl Decl {
    fn resolve_type(&self, records: &RecordRegistry) -> Result<TypeSpec, ConfigError> {
        parse_type(&self.ty, records).ok_or_else(|| ConfigError::UnknownType { name: self.name.clone(), ty: self.ty.clone() })
    }

    fn resolve_default(&self, ty: &TypeSpec) -> Result<Option<crate::value::Value>, ConfigError> {
        match &self.default {
            None => Ok(None),
            Some(json) => coerce::decode(json, ty)
                .map(Some)
                .map_err(|_| ConfigError::InvalidDefault { name: self.name.clone(), ty: ty.to_string() }),
        }
    }

    fn into_param(mut self, records: &RecordRegistry) -> Result<ParamSpec, ConfigError> {
        let tag = self
            .source
            .as_deref()
            .ok_or_else(|| ConfigError::invalid_declaration(format!("parameter `{}` has no `in`", self.name)))?;
        let source: Source = tag.parse()?;
        let ty = self.resolve_type(records)?;
        let default = self.resolve_default(&ty)?;

        let mut param = ParamSpec::new(&self.name, source, ty);
        param = match (default, self.required) {
            (Some(value), _) => param.default(value),
            (None, Some(false)) => param.optional(),
            (None, _) => param,
        };
        if let Some(alias) = self.alias.take() {
            param = param.alias(alias);
        }
        if self.embed {
            param = param.embed();
        }
        if self.deprecated {
            param = param.deprecated();
        }
        if let Some(include) = self.include_in_schema {
            param = param.include_in_schema(include);
        }
        if let Some(convert) = self.convert_underscores {
            param = param.convert_underscores(convert);
        }
        if let Some(title) = self.title.take() {
            param = param.title(title);
        }
        if let Some(description) = self.description.take() {
            param = param.description(description);
        }
        let decl = self;
        Ok(apply_constraints!(param, decl))
    }

    fn into_field(mut self, records: &RecordRegistry) -> Result<FieldSpec, ConfigError> {
        if self.source.is_some() {
            return Err(ConfigError::invalid_declaration(format!("record field `{}` cannot have `in`", self.name)));
        }
        let ty = self.resolve_type(records)?;
        let default = self.resolve_default(&ty)?;

        let mut field = FieldSpec::new(&self.name, ty);
        field = match (default, self.required) {
            (Some(value), _) => field.default(value),
            (None, Some(false)) => field.optional(),
            (None, _) => field,
        };
        if let Some(alias) = self.alias.take() {
            field = field.alias(alias);
        }
        if let Some(description) = self.description.take() {
            field = field.description(description);
        }
        let decl = self;
        Ok(apply_constraints!(field, decl))
    }
}

/// Parses `str`, `int`, `list[T]`, `dict[K, V]` or a registered record name.
fn parse_type(text: &str, records: &RecordRegistry) -> Option<TypeSpec> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("list[").and_then(|t| t.strip_suffix(']')) {
        return parse_type(inner, records).map(TypeSpec::seq);
    }
    if let Some(inner) = text.strip_prefix("dict[").and_then(|t| t.strip_suffix(']')) {
        let (key, value) = split_top_level(inner)?;
        let key = parse_type(key, records)?;
        if !key.is_scalar() {
            return None;
        }
        return Some(TypeSpec::map(key, parse_type(value, records)?));
    }
    let ty = match text {
        "str" => TypeSpec::Str,
        "int" => TypeSpec::Int,
        "float" => TypeSpec::Float,
        "bool" => TypeSpec::Bool,
        "email" => TypeSpec::Email,
        "url" => TypeSpec::Url,
        "datetime" => TypeSpec::DateTime,
        "any" => TypeSpec::Any,
        "file" => TypeSpec::File,
        "bytes" => TypeSpec::Bytes,
        name => TypeSpec::record(records.get(name)?),
    };
    Some(ty)
}

/// Splits `K, V` at the first comma outside brackets.
fn split_top_level(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use indoc::indoc;

    #[test]
    fn parse_nested_types() {
        let registry = RecordRegistry::new();
        let ty = parse_type("dict[int, list[float]]", &registry).unwrap();
        assert_eq!(ty.to_string(), "dict[int, list[float]]");

        assert!(parse_type("dict[list[int], float]", &registry).is_none());
        assert!(parse_type("list[Unknown]", &registry).is_none());
        assert!(parse_type("dict[int]", &registry).is_none());
    }

    #[test]
    fn declare_params_with_records() {
        let json = indoc! {r#"
            {
              "records": [
                { "name": "Item", "fields": [
                  { "name": "name", "type": "str" },
                  { "name": "description", "type": "str", "required": false, "max_length": 300 },
                  { "name": "price", "type": "float", "gt": 0 },
                  { "name": "tags", "type": "list[str]", "default": [] }
                ] }
              ],
              "params": [
                { "name": "item_id", "in": "path", "type": "int", "ge": 0, "lt": 1000, "title": "Item ID" },
                { "name": "q", "in": "query", "type": "list[str]", "default": ["foo", "bar"], "alias": "q-item", "deprecated": true },
                { "name": "item", "in": "body", "type": "Item", "embed": true }
              ]
            }
        "#};

        let specs = ParamSpecs::from_json(json, &RecordRegistry::new()).unwrap();
        assert_eq!(specs.len(), 3);

        let q = specs.get("q").unwrap();
        assert_eq!(q.lookup_key(), "q-item");
        assert!(q.is_deprecated());
        assert_eq!(q.default_value(), Some(&Value::from(vec!["foo", "bar"])));

        let item = specs.get("item").unwrap();
        assert!(item.is_embed());
        let TypeSpec::Record(record) = item.ty() else { panic!("item should be a record") };
        assert_eq!(record.fields().len(), 4);
        assert!(!record.field("description").unwrap().is_required());
        assert_eq!(record.field("tags").unwrap().default_value(), Some(&Value::Seq(Vec::new())));
    }

    #[test]
    fn datetime_fields_parse_their_defaults() {
        let json = indoc! {r#"
            {
              "records": [
                { "name": "Item", "fields": [
                  { "name": "title", "type": "str" },
                  { "name": "timestamp", "type": "datetime", "default": "2020-01-01T00:00:00Z" }
                ] }
              ],
              "params": [
                { "name": "since", "in": "query", "type": "datetime", "required": false },
                { "name": "item", "in": "body", "type": "Item" }
              ]
            }
        "#};

        let specs = ParamSpecs::from_json(json, &RecordRegistry::new()).unwrap();
        assert_eq!(specs.get("since").unwrap().ty().to_string(), "datetime");

        let TypeSpec::Record(record) = specs.get("item").unwrap().ty() else { panic!("item should be a record") };
        let default = record.field("timestamp").unwrap().default_value().unwrap();
        assert_eq!(default.to_json(), serde_json::json!("2020-01-01T00:00:00+00:00"));
    }

        #[test]
    fn records_extend_registered_bases() {
        let base = RecordSpec::builder("UserBase")
            .field(FieldSpec::new("username", TypeSpec::Str))
            .field(FieldSpec::new("email", TypeSpec::Email))
            .build()
            .unwrap();
        let registry = RecordRegistry::new().with(&base);

        let json = indoc! {r#"
            {
              "records": [
                { "name": "UserIn", "extends": "UserBase", "fields": [ { "name": "password", "type": "str" } ] }
              ],
              "params": [ { "name": "user", "in": "body", "type": "UserIn" } ]
            }
        "#};

        let specs = ParamSpecs::from_json(json, &registry).unwrap();
        let TypeSpec::Record(record) = specs.get("user").unwrap().ty() else { panic!("user should be a record") };
        let names: Vec<_> = record.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["username", "email", "password"]);
    }

    #[test]
    fn unknown_source_tag_is_a_config_error() {
        let json = r#"{ "params": [ { "name": "q", "in": "querystring", "type": "str" } ] }"#;
        let result = ParamSpecs::from_json(json, &RecordRegistry::new());
        assert!(matches!(result, Err(ConfigError::UnknownSource { tag }) if tag == "querystring"));
    }

    #[test]
    fn unknown_type_is_a_config_error() {
        let json = r#"{ "params": [ { "name": "item", "in": "body", "type": "Item" } ] }"#;
        let result = ParamSpecs::from_json(json, &RecordRegistry::new());
        assert!(matches!(result, Err(ConfigError::UnknownType { .. })));
    }

    #[test]
    fn mistyped_default_is_a_config_error() {
        let json = r#"{ "params": [ { "name": "limit", "in": "query", "type": "int", "default": "ten" } ] }"#;
        let result = ParamSpecs::from_json(json, &RecordRegistry::new());
        assert!(matches!(result, Err(ConfigError::InvalidDefault { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{ "params": [ { "name": "q", "in": "query", "type": "str", "maxLength": 3 } ] }"#;
        let result = ParamSpecs::from_json(json, &RecordRegistry::new());
        assert!(matches!(result, Err(ConfigError::InvalidDeclaration { .. })));
    }
}
