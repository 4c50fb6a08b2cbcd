//! Type coercion: raw strings and decoded JSON into [`Value`]s of a declared [`TypeSpec`].

use crate::constraint;
use crate::error::ErrorKind;
use crate::spec::{RecordSpec, TypeSpec};
use crate::value::Value;
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;
use url::Url;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

/// One problem found below a parameter, addressed by `path`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Issue {
    pub(crate) path: Vec<String>,
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    pub(crate) input: Option<Json>,
}

impl Issue {
    fn type_error(path: &[String], message: impl Into<String>, input: &Json) -> Self {
        Self { path: path.to_vec(), kind: ErrorKind::TypeCoercionFailed, message: message.into(), input: Some(input.clone()) }
    }
}

/// Coerces one raw string into a scalar type. The error is a client-facing message.
pub(crate) fn coerce_str(raw: &str, ty: &TypeSpec) -> Result<Value, String> {
    match ty {
        TypeSpec::Str | TypeSpec::Any => Ok(Value::Str(raw.to_string())),
        TypeSpec::Int => raw.parse::<i64>().map(Value::Int).map_err(|_| "value is not a valid integer".to_string()),
        TypeSpec::Float => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err("value is not a valid float".to_string()),
        },
        TypeSpec::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(|| "value could not be parsed to a boolean".to_string()),
        TypeSpec::Email => {
            if EMAIL_REGEX.is_match(raw) {
                Ok(Value::Str(raw.to_string()))
            } else {
                Err("value is not a valid email address".to_string())
            }
        }
        TypeSpec::Url => check_url(raw).map(|()| Value::Str(raw.to_string())),
        TypeSpec::DateTime => {
            DateTime::parse_from_rfc3339(raw).map(Value::DateTime).map_err(|_| "invalid datetime format".to_string())
        }
        other => Err(format!("cannot coerce a string into {other}")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid or missing URL scheme: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("URL scheme not permitted".to_string());
    }
    if !url.has_host() {
        return Err("URL host invalid".to_string());
    }
    Ok(())
}

/// Decodes JSON into `ty`.
///
/// Numbers are accepted from numeric strings, integral floats are accepted as integers, and
/// booleans are accepted from `0`/`1` and the usual string tokens. Records read fields by alias
/// or name, ignore unknown keys, fill defaults and check field constraints.
pub(crate) fn decode(json: &Json, ty: &TypeSpec) -> Result<Value, Vec<Issue>> {
    Decoder::new(false).run(json, ty)
}

/// Like [`decode`], but absent record fields are left out instead of defaulted.
pub(crate) fn decode_set_fields(json: &Json, ty: &TypeSpec) -> Result<Value, Vec<Issue>> {
    Decoder::new(true).run(json, ty)
}

struct Decoder {
    exclude_unset: bool,
    path: Vec<String>,
    issues: Vec<Issue>,
}

impl Decoder {
    fn new(exclude_unset: bool) -> Self {
        Self { exclude_unset, path: Vec::new(), issues: Vec::new() }
    }

    fn run(mut self, json: &Json, ty: &TypeSpec) -> Result<Value, Vec<Issue>> {
        match self.value(json, ty) {
            Some(value) if self.issues.is_empty() => Ok(value),
            _ => Err(self.issues),
        }
    }

    fn fail(&mut self, message: impl Into<String>, input: &Json) -> Option<Value> {
        self.issues.push(Issue::type_error(&self.path, message, input));
        None
    }

    fn nested<T>(&mut self, segment: String, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    fn value(&mut self, json: &Json, ty: &TypeSpec) -> Option<Value> {
        match ty {
            TypeSpec::Any => Some(Value::Json(json.clone())),
            TypeSpec::Str => match json {
                Json::String(s) => Some(Value::Str(s.clone())),
                _ => self.fail("str type expected", json),
            },
            TypeSpec::Email | TypeSpec::Url => match json {
                Json::String(s) => match coerce_str(s, ty) {
                    Ok(value) => Some(value),
                    Err(message) => self.fail(message, json),
                },
                _ => self.fail("str type expected", json),
            },
            TypeSpec::DateTime => match json {
                Json::String(s) => self.parse_scalar(s, ty, json),
                // whole seconds since the Unix epoch
                Json::Number(n) => match n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)) {
                    Some(dt) => Some(Value::DateTime(dt.fixed_offset())),
                    None => self.fail("invalid datetime format", json),
                },
                _ => self.fail("invalid datetime format", json),
            },
            TypeSpec::Int => match json {
                Json::Number(n) => match n.as_i64().or_else(|| integral(n.as_f64())) {
                    Some(i) => Some(Value::Int(i)),
                    None => self.fail("value is not a valid integer", json),
                },
                Json::String(s) => self.parse_scalar(s, ty, json),
                _ => self.fail("value is not a valid integer", json),
            },
            TypeSpec::Float => match json {
                Json::Number(n) => match n.as_f64() {
                    Some(f) => Some(Value::Float(f)),
                    None => self.fail("value is not a valid float", json),
                },
                Json::String(s) => self.parse_scalar(s, ty, json),
                _ => self.fail("value is not a valid float", json),
            },
            TypeSpec::Bool => match json {
                Json::Bool(b) => Some(Value::Bool(*b)),
                Json::Number(n) if n.as_i64() == Some(0) => Some(Value::Bool(false)),
                Json::Number(n) if n.as_i64() == Some(1) => Some(Value::Bool(true)),
                Json::String(s) => self.parse_scalar(s, ty, json),
                _ => self.fail("value could not be parsed to a boolean", json),
            },
            TypeSpec::File | TypeSpec::Bytes => self.fail(format!("{ty} values cannot be sent as JSON"), json),
            TypeSpec::Seq(item) => match json {
                Json::Array(items) => self.seq(items, item),
                _ => self.fail("value is not a valid list", json),
            },
            TypeSpec::Map(key, value) => match json {
                Json::Object(object) => self.map(object, key, value),
                _ => self.fail("value is not a valid dict", json),
            },
            TypeSpec::Record(record) => match json {
                Json::Object(object) => self.record(object, record),
                _ => self.fail("value is not a valid dict", json),
            },
        }
    }

    fn parse_scalar(&mut self, raw: &str, ty: &TypeSpec, json: &Json) -> Option<Value> {
        match coerce_str(raw, ty) {
            Ok(value) => Some(value),
            Err(message) => self.fail(message, json),
        }
    }

    fn seq(&mut self, items: &[Json], item: &TypeSpec) -> Option<Value> {
        let mut values = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, json) in items.iter().enumerate() {
            match self.nested(i.to_string(), |d| d.value(json, item)) {
                Some(value) => values.push(value),
                None => ok = false,
            }
        }
        ok.then_some(Value::Seq(values))
    }

    fn map(&mut self, object: &serde_json::Map<String, Json>, key_ty: &TypeSpec, value_ty: &TypeSpec) -> Option<Value> {
        let mut entries = Vec::with_capacity(object.len());
        let mut ok = true;
        for (raw_key, json) in object {
            let entry = self.nested(raw_key.clone(), |d| {
                let key = match coerce_str(raw_key, key_ty) {
                    Ok(key) => Some(key),
                    Err(message) => d.fail(message, &Json::String(raw_key.clone())),
                };
                let value = d.value(json, value_ty);
                key.zip(value)
            });
            match entry {
                Some(entry) => entries.push(entry),
                None => ok = false,
            }
        }
        ok.then_some(Value::Map(entries))
    }

    fn record(&mut self, object: &serde_json::Map<String, Json>, record: &RecordSpec) -> Option<Value> {
        let mut fields = Vec::with_capacity(record.fields().len());
        let mut ok = true;
        for field in record.fields() {
            let key = field.key();
            let value = match object.get(key) {
                None if field.is_required() => {
                    self.nested(key.to_string(), |d| {
                        d.issues.push(Issue {
                            path: d.path.clone(),
                            kind: ErrorKind::MissingRequired,
                            message: "field required".to_string(),
                            input: None,
                        });
                    });
                    None
                }
                None if self.exclude_unset => continue,
                None => Some(field.default_value().cloned().unwrap_or(Value::Null)),
                Some(Json::Null) if field.is_required() => {
                    self.nested(key.to_string(), |d| d.fail("none is not an allowed value", &Json::Null))
                }
                Some(Json::Null) => Some(Value::Null),
                Some(json) => self.nested(key.to_string(), |d| {
                    let value = d.value(json, field.ty())?;
                    let violations = constraint::check(&value, field.constraints());
                    if violations.is_empty() {
                        return Some(value);
                    }
                    for mut issue in violations {
                        issue.path.splice(0..0, d.path.iter().cloned());
                        d.issues.push(issue);
                    }
                    None
                }),
            };
            match value {
                Some(value) => fields.push((field.name().to_string(), value)),
                None => ok = false,
            }
        }
        ok.then_some(Value::Record(fields))
    }
}

#[allow(clippy::cast_possible_truncation, reason = "range and fraction are checked first")]
fn integral(f: Option<f64>) -> Option<i64> {
    let f = f?;
    (f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0).then(|| f as i64)
}
