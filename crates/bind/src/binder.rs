//! The binder: raw request data in, typed and validated parameters (or every problem) out.
//!
//! Sources are visited in a fixed order: path, query, header, cookie, body, then form and file
//! parameters as one group. Within a group parameters are visited in declaration order, so the
//! error list is deterministic for a given spec and request.

use crate::coerce::{self, Issue};
use crate::config::BindConfig;
use crate::constraint;
use crate::error::{BindingErrors, ErrorKind, FieldError};
use crate::form::{FormData, parse_form};
use crate::request::{RequestDescriptor, UploadPart};
use crate::spec::{ParamSpec, ParamSpecs, Source, TypeSpec};
use crate::value::{BoundParams, UploadedFile, Value};
use bytes::Bytes;
use serde_json::Value as Json;
use std::io::Read;
use tracing::{debug, trace};

/// Binds requests under a [`BindConfig`].
///
/// A binder holds no per-request state; one instance can serve any number of concurrent
/// requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binder {
    config: BindConfig,
}

/// Binds `request` against `specs` with the default [`BindConfig`].
///
/// # Errors
/// Every [`FieldError`] found, in processing order.
pub fn bind(specs: &ParamSpecs, request: &RequestDescriptor) -> Result<BoundParams, BindingErrors> {
    Binder::default().bind(specs, request)
}

impl Binder {
    pub fn new(config: BindConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// Binds `request` against `specs`.
    ///
    /// Client mistakes never abort binding: each one becomes a [`FieldError`] and the remaining
    /// parameters are still processed.
    ///
    /// # Errors
    /// Every [`FieldError`] found, in processing order.
    pub fn bind(&self, specs: &ParamSpecs, request: &RequestDescriptor) -> Result<BoundParams, BindingErrors> {
        let mut run = Run { config: &self.config, request, slots: vec![None; specs.len()], errors: Vec::new() };

        for source in [Source::Path, Source::Query, Source::Header, Source::Cookie] {
            for (slot, spec) in specs.iter().enumerate().filter(|(_, spec)| spec.source() == source) {
                run.bind_simple(slot, spec);
            }
        }
        run.bind_body(specs);
        run.bind_form(specs);

        debug!(params = specs.len(), errors = run.errors.len(), "bind request");

        if let Some(errors) = BindingErrors::from_errors(run.errors) {
            return Err(errors);
        }
        let mut bound = BoundParams::with_capacity(specs.len());
        for (spec, value) in specs.iter().zip(run.slots) {
            bound.push(spec.name(), value.unwrap_or(Value::Null));
        }
        Ok(bound)
    }
}

/// State of one bind call.
struct Run<'a> {
    config: &'a BindConfig,
    request: &'a RequestDescriptor,
    slots: Vec<Option<Value>>,
    errors: Vec<FieldError>,
}

impl Run<'_> {
    fn bind_simple(&mut self, slot: usize, spec: &ParamSpec) {
        let key = spec.lookup_key();
        let request = self.request;
        let raws: Vec<&str> = match spec.source() {
            Source::Path => request.path_param(&key).into_iter().collect(),
            Source::Query => request.query_values(&key).collect(),
            Source::Header => request.header_values(&key).collect(),
            Source::Cookie => request.cookie(&key).into_iter().collect(),
            _ => return,
        };
        self.slots[slot] = self.bind_strings(spec, &raws);
    }

    /// Binds the raw occurrences of one key. Query and form scalars take the last occurrence,
    /// every other source the first.
    fn bind_strings(&mut self, spec: &ParamSpec, raws: &[&str]) -> Option<Value> {
        let ty = spec.ty();
        if let TypeSpec::Seq(item) = ty {
            if raws.is_empty() {
                return Some(self.absent_seq(spec));
            }
            self.supplied(spec);
            let mut items = Vec::with_capacity(raws.len());
            for (i, raw) in raws.iter().enumerate() {
                match coerce::coerce_str(raw, item) {
                    Ok(value) => items.push(value),
                    Err(message) => self.push(
                        FieldError::new(spec.name(), spec.source(), ErrorKind::TypeCoercionFailed, message)
                            .with_path(vec![i.to_string()])
                            .with_input(*raw),
                    ),
                }
            }
            if items.len() != raws.len() {
                return None;
            }
            return self.checked(spec, Value::Seq(items));
        }

        let raw = match spec.source() {
            Source::Query | Source::Form => raws.last(),
            _ => raws.first(),
        };
        let Some(raw) = raw else {
            return self.absent(spec);
        };
        self.supplied(spec);
        match coerce::coerce_str(raw, ty) {
            Ok(value) => self.checked(spec, value),
            Err(message) => {
                self.push(FieldError::new(spec.name(), spec.source(), ErrorKind::TypeCoercionFailed, message).with_input(*raw));
                None
            }
        }
    }

    fn bind_body(&mut self, specs: &ParamSpecs) {
        let params: Vec<(usize, &ParamSpec)> =
            specs.iter().enumerate().filter(|(_, spec)| spec.source() == Source::Body).collect();
        let [(slot, first), ..] = params.as_slice() else { return };

        let json = match self.body_json() {
            Ok(json) => json,
            Err(message) => {
                self.push(FieldError::whole(Source::Body, ErrorKind::MalformedBody, message));
                return;
            }
        };

        if params.len() == 1 && !first.is_embed() {
            self.slots[*slot] = self.bind_json(first, json.as_ref());
            return;
        }

        let object = match &json {
            None => None,
            Some(Json::Object(object)) => Some(object),
            Some(other) => {
                self.push(
                    FieldError::whole(Source::Body, ErrorKind::TypeCoercionFailed, "value is not a valid dict")
                        .with_input(other.clone()),
                );
                return;
            }
        };
        for (slot, spec) in params {
            let value = object.and_then(|object| object.get(spec.lookup_key().as_ref()));
            self.slots[slot] = self.bind_json(spec, value);
        }
    }

    /// The body decoded as JSON, `None` when there is no body at all.
    fn body_json(&self) -> Result<Option<Json>, String> {
        let Some(body) = self.request.body() else { return Ok(None) };
        if body.bytes().is_empty() {
            return Ok(None);
        }
        let limit = self.config.body_limit();
        if body.bytes().len() > limit {
            return Err(format!("request body exceeds {limit} bytes"));
        }
        if let Some(content_type) = body.content_type() {
            let json = content_type.subtype() == mime::JSON || content_type.suffix().is_some_and(|suffix| suffix == mime::JSON);
            if !json {
                return Err(format!("unsupported content type `{}`, expected JSON", content_type.essence_str()));
            }
        }
        serde_json::from_slice(body.bytes()).map(Some).map_err(|e| format!("invalid JSON: {e}"))
    }

    fn bind_json(&mut self, spec: &ParamSpec, json: Option<&Json>) -> Option<Value> {
        match json {
            None => self.absent(spec),
            Some(Json::Null) if spec.is_required() => {
                self.push(
                    FieldError::new(spec.name(), spec.source(), ErrorKind::TypeCoercionFailed, "none is not an allowed value")
                        .with_input(Json::Null),
                );
                None
            }
            Some(Json::Null) => Some(Value::Null),
            Some(json) => {
                self.supplied(spec);
                match coerce::decode(json, spec.ty()) {
                    Ok(value) => self.checked(spec, value),
                    Err(issues) => {
                        self.push_issues(spec, issues);
                        None
                    }
                }
            }
        }
    }

    fn bind_form(&mut self, specs: &ParamSpecs) {
        if !specs.has_form_sources() {
            return;
        }
        let request = self.request;
        let parsed: FormData;
        let (fields, files) = match (request.form(), request.body()) {
            (Some(fields), _) => (fields, request.files()),
            (None, Some(body)) if !body.bytes().is_empty() => {
                let limit = self.config.body_limit();
                if body.bytes().len() > limit {
                    self.push(FieldError::whole(Source::Form, ErrorKind::MalformedBody, format!("request body exceeds {limit} bytes")));
                    return;
                }
                match parse_form(body, self.config.form_field_limit()) {
                    Ok(data) => {
                        parsed = data;
                        (parsed.fields.as_slice(), parsed.files.as_slice())
                    }
                    Err(e) => {
                        self.push(FieldError::whole(Source::Form, ErrorKind::MalformedBody, e.to_string()));
                        return;
                    }
                }
            }
            (None, _) => (&[][..], &[][..]),
        };

        for (slot, spec) in specs.iter().enumerate() {
            let key = spec.lookup_key();
            match spec.source() {
                Source::Form => {
                    let raws: Vec<&str> =
                        fields.iter().filter(|(name, _)| *name == key).map(|(_, value)| value.as_str()).collect();
                    self.slots[slot] = self.bind_strings(spec, &raws);
                }
                Source::File => {
                    // browsers send an empty filename when no file was chosen
                    let parts: Vec<&UploadPart> =
                        files.iter().filter(|part| part.field() == key && !part.filename().is_empty()).collect();
                    let text = fields.iter().find(|(name, value)| *name == key && !value.is_empty()).map(|(_, v)| v.as_str());
                    self.slots[slot] = self.bind_files(spec, &parts, text);
                }
                _ => {}
            }
        }
    }

    fn bind_files(&mut self, spec: &ParamSpec, parts: &[&UploadPart], text: Option<&str>) -> Option<Value> {
        if parts.is_empty() {
            if let Some(text) = text {
                self.push(
                    FieldError::new(spec.name(), spec.source(), ErrorKind::TypeCoercionFailed, "expected an uploaded file")
                        .with_input(text),
                );
                return None;
            }
            return if spec.ty().is_seq() { Some(self.absent_seq(spec)) } else { self.absent(spec) };
        }

        self.supplied(spec);
        let element = spec.ty().element();
        if !spec.ty().is_seq() {
            return match self.read_upload(parts[0], element) {
                Ok(value) => self.checked(spec, value),
                Err(message) => {
                    self.push(
                        FieldError::new(spec.name(), spec.source(), ErrorKind::UploadFailed, message).with_input(parts[0].filename()),
                    );
                    None
                }
            };
        }

        let mut items = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            match self.read_upload(part, element) {
                Ok(value) => items.push(value),
                Err(message) => self.push(
                    FieldError::new(spec.name(), spec.source(), ErrorKind::UploadFailed, message)
                        .with_path(vec![i.to_string()])
                        .with_input(part.filename()),
                ),
            }
        }
        if items.len() != parts.len() {
            return None;
        }
        self.checked(spec, Value::Seq(items))
    }

    /// Reads one upload fully. The reader is dropped before returning on every path.
    fn read_upload(&self, part: &UploadPart, ty: &TypeSpec) -> Result<Value, String> {
        let limit = self.config.file_limit();
        let mut data = Vec::new();
        {
            let reader = part.source().open().map_err(|e| format!("could not open upload: {e}"))?;
            let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
            reader.take(cap).read_to_end(&mut data).map_err(|e| format!("could not read upload: {e}"))?;
        }
        if data.len() > limit {
            return Err(format!("file exceeds {limit} bytes"));
        }
        trace!(field = part.field(), filename = part.filename(), size = data.len(), "read upload");

        let data = Bytes::from(data);
        Ok(match ty {
            TypeSpec::Bytes => Value::Bytes(data),
            _ => Value::File(UploadedFile::new(part.filename(), part.content_type().map(str::to_string), data)),
        })
    }

    fn absent(&mut self, spec: &ParamSpec) -> Option<Value> {
        if spec.is_required() {
            self.push(FieldError::missing(spec.name(), spec.source()));
            return None;
        }
        trace!(param = spec.name(), "use default");
        Some(spec.default_value().cloned().unwrap_or(Value::Null))
    }

    /// A wholly absent sequence binds to its default, or an empty sequence, even when required.
    fn absent_seq(&self, spec: &ParamSpec) -> Value {
        match spec.default_value() {
            Some(default) => default.clone(),
            None if spec.is_required() => Value::Seq(Vec::new()),
            None => Value::Null,
        }
    }

    fn supplied(&self, spec: &ParamSpec) {
        if spec.is_deprecated() {
            debug!(param = spec.name(), source = %spec.source(), "deprecated parameter supplied");
        }
    }

    fn checked(&mut self, spec: &ParamSpec, value: Value) -> Option<Value> {
        let issues = constraint::check(&value, spec.constraints());
        if issues.is_empty() {
            return Some(value);
        }
        self.push_issues(spec, issues);
        None
    }

    fn push_issues(&mut self, spec: &ParamSpec, issues: Vec<Issue>) {
        for issue in issues {
            let mut error = FieldError::new(spec.name(), spec.source(), issue.kind, issue.message).with_path(issue.path);
            if let Some(input) = issue.input {
                error = error.with_input(input);
            }
            self.push(error);
        }
    }

    fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }
}
