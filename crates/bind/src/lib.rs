//! Request binding and validation
//!
//! This crate turns the raw parts of an HTTP request (path segments, query string, headers,
//! cookies, body, form fields and uploaded files) into typed, validated handler parameters,
//! or into the complete list of problems found. It does no I/O of its own beyond reading
//! upload streams, and is independent of any HTTP server.
//!
//! # Features
//!
//! - Declarative parameter specs built once per route, in code or from JSON
//! - Coercion into ints, floats, booleans, e-mail addresses, URLs, sequences, maps and nested
//!   records
//! - Numeric, length, pattern and allowed-value constraints, checked in a fixed order
//! - Error aggregation: every failing parameter is reported, never just the first
//! - JSON bodies, single or embedded, and url-encoded or multipart forms with file uploads
//! - Response shaping through the same type declarations
//!
//! # Example
//!
//! ```
//! use micro_bind::spec::{FieldSpec, ParamSpec, ParamSpecs, RecordSpec, TypeSpec};
//! use micro_bind::{ErrorKind, RequestDescriptor, Value, bind};
//! use serde_json::json;
//!
//! let item = RecordSpec::builder("Item")
//!     .field(FieldSpec::new("name", TypeSpec::Str))
//!     .field(FieldSpec::new("price", TypeSpec::Float).gt(0))
//!     .build()
//!     .unwrap();
//!
//! let specs = ParamSpecs::new([
//!     ParamSpec::path("item_id", TypeSpec::Int),
//!     ParamSpec::query("q", TypeSpec::Str).optional(),
//!     ParamSpec::body("item", TypeSpec::record(&item)),
//! ])
//! .unwrap();
//!
//! let request = RequestDescriptor::builder()
//!     .path_param("item_id", "5")
//!     .json(&json!({"name": "Foo", "price": 42.0}))
//!     .build();
//! let bound = bind(&specs, &request).unwrap();
//! assert_eq!(bound.get("item_id"), Some(&Value::Int(5)));
//! assert_eq!(bound.get("q"), Some(&Value::Null));
//!
//! let request = RequestDescriptor::builder()
//!     .path_param("item_id", "five")
//!     .json(&json!({"price": 0}))
//!     .build();
//! let errors = bind(&specs, &request).unwrap_err();
//! assert_eq!(errors.len(), 3);
//! assert_eq!(errors.as_slice()[1].kind(), ErrorKind::MissingRequired);
//! ```

mod binder;
mod coerce;
mod config;
mod constraint;
mod error;
mod shape;
mod value;

pub mod form;
pub mod request;
pub mod spec;

pub use binder::Binder;
pub use binder::bind;
pub use config::BindConfig;
pub use error::BindingErrors;
pub use error::ConfigError;
pub use error::ConstraintKind;
pub use error::ErrorKind;
pub use error::FieldError;
pub use request::RequestDescriptor;
pub use request::UploadPart;
pub use shape::ShapeOptions;
pub use shape::shape;
pub use value::BoundParams;
pub use value::UploadedFile;
pub use value::Value;
