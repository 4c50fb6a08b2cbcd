//! HTTP adapter for `micro-bind`.
//!
//! Routes `http::Request`s to handlers, binds each request's parameters with a
//! [`micro_bind::Binder`] before the handler runs, and renders binding failures as `422`
//! responses listing every problem. Handler output can be projected through a
//! [`ResponseModel`].

mod descriptor;
mod error;
mod handler;
mod request;
mod responder;
mod response_model;

pub mod router;

pub use descriptor::collect;
pub use error::ApiError;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use request::PathParams;
pub use request::RequestContext;
pub use responder::Json;
pub use responder::Responder;
pub use responder::ResponseBody;
pub use response_model::ResponseModel;
pub use router::Router;
