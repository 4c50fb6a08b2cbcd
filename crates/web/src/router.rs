//! Path routing and the bind-then-invoke request flow.
//!
//! Routes are registered per path template and method on a [`RouterBuilder`]:
//!
//! ```
//! use micro_bind::spec::{ParamSpec, ParamSpecs, TypeSpec};
//! use micro_bind::BoundParams;
//! use micro_bind_web::handler_fn;
//! use micro_bind_web::router::{Router, get};
//!
//! async fn read_item(params: BoundParams) -> String {
//!     format!("item {:?}", params.get("item_id"))
//! }
//!
//! let router = Router::builder()
//!     .route(
//!         "/items/{item_id}",
//!         get(handler_fn(read_item)).params(ParamSpecs::new([ParamSpec::path("item_id", TypeSpec::Int)]).unwrap()),
//!     )
//!     .build()
//!     .unwrap();
//! # let _ = router;
//! ```

use crate::RequestContext;
use crate::descriptor;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::request::PathParams;
use crate::responder::ResponseBody;
use crate::response_model::ResponseModel;
use http::{Method, Request, Response};
use http_body::Body;
use micro_bind::spec::{ParamSpecs, Source};
use micro_bind::{BindConfig, Binder, ConfigError};
use std::error::Error;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

type InnerRouter<T> = matchit::Router<T>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("invalid route: {0}")]
    Insert(#[from] matchit::InsertError),

    #[error("route `{route}`: {source}")]
    Config { route: String, source: ConfigError },
}

pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
    binder: Binder,
}

pub struct RouterItem {
    method: Method,
    params: ParamSpecs,
    handler: Box<dyn RequestHandler>,
    model: Option<ResponseModel>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Items registered for the template matching `path`, with the matched values.
    pub fn at<'router, 'req>(&'router self, path: &'req str) -> Option<(&'router [RouterItem], PathParams<'router, 'req>)> {
        self.inner_router
            .at(path)
            .map(|matched| (matched.value.as_slice(), matched.params.into()))
            .map_err(|e| error!("match {} error: {}", path, e))
            .ok()
    }

    /// Routes the request, binds its parameters and invokes the handler.
    ///
    /// Failures before the handler runs become error responses: `404` for an unknown path,
    /// `405` for an unregistered method, `413`/`400` for unreadable bodies and `422` listing
    /// every binding error.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        let Some((items, path_params)) = self.at(parts.uri.path()) else {
            return ApiError::NotFound { path: parts.uri.path().to_string() }.into_response();
        };
        let Some(item) = items.iter().find(|item| item.method == parts.method) else {
            return ApiError::MethodNotAllowed { method: parts.method.clone() }.into_response();
        };

        let descriptor = match descriptor::collect(&parts, body, &path_params, self.binder.config().body_limit()).await {
            Ok(descriptor) => descriptor,
            Err(e) => return e.into_response(),
        };

        let params = match self.binder.bind(&item.params, &descriptor) {
            Ok(params) => params,
            Err(errors) => {
                debug!(method = %parts.method, path = parts.uri.path(), errors = errors.len(), "reject request");
                return ApiError::from(errors).into_response();
            }
        };

        let req = RequestContext::new(&parts, &path_params);
        let response = item.handler.invoke(&req, params).await;
        match &item.model {
            Some(model) => model.apply(response).await,
            None => response,
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("binder", &self.binder).finish_non_exhaustive()
    }
}

impl RouterItem {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn params(&self) -> &ParamSpecs {
        &self.params
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    pub fn response_model(&self) -> Option<&ResponseModel> {
        self.model.as_ref()
    }
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem")
            .field("method", &self.method)
            .field("params", &self.params.len())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct RouterBuilder {
    routes: Vec<(String, Vec<RouterItemBuilder>)>,
    config: BindConfig,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: Vec::new(), config: BindConfig::default() }
    }

    #[must_use]
    pub fn route(mut self, route: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        let route = route.into();
        match self.routes.iter_mut().find(|(path, _)| *path == route) {
            Some((_, items)) => items.push(item_builder),
            None => self.routes.push((route, vec![item_builder])),
        }
        self
    }

    /// Limits applied while collecting and binding request data.
    #[must_use]
    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    /// # Errors
    /// When a template is rejected by the path matcher or declares a path parameter it does
    /// not contain.
    pub fn build(self) -> Result<Router, RouterError> {
        let mut inner_router = InnerRouter::new();

        for (path, items) in self.routes {
            let names = template_params(&path);
            for item in &items {
                if let Some(spec) = item.params.from_source(Source::Path).find(|spec| !names.contains(&spec.lookup_key().as_ref())) {
                    let source = ConfigError::UnknownPathParam { name: spec.name().to_string(), route: path.clone() };
                    error!(route = %path, error = %source, "invalid route");
                    return Err(RouterError::Config { route: path, source });
                }
            }

            let router_items = items.into_iter().map(RouterItemBuilder::build).collect::<Vec<_>>();
            inner_router.insert(path, router_items).map_err(|e| {
                error!(error = %e, "insert route error");
                e
            })?;
        }

        Ok(Router { inner_router, binder: Binder::new(self.config) })
    }
}

/// Names of the `{name}` and `{*name}` segments of a template.
fn template_params(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let tail = &rest[start + 1..];
        if let Some(stripped) = tail.strip_prefix('{') {
            rest = stripped;
            continue;
        }
        let Some(end) = tail.find('}') else { break };
        names.push(tail[..end].trim_start_matches('*'));
        rest = &tail[end + 1..];
    }
    names
}

macro_rules! method_router {
    ($method:ident, $method_value:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
            RouterItemBuilder::new(Method::$method_value, handler)
        }
    };
}

method_router!(get, GET);
method_router!(post, POST);
method_router!(put, PUT);
method_router!(delete, DELETE);
method_router!(head, HEAD);
method_router!(options, OPTIONS);
method_router!(patch, PATCH);
method_router!(trace, TRACE);

pub struct RouterItemBuilder {
    method: Method,
    params: ParamSpecs,
    handler: Box<dyn RequestHandler>,
    model: Option<ResponseModel>,
}

impl RouterItemBuilder {
    fn new<H: RequestHandler + 'static>(method: Method, handler: H) -> Self {
        Self { method, params: ParamSpecs::empty(), handler: Box::new(handler), model: None }
    }

    /// Parameters bound before the handler is invoked.
    #[must_use]
    pub fn params(mut self, params: ParamSpecs) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn response_model(mut self, model: ResponseModel) -> Self {
        self.model = Some(model);
        self
    }

    fn build(self) -> RouterItem {
        RouterItem { method: self.method, params: self.params, handler: self.handler, model: self.model }
    }
}

impl fmt::Debug for RouterItemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItemBuilder").field("method", &self.method).finish_non_exhaustive()
    }
}
