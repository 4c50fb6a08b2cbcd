//! Request information available to handlers and responders.
//!
//! - `RequestContext`: the request head and the matched path parameters
//! - `PathParams`: the values matched by a route template

use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use matchit::Params;

/// The head of a routed request together with its path parameters.
///
/// The lifetimes tie the context to the router (`'router`) and to the request (`'req`) it was
/// created for.
#[derive(Debug)]
pub struct RequestContext<'router: 'req, 'req> {
    parts: &'req Parts,
    path_params: &'req PathParams<'router, 'req>,
}

impl<'router, 'req> RequestContext<'router, 'req> {
    pub fn new(parts: &'req Parts, path_params: &'req PathParams<'router, 'req>) -> Self {
        Self { parts, path_params }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn path_params(&self) -> &PathParams<'router, 'req> {
        self.path_params
    }
}

/// Values matched by the route template, e.g. `item_id` in `/items/{item_id}`.
#[derive(Debug, Clone)]
pub struct PathParams<'router, 'req> {
    kind: PathParamsKind<'router, 'req>,
}

#[derive(Debug, Clone)]
enum PathParamsKind<'router, 'req> {
    None,
    Params(Params<'router, 'req>),
}

impl<'router, 'req> PathParams<'router, 'req> {
    #[inline]
    fn new(params: Params<'router, 'req>) -> Self {
        if params.is_empty() { Self::empty() } else { Self { kind: PathParamsKind::Params(params) } }
    }

    #[inline]
    pub fn empty() -> Self {
        Self { kind: PathParamsKind::None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            PathParamsKind::None => true,
            PathParamsKind::Params(params) => params.is_empty(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.kind {
            PathParamsKind::None => 0,
            PathParamsKind::Params(params) => params.len(),
        }
    }

    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&'req str> {
        match &self.kind {
            PathParamsKind::Params(params) => params.get(key),
            PathParamsKind::None => None,
        }
    }

    /// Name and value pairs in template order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match &self.kind {
            PathParamsKind::Params(params) => params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            PathParamsKind::None => Vec::new(),
        }
    }
}

impl<'router, 'req> From<Params<'router, 'req>> for PathParams<'router, 'req> {
    fn from(params: Params<'router, 'req>) -> Self {
        PathParams::new(params)
    }
}
