use crate::RequestContext;
use crate::responder::{Responder, ResponseBody};
use async_trait::async_trait;
use http::Response;
use micro_bind::BoundParams;
use std::fmt;

/// Invoked once the request's parameters have been bound and validated.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: &RequestContext<'_, '_>, params: BoundParams) -> Response<ResponseBody>;
}

/// Holds any async fn taking the bound parameters.
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(BoundParams) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(BoundParams) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn invoke(&self, req: &RequestContext<'_, '_>, params: BoundParams) -> Response<ResponseBody> {
        let responder = (self.f)(params).await;
        responder.response_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PathParams;
    use http::Request;
    use http_body_util::BodyExt;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    #[test]
    fn async_fns_are_handlers() {
        async fn read_items(_params: BoundParams) -> &'static str {
            "items"
        }

        assert_is_handler(&handler_fn(read_items));
        assert_is_handler(&handler_fn(|params: BoundParams| async move { params.len().to_string() }));
    }

    #[tokio::test]
    async fn invoke_calls_the_fn() {
        let handler = handler_fn(|params: BoundParams| async move { format!("{} params", params.len()) });

        let parts = Request::builder().body(()).unwrap().into_parts().0;
        let path_params = PathParams::empty();
        let req = RequestContext::new(&parts, &path_params);
        let response = handler.invoke(&req, BoundParams::default()).await;

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "0 params");
    }
}
