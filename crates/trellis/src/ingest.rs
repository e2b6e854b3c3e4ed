//! Routing a request and setting up its state in one step.

use trellis_core::{Handler, Method, Result};
use trellis_http::{BodyReader, Receive, RequestState};
use trellis_router::{Endpoint, Router};

/// A request that matched an endpoint.
#[derive(Debug)]
pub struct Routed<'a, H, R> {
    /// The matched endpoint.
    pub endpoint: &'a Endpoint<H>,
    /// State for the rest of the request, path parameters already typed.
    pub request: RequestState<R>,
}

impl<'a, H, R> Routed<'a, H, R> {
    /// The endpoint's handler.
    #[must_use]
    pub fn handler(&self) -> &'a H {
        self.endpoint.handler()
    }
}

/// Resolve `target` (path plus optional `?query`) and wrap the body.
///
/// No body bytes are read here.
///
/// # Errors
///
/// `NotFound`, `MethodNotAllowed` or `Validation` from routing and path
/// conversion.
pub fn route_request<'a, H, R>(
    router: &'a Router<H>,
    method: Method,
    target: &str,
    content_type: Option<&str>,
    reader: BodyReader<R>,
) -> Result<Routed<'a, H, R>>
where
    H: Handler,
    R: Receive,
{
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let resolved = router.resolve(path, method)?;
    tracing::trace!(%method, path, endpoint = resolved.endpoint.path(), "request routed");

    let mut request = RequestState::new(method, path, reader).with_params(resolved.params);
    if let Some(query) = query {
        request = request.with_query(query);
    }
    if let Some(content_type) = content_type {
        request = request.with_content_type(content_type);
    }
    Ok(Routed {
        endpoint: resolved.endpoint,
        request,
    })
}
