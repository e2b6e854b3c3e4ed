//! The router.
//!
//! Routers are built in a registration phase (`&mut self`) and then only
//! read. Each router owns its endpoints; sub-routers are shared with
//! [`Arc`] so including a router copies references, not tables.
//!
//! A sub-router's endpoints stay registered under the sub-router's own
//! prefix. On lookup the longest registered prefix that is a whole-segment
//! prefix of the path selects the sub-router, and the matched part of the
//! path is rewritten to that sub-router's prefix.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use trellis_core::{Converter, Error, Handler, PathParams, Result};
use trellis_types::Method;

use crate::endpoint::Endpoint;
use crate::pattern::RoutePattern;
use crate::r#match::{RawParams, RouteLookup};

/// Methods registered by [`Router::route`].
pub const DEFAULT_ROUTE_METHODS: [Method; 2] = [Method::Get, Method::Head];

/// A matched endpoint with converted parameters.
#[derive(Debug)]
pub struct Resolved<'a, H> {
    /// The matched endpoint.
    pub endpoint: &'a Endpoint<H>,
    /// Typed path parameters.
    pub params: PathParams,
}

/// A prefix-composable route table.
#[derive(Debug)]
pub struct Router<H> {
    prefix: String,
    endpoints: Vec<Endpoint<H>>,
    by_path: HashMap<String, usize>,
    dynamic: Vec<usize>,
    sub_routers: HashMap<String, Arc<Router<H>>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            endpoints: Vec::new(),
            by_path: HashMap::new(),
            dynamic: Vec::new(),
            sub_routers: HashMap::new(),
        }
    }
}

impl<H> Router<H> {
    /// A router without a prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A router whose endpoints all live under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoute` unless `prefix` starts with `/` and does not
    /// end with `/`.
    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if !prefix.starts_with('/') {
            return Err(Error::invalid_route(format!(
                "URL prefix '{prefix}' must start with '/'"
            )));
        }
        if prefix.ends_with('/') {
            return Err(Error::invalid_route(format!(
                "URL prefix '{prefix}' should not end with '/'"
            )));
        }
        Ok(Self {
            prefix,
            ..Self::default()
        })
    }

    /// The URL prefix; empty for a root router.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Endpoints in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint<H>> {
        self.endpoints.iter()
    }

    /// Registered sub-router prefixes, sorted.
    #[must_use]
    pub fn sub_router_prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.sub_routers.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// Include a sub-router.
    ///
    /// Registers `router` under `self.prefix + router.prefix`, and every
    /// sub-router it already contains under `self.prefix` plus that
    /// sub-router's key. All keys are checked before any is inserted, so a
    /// failed include leaves `self` unchanged.
    ///
    /// # Errors
    ///
    /// * `InvalidRoute` if `router` has no prefix.
    /// * `DuplicateRegistration` if any composed prefix is already taken.
    pub fn include_router(&mut self, router: impl Into<Arc<Router<H>>>) -> Result<()> {
        let router = router.into();
        if router.prefix.is_empty() {
            return Err(Error::invalid_route("URL prefix required for sub-router"));
        }

        let mut entries = Vec::with_capacity(router.sub_routers.len() + 1);
        entries.push((format!("{}{}", self.prefix, router.prefix), Arc::clone(&router)));
        for (key, nested) in &router.sub_routers {
            entries.push((format!("{}{key}", self.prefix), Arc::clone(nested)));
        }

        if let Some((key, _)) = entries
            .iter()
            .find(|(key, _)| self.sub_routers.contains_key(key))
        {
            return Err(Error::duplicate(format!(
                "router with prefix '{key}' already exists"
            )));
        }

        for (key, sub) in entries {
            tracing::debug!(prefix = %key, endpoints = sub.endpoints.len(), "router included");
            self.sub_routers.insert(key, sub);
        }
        Ok(())
    }

    /// Look up the endpoint for `path`.
    ///
    /// With `method` set, a matched endpoint that does not accept it yields
    /// [`RouteLookup::UnsupportedMethod`].
    #[must_use]
    pub fn find(&self, path: &str, method: Option<Method>) -> RouteLookup<'_, H> {
        let (router, path) = match self.sub_router_for(path) {
            Some((matched, sub)) => {
                let rewritten = format!("{}{}", sub.prefix, &path[matched.len()..]);
                (sub.as_ref(), Cow::Owned(rewritten))
            }
            None => (self, Cow::Borrowed(path)),
        };
        let lookup = router.find_local(&path, method);
        tracing::trace!(path = %path, code = ?lookup.code(), "route lookup");
        lookup
    }

    /// Longest registered sub-router prefix covering `path`.
    fn sub_router_for(&self, path: &str) -> Option<(&str, &Arc<Router<H>>)> {
        if self.sub_routers.is_empty() {
            return None;
        }
        let mut candidate = path;
        loop {
            if let Some((key, sub)) = self.sub_routers.get_key_value(candidate) {
                return Some((key.as_str(), sub));
            }
            candidate = &candidate[..candidate.rfind('/')?];
        }
    }

    fn find_local(&self, path: &str, method: Option<Method>) -> RouteLookup<'_, H> {
        let matched = self
            .by_path
            .get(path)
            .map(|&idx| &self.endpoints[idx])
            .filter(|endpoint| endpoint.pattern().is_static())
            .map(|endpoint| (endpoint, RawParams::default()))
            .or_else(|| {
                self.dynamic.iter().find_map(|&idx| {
                    let endpoint = &self.endpoints[idx];
                    endpoint
                        .pattern()
                        .match_path(path)
                        .map(|captures| (endpoint, RawParams::from_captures(captures)))
                })
            });

        let Some((endpoint, params)) = matched else {
            return RouteLookup::NotFound;
        };

        match method {
            Some(m) if !endpoint.allows(m) => RouteLookup::UnsupportedMethod {
                allowed: endpoint.methods(),
            },
            _ => RouteLookup::Found { endpoint, params },
        }
    }

    /// Find the endpoint and convert its path parameters.
    ///
    /// # Errors
    ///
    /// `NotFound`, `MethodNotAllowed`, or the first converter failure.
    pub fn resolve(&self, path: &str, method: Method) -> Result<Resolved<'_, H>> {
        let (endpoint, raw) = self.find(path, Some(method)).into_result(path)?;
        let params = endpoint.convert(&raw)?;
        Ok(Resolved { endpoint, params })
    }
}

impl<H: Handler> Router<H> {
    /// Register `handler` at `self.prefix + path` for `methods`.
    ///
    /// Method names are case-insensitive and deduplicated. Registering an
    /// existing path merges the new methods into the existing endpoint and
    /// keeps the original handler.
    ///
    /// # Errors
    ///
    /// * `InvalidRoute` for a path not starting with `/`, a malformed
    ///   pattern, an empty or unknown method list, or a handler signature
    ///   that cannot be converted.
    /// * `DuplicateRegistration` if the path exists and no method is new.
    pub fn add_endpoint<M>(
        &mut self,
        path: &str,
        handler: H,
        methods: impl IntoIterator<Item = M>,
    ) -> Result<&mut Self>
    where
        M: AsRef<str>,
    {
        if !path.starts_with('/') {
            return Err(Error::invalid_route(format!(
                "path '{path}' must start with '/'"
            )));
        }
        let methods = parse_methods(methods)?;
        let full_path = format!("{}{path}", self.prefix);

        if let Some(&idx) = self.by_path.get(&full_path) {
            let endpoint = &mut self.endpoints[idx];
            let added = endpoint.merge_methods(&methods);
            if added == 0 {
                return Err(Error::duplicate(format!(
                    "endpoint with path '{path}' already exists"
                )));
            }
            tracing::debug!(path = %full_path, methods = ?endpoint.methods(), "methods merged");
            return Ok(self);
        }

        let pattern = RoutePattern::parse(&full_path)?;
        let converters = Converter::from_signature(&handler.signature())?;
        tracing::debug!(path = %full_path, methods = ?methods, "endpoint added");

        let idx = self.endpoints.len();
        if !pattern.is_static() {
            self.dynamic.push(idx);
        }
        self.endpoints
            .push(Endpoint::new(pattern, methods, handler, converters));
        self.by_path.insert(full_path, idx);
        Ok(self)
    }

    /// Register for GET and HEAD.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn route(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, DEFAULT_ROUTE_METHODS.map(Method::as_str))
    }

    /// Register for GET only.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn get(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Get.as_str()])
    }

    /// Register for HEAD only.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn head(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Head.as_str()])
    }

    /// Register for POST.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn post(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Post.as_str()])
    }

    /// Register for PUT.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn put(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Put.as_str()])
    }

    /// Register for DELETE.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn delete(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Delete.as_str()])
    }

    /// Register for PATCH.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn patch(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Patch.as_str()])
    }

    /// Register for OPTIONS.
    ///
    /// # Errors
    ///
    /// See [`Router::add_endpoint`].
    pub fn options(&mut self, path: &str, handler: H) -> Result<&mut Self> {
        self.add_endpoint(path, handler, [Method::Options.as_str()])
    }
}

fn parse_methods<M: AsRef<str>>(methods: impl IntoIterator<Item = M>) -> Result<BTreeSet<Method>> {
    let methods = methods
        .into_iter()
        .map(|m| {
            let name = m.as_ref();
            Method::parse(name)
                .ok_or_else(|| Error::invalid_route(format!("unknown HTTP method '{name}'")))
        })
        .collect::<Result<BTreeSet<_>>>()?;
    if methods.is_empty() {
        return Err(Error::invalid_route("at least one method is required"));
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Declared, ParamDecl, ParamType, Signature};

    type TestHandler = Declared<&'static str>;

    fn plain(name: &'static str) -> TestHandler {
        Declared::new(name, Signature::new())
    }

    fn with_id(name: &'static str) -> TestHandler {
        Declared::new(name, Signature::new().param(ParamDecl::new("id", ParamType::Int)))
    }

    #[test]
    fn prefix_must_be_well_formed() {
        assert!(Router::<TestHandler>::with_prefix("/api").is_ok());
        assert!(Router::<TestHandler>::with_prefix("api").is_err());
        assert!(Router::<TestHandler>::with_prefix("/api/").is_err());
    }

    #[test]
    fn methods_are_normalized_and_deduplicated() {
        let mut router = Router::new();
        router.add_endpoint("/x", plain("x"), ["get", "GET", "Post"]).unwrap();
        let endpoint = router.find("/x", None).endpoint().unwrap();
        assert_eq!(endpoint.methods(), [Method::Get, Method::Post]);
    }

    #[test]
    fn unknown_or_empty_methods_are_rejected() {
        let mut router = Router::new();
        let err = router.add_endpoint("/x", plain("x"), ["brew"]).unwrap_err();
        assert!(err.is_registration_error());
        let err = router
            .add_endpoint("/x", plain("x"), Vec::<&str>::new())
            .unwrap_err();
        assert!(err.is_registration_error());
    }

    #[test]
    fn path_must_start_with_slash() {
        let mut router = Router::new();
        assert!(router.get("x", plain("x")).is_err());
    }

    #[test]
    fn merge_keeps_first_handler() {
        let mut router = Router::new();
        router.get("/x", plain("first")).unwrap();
        router.post("/x", plain("second")).unwrap();

        let endpoint = router.find("/x", Some(Method::Post)).endpoint().unwrap();
        assert_eq!(*endpoint.handler().func(), "first");
        assert_eq!(endpoint.methods(), [Method::Get, Method::Post]);
    }

    #[test]
    fn identical_registration_is_duplicate() {
        let mut router = Router::new();
        router.get("/x", plain("x")).unwrap();
        let err = router.get("/x", plain("x")).unwrap_err();
        assert!(matches!(err, Error::DuplicateRegistration { .. }));
    }

    #[test]
    fn route_defaults_to_get_and_head() {
        let mut router = Router::new();
        router.route("/", plain("index")).unwrap();
        assert!(router.find("/", Some(Method::Head)).is_found());
        assert!(!router.find("/", Some(Method::Post)).is_found());
    }

    #[test]
    fn static_routes_win_over_placeholders() {
        let mut router = Router::new();
        router.get("/{name}", plain("dynamic")).unwrap();
        router.get("/about", plain("static")).unwrap();

        let endpoint = router.find("/about", None).endpoint().unwrap();
        assert_eq!(*endpoint.handler().func(), "static");
        let endpoint = router.find("/contact", None).endpoint().unwrap();
        assert_eq!(*endpoint.handler().func(), "dynamic");
    }

    #[test]
    fn placeholder_routes_keep_registration_order() {
        let mut router = Router::new();
        router.get("/{id:digit}", plain("digit")).unwrap();
        router.get("/{slug}", plain("slug")).unwrap();

        let endpoint = router.find("/42", None).endpoint().unwrap();
        assert_eq!(*endpoint.handler().func(), "digit");
        let endpoint = router.find("/hello", None).endpoint().unwrap();
        assert_eq!(*endpoint.handler().func(), "slug");
    }

    #[test]
    fn literal_placeholder_text_is_not_a_static_hit() {
        let mut router = Router::new();
        router.get("/{id:digit}", plain("digit")).unwrap();
        assert!(matches!(router.find("/{id:digit}", None), RouteLookup::NotFound));
    }

    #[test]
    fn unsupported_method_reports_allowed() {
        let mut router = Router::new();
        router.add_endpoint("/x", plain("x"), ["delete", "get"]).unwrap();
        match router.find("/x", Some(Method::Put)) {
            RouteLookup::UnsupportedMethod { allowed } => {
                assert_eq!(allowed, [Method::Get, Method::Delete]);
            }
            other => panic!("expected unsupported method, got {other:?}"),
        }
    }

    #[test]
    fn prefixed_router_registers_full_path() {
        let mut router = Router::with_prefix("/api").unwrap();
        router.get("/items", plain("items")).unwrap();
        assert!(router.find("/api/items", Some(Method::Get)).is_found());
        assert!(matches!(router.find("/items", None), RouteLookup::NotFound));
    }

    #[test]
    fn include_requires_prefix() {
        let mut app: Router<TestHandler> = Router::new();
        let err = app.include_router(Router::new()).unwrap_err();
        assert!(err.is_registration_error());
    }

    #[test]
    fn failed_include_leaves_router_unchanged() {
        let mut app: Router<TestHandler> = Router::new();
        app.include_router(Router::with_prefix("/c/d").unwrap()).unwrap();

        let mut clash = Router::with_prefix("/c").unwrap();
        clash.include_router(Router::with_prefix("/d").unwrap()).unwrap();

        let err = app.include_router(clash).unwrap_err();
        assert!(matches!(err, Error::DuplicateRegistration { .. }));
        assert_eq!(app.sub_router_prefixes(), ["/c/d"]);
    }

    #[test]
    fn include_flattens_nested_routers() {
        let mut inner = Router::with_prefix("/a").unwrap();
        inner.include_router(Router::with_prefix("/b").unwrap()).unwrap();
        let mut outer = Router::with_prefix("/x").unwrap();
        outer.include_router(inner).unwrap();

        let mut app: Router<TestHandler> = Router::new();
        app.include_router(outer).unwrap();
        assert_eq!(app.sub_router_prefixes(), ["/x", "/x/a", "/x/a/b"]);
    }

    #[test]
    fn resolve_converts_params() {
        let mut router = Router::new();
        router.get("/items/{id}", with_id("item")).unwrap();

        let resolved = router.resolve("/items/42", Method::Get).unwrap();
        assert_eq!(resolved.params.get("id").and_then(|v| v.as_int()), Some(42));

        let err = router.resolve("/items/abc", Method::Get).unwrap_err();
        assert_eq!(err.status_code(), 422);
        let err = router.resolve("/nope", Method::Get).unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = router.resolve("/items/1", Method::Post).unwrap_err();
        assert_eq!(err.status_code(), 405);
    }

    #[test]
    fn bad_signature_is_rejected_at_registration() {
        let mut router = Router::new();
        let handler = Declared::new(
            "bad",
            Signature::new().param(ParamDecl::new("x", ParamType::None)),
        );
        let err = router.get("/{x}", handler).unwrap_err();
        assert!(err.is_registration_error());
        assert_eq!(router.endpoints().count(), 0);
    }
}
