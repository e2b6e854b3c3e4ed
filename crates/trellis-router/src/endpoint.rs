//! Registered endpoints.

use std::collections::BTreeSet;

use trellis_core::{convert_all, Converter, PathParams, Result};
use trellis_types::Method;

use crate::pattern::RoutePattern;
use crate::r#match::RawParams;

/// A handler mounted at a path for a set of methods.
#[derive(Debug)]
pub struct Endpoint<H> {
    pattern: RoutePattern,
    methods: BTreeSet<Method>,
    handler: H,
    converters: Vec<Converter>,
}

impl<H> Endpoint<H> {
    pub(crate) fn new(
        pattern: RoutePattern,
        methods: BTreeSet<Method>,
        handler: H,
        converters: Vec<Converter>,
    ) -> Self {
        Self {
            pattern,
            methods,
            handler,
            converters,
        }
    }

    /// The fully-qualified path pattern.
    #[must_use]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    /// The parsed pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Accepted methods, in canonical order.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        self.methods.iter().copied().collect()
    }

    /// Returns true if `method` is accepted.
    #[must_use]
    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The parameter schema, one converter per declared parameter.
    #[must_use]
    pub fn converters(&self) -> &[Converter] {
        &self.converters
    }

    /// Convert raw captured values into typed parameters.
    ///
    /// # Errors
    ///
    /// Returns the first converter failure (`NotFound` or `Validation`).
    pub fn convert(&self, raw: &RawParams) -> Result<PathParams> {
        convert_all(&self.converters, |name| raw.get(name))
    }

    /// Add methods, returning how many were new.
    pub(crate) fn merge_methods(&mut self, methods: &BTreeSet<Method>) -> usize {
        let before = self.methods.len();
        self.methods.extend(methods.iter().copied());
        self.methods.len() - before
    }
}
