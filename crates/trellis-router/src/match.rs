//! Route lookup results.

use trellis_core::Error;
use trellis_types::Method;

use crate::endpoint::Endpoint;

/// Outcome code of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MatchCode {
    /// No route matched.
    NotFound = 0,
    /// A route matched and accepts the method.
    Found = 1,
    /// A route matched but not for this method.
    UnsupportedMethods = 2,
}

/// Raw captured path values.
///
/// Empty captures are stored as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    values: Vec<(String, Option<String>)>,
}

impl RawParams {
    pub(crate) fn from_captures(captures: Vec<(&str, &str)>) -> Self {
        Self {
            values: captures
                .into_iter()
                .map(|(name, value)| {
                    let value = (!value.is_empty()).then(|| value.to_owned());
                    (name.to_owned(), value)
                })
                .collect(),
        }
    }

    /// Get a value by placeholder name.
    ///
    /// Returns `None` both for unknown names and for empty captures.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Iterate `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Number of placeholders captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the route had no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of [`Router::find`](crate::Router::find).
#[derive(Debug)]
pub enum RouteLookup<'a, H> {
    /// A route matched.
    Found {
        /// The matched endpoint.
        endpoint: &'a Endpoint<H>,
        /// Raw captured values.
        params: RawParams,
    },
    /// Path matched but method not allowed.
    UnsupportedMethod {
        /// Methods the endpoint accepts.
        allowed: Vec<Method>,
    },
    /// No route matched.
    NotFound,
}

impl<'a, H> RouteLookup<'a, H> {
    /// The outcome code.
    #[must_use]
    pub fn code(&self) -> MatchCode {
        match self {
            Self::Found { .. } => MatchCode::Found,
            Self::UnsupportedMethod { .. } => MatchCode::UnsupportedMethods,
            Self::NotFound => MatchCode::NotFound,
        }
    }

    /// Returns true if a route matched and accepts the method.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// The matched endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&'a Endpoint<H>> {
        match self {
            Self::Found { endpoint, .. } => Some(*endpoint),
            _ => None,
        }
    }

    /// Convert into a result, mapping misses onto the error taxonomy.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown path, `MethodNotAllowed` for a method
    /// mismatch.
    pub fn into_result(self, path: &str) -> Result<(&'a Endpoint<H>, RawParams), Error> {
        match self {
            Self::Found { endpoint, params } => Ok((endpoint, params)),
            Self::UnsupportedMethod { allowed } => Err(Error::MethodNotAllowed { allowed }),
            Self::NotFound => Err(Error::not_found(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_captures_are_absent() {
        let raw = RawParams::from_captures(vec![("id", "7"), ("rest", "")]);
        assert_eq!(raw.get("id"), Some("7"));
        assert_eq!(raw.get("rest"), None);
        assert_eq!(raw.len(), 2);
        assert_eq!(
            raw.iter().collect::<Vec<_>>(),
            [("id", Some("7")), ("rest", None)]
        );
    }

    #[test]
    fn codes_follow_variants() {
        let miss: RouteLookup<'_, ()> = RouteLookup::NotFound;
        assert_eq!(miss.code(), MatchCode::NotFound);
        assert_eq!(MatchCode::UnsupportedMethods as u8, 2);

        let lookup: RouteLookup<'_, ()> = RouteLookup::UnsupportedMethod {
            allowed: vec![Method::Get],
        };
        let err = lookup.into_result("/x").unwrap_err();
        assert_eq!(err.status_code(), 405);
    }
}
