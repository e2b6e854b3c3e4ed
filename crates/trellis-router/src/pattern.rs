//! Route pattern parsing and matching.
//!
//! Patterns are `/`-separated. A segment is either literal text or a typed
//! placeholder: `{id}`, `{id:digit}`, `{rest:path}`. Matching is
//! segment-exact, so `/sub/` and `/sub` are different routes.

use std::fmt;

use trellis_core::{Error, Result};

/// The kind of a placeholder segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Any non-empty segment (`{name}`, `{name:string}`, `{name:str}`).
    Str,
    /// ASCII digits only.
    Digit,
    /// Optionally signed digits.
    Int,
    /// Anything `f64` parses.
    Float,
    /// ASCII letters.
    Alpha,
    /// ASCII letters and digits.
    Alnum,
    /// Hyphenated 8-4-4-4-12 hex.
    Uuid,
    /// The rest of the path, slashes included; may be empty.
    Path,
}

impl Placeholder {
    /// Parse the part after `:` in a placeholder.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        Some(match kind {
            "" | "string" | "str" => Self::Str,
            "digit" => Self::Digit,
            "int" => Self::Int,
            "float" => Self::Float,
            "alpha" => Self::Alpha,
            "alnum" => Self::Alnum,
            "uuid" => Self::Uuid,
            "path" => Self::Path,
            _ => return None,
        })
    }

    /// Name as written in a pattern.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Digit => "digit",
            Self::Int => "int",
            Self::Float => "float",
            Self::Alpha => "alpha",
            Self::Alnum => "alnum",
            Self::Uuid => "uuid",
            Self::Path => "path",
        }
    }

    /// Check if a single segment matches this placeholder.
    #[must_use]
    pub fn matches(self, value: &str) -> bool {
        match self {
            Self::Path => true,
            _ if value.is_empty() => false,
            Self::Str => true,
            Self::Digit => value.bytes().all(|b| b.is_ascii_digit()),
            Self::Int => {
                let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
                !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
            }
            Self::Float => value.parse::<f64>().is_ok(),
            Self::Alpha => value.bytes().all(|b| b.is_ascii_alphabetic()),
            Self::Alnum => value.bytes().all(|b| b.is_ascii_alphanumeric()),
            Self::Uuid => is_uuid(value),
        }
    }
}

fn is_uuid(s: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let mut parts = s.split('-');
    GROUPS.iter().all(|len| {
        parts
            .next()
            .is_some_and(|p| p.len() == *len && p.bytes().all(|b| b.is_ascii_hexdigit()))
    }) && parts.next().is_none()
}

/// A parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Literal text (possibly empty, for `//` or a trailing `/`).
    Static(String),
    /// A named placeholder.
    Param {
        /// Parameter name.
        name: String,
        /// What the segment must look like.
        kind: Placeholder,
    },
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<PathSegment>,
}

impl RoutePattern {
    /// Parse a route pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoute` for an unclosed brace, an empty or repeated
    /// parameter name, an unknown placeholder kind, or a `path`
    /// placeholder that is not the last segment.
    pub fn parse(pattern: &str) -> Result<Self> {
        let raw: Vec<&str> = pattern.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (idx, seg) in raw.iter().enumerate() {
            let Some(inner) = seg.strip_prefix('{') else {
                if seg.contains(['{', '}']) {
                    return Err(invalid(pattern, "placeholders must span a whole segment"));
                }
                segments.push(PathSegment::Static((*seg).to_owned()));
                continue;
            };
            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid(pattern, "unclosed placeholder"))?;
            let (name, kind) = inner.split_once(':').unwrap_or((inner, ""));
            if name.is_empty() {
                return Err(invalid(pattern, "placeholder without a name"));
            }
            let kind = Placeholder::parse(kind)
                .ok_or_else(|| invalid(pattern, &format!("unknown placeholder type '{kind}'")))?;
            if kind == Placeholder::Path && idx + 1 != raw.len() {
                return Err(invalid(pattern, "a path placeholder must be the last segment"));
            }
            let duplicate = segments
                .iter()
                .any(|s| matches!(s, PathSegment::Param { name: n, .. } if n == name));
            if duplicate {
                return Err(invalid(pattern, &format!("parameter '{name}' appears twice")));
            }
            segments.push(PathSegment::Param {
                name: name.to_owned(),
                kind,
            });
        }

        Ok(Self {
            pattern: pattern.to_owned(),
            segments,
        })
    }

    /// The pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns true if the pattern has no placeholders.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PathSegment::Static(_)))
    }

    /// Placeholder names, left to right.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Param { name, .. } => Some(name.as_str()),
            PathSegment::Static(_) => None,
        })
    }

    /// Try to match `path`, capturing placeholder values.
    ///
    /// Returns `None` when the path does not match.
    #[must_use]
    pub fn match_path<'a>(&self, path: &'a str) -> Option<Vec<(&str, &'a str)>> {
        let mut params = Vec::new();
        let mut rest = Some(path);

        for segment in &self.segments {
            let remaining = rest?;
            if let PathSegment::Param {
                name,
                kind: Placeholder::Path,
            } = segment
            {
                params.push((name.as_str(), remaining));
                return Some(params);
            }

            let (value, tail) = match remaining.split_once('/') {
                Some((value, tail)) => (value, Some(tail)),
                None => (remaining, None),
            };
            match segment {
                PathSegment::Static(expected) if expected == value => {}
                PathSegment::Param { name, kind } if kind.matches(value) => {
                    params.push((name.as_str(), value));
                }
                _ => return None,
            }
            rest = tail;
        }

        rest.is_none().then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::invalid_route(format!("route '{pattern}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> RoutePattern {
        RoutePattern::parse(p).unwrap()
    }

    #[test]
    fn static_pattern_matches_exactly() {
        let p = pattern("/users/list");
        assert!(p.is_static());
        assert_eq!(p.match_path("/users/list"), Some(vec![]));
        assert_eq!(p.match_path("/users/list/"), None);
        assert_eq!(p.match_path("/users"), None);
    }

    #[test]
    fn trailing_slash_is_significant() {
        let p = pattern("/sub/");
        assert_eq!(p.match_path("/sub/"), Some(vec![]));
        assert_eq!(p.match_path("/sub"), None);
    }

    #[test]
    fn match_path_extracts_params() {
        let p = pattern("/users/{id:digit}/posts/{slug}");
        assert_eq!(
            p.match_path("/users/42/posts/hello"),
            Some(vec![("id", "42"), ("slug", "hello")])
        );
        assert_eq!(p.match_path("/users/abc/posts/hello"), None);
    }

    #[test]
    fn string_placeholder_rejects_empty_segment() {
        let p = pattern("/sub/{message}");
        assert_eq!(p.match_path("/sub/"), None);
    }

    #[test]
    fn int_and_float_placeholders() {
        let i = pattern("/n/{v:int}");
        assert!(i.match_path("/n/-12").is_some());
        assert!(i.match_path("/n/-").is_none());
        assert!(i.match_path("/n/1.5").is_none());

        let f = pattern("/n/{v:float}");
        assert!(f.match_path("/n/1.5").is_some());
        assert!(f.match_path("/n/x").is_none());
    }

    #[test]
    fn alpha_alnum_uuid_placeholders() {
        assert!(pattern("/{s:alpha}").match_path("/abc").is_some());
        assert!(pattern("/{s:alpha}").match_path("/abc1").is_none());
        assert!(pattern("/{s:alnum}").match_path("/abc1").is_some());
        assert!(pattern("/{s:alnum}").match_path("/abc-1").is_none());

        let u = pattern("/{u:uuid}");
        assert!(u.match_path("/550e8400-e29b-41d4-a716-446655440000").is_some());
        assert!(u.match_path("/550e8400-e29b-41d4-a716").is_none());
    }

    #[test]
    fn path_placeholder_captures_rest() {
        let p = pattern("/files/{rest:path}");
        assert_eq!(
            p.match_path("/files/a/b/c.txt"),
            Some(vec![("rest", "a/b/c.txt")])
        );
        assert_eq!(p.match_path("/files/"), Some(vec![("rest", "")]));
        assert_eq!(p.match_path("/files"), None);
    }

    #[test]
    fn parse_rejects_malformed_patterns() {
        for bad in [
            "/{id",
            "/{}",
            "/{id:regex}",
            "/{rest:path}/tail",
            "/{id}/{id}",
            "/file.{ext}",
        ] {
            let err = RoutePattern::parse(bad).unwrap_err();
            assert!(err.is_registration_error(), "{bad} should be rejected");
        }
    }

    #[test]
    fn param_names_in_order() {
        let p = pattern("/{a}/x/{b:int}");
        assert_eq!(p.param_names().collect::<Vec<_>>(), ["a", "b"]);
    }
}
