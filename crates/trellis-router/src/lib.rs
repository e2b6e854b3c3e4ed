//! Prefix-composable HTTP router.
//!
//! This crate maps a request path and method to a registered [`Endpoint`].
//!
//! # Features
//!
//! - Typed placeholder segments (`/items/{id:digit}`, `/files/{rest:path}`)
//! - Static route fast path
//! - Method merging on re-registration
//! - Sub-routers flattened into the including router's prefix table
//!
//! # Example
//!
//! ```
//! use trellis_core::{Declared, Method, ParamDecl, ParamType, Signature};
//! use trellis_router::{MatchCode, Router};
//!
//! let mut users = Router::with_prefix("/users")?;
//! users.get(
//!     "/{id:digit}",
//!     Declared::new("show_user", Signature::new().param(ParamDecl::new("id", ParamType::Int))),
//! )?;
//!
//! let mut app = Router::new();
//! app.include_router(users)?;
//!
//! assert_eq!(app.find("/users/7", Some(Method::Get)).code(), MatchCode::Found);
//! assert_eq!(app.find("/users/7", Some(Method::Post)).code(), MatchCode::UnsupportedMethods);
//!
//! let resolved = app.resolve("/users/7", Method::Get)?;
//! assert_eq!(resolved.params.get("id").and_then(|v| v.as_int()), Some(7));
//! # Ok::<(), trellis_core::Error>(())
//! ```

#![forbid(unsafe_code)]

mod endpoint;
mod r#match;
mod pattern;
mod router;

pub use endpoint::Endpoint;
pub use pattern::{PathSegment, Placeholder, RoutePattern};
pub use r#match::{MatchCode, RawParams, RouteLookup};
pub use router::{Resolved, Router, DEFAULT_ROUTE_METHODS};
