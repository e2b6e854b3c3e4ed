//! Request-ingestion core for Rust web services.
//!
//! trellis takes an incoming request from the point where a server has
//! parsed the request line and headers, and does the rest of ingestion:
//!
//! - **Routing**: prefix-composable routers with typed placeholders and
//!   method merging
//! - **Path parameters**: declared schemas, validated and converted once
//!   per request
//! - **Bodies**: bounded streaming reads, URL-encoded and JSON decoding,
//!   incremental multipart with spooled uploads
//!
//! Sending responses, the server loop and the async runtime are left to the
//! host application.
//!
//! # Quick Start
//!
//! ```
//! use futures_executor::block_on;
//! use trellis::prelude::*;
//! use trellis::testing::ScriptedReceive;
//!
//! let mut items = Router::with_prefix("/items")?;
//! items.put(
//!     "/{id:digit}",
//!     Declared::new("update_item", Signature::new().param(ParamDecl::new("id", ParamType::Int))),
//! )?;
//! let mut app = Router::new();
//! app.include_router(items)?;
//!
//! let body = r#"{"name":"pen"}"#;
//! let reader = BodyReader::new(ScriptedReceive::chunks([body]), "", body.len());
//! let mut routed = route_request(&app, Method::Put, "/items/3", Some("application/json"), reader)?;
//!
//! assert_eq!(*routed.handler().func(), "update_item");
//! assert_eq!(routed.request.params().get("id").and_then(|v| v.as_int()), Some(3));
//! let item: serde_json::Value = block_on(routed.request.json())?;
//! assert_eq!(item["name"], "pen");
//! # Ok::<(), trellis::Error>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`trellis_types`]: `Method`
//! - [`trellis_core`]: errors, parameter schemas, validators, logging
//! - [`trellis_router`]: patterns, endpoints and routers
//! - [`trellis_http`]: body reader, multipart, forms, request state

#![forbid(unsafe_code)]

mod ingest;

// Re-export crates
pub use trellis_core as core;
pub use trellis_http as http;
pub use trellis_router as router;
pub use trellis_types as types;

pub use ingest::{route_request, Routed};

// Re-export commonly used types
pub use trellis_core::{
    convert_all, loc, Converter, Declared, EnumKind, EnumType, EnumValue, Error, Handler,
    LocItem, LogConfig, LogLevel, Method, NumericConstraints, ParamDecl, ParamType, ParamValue,
    PathParams, Result, Signature, ValidationError,
};
pub use trellis_http::{
    parse_boundary, parse_urlencoded, BodyPart, BodyReader, Form, FormValue, MediaType, Message,
    MultipartConfig, MultipartDecoder, Receive, RequestState, UploadFile,
};
pub use trellis_router::{
    Endpoint, MatchCode, Resolved, RouteLookup, RoutePattern, Router, DEFAULT_ROUTE_METHODS,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        route_request, BodyReader, Declared, Error, Form, FormValue, Handler, LogConfig,
        MatchCode, Method, MultipartConfig, ParamDecl, ParamType, ParamValue, Receive,
        RequestState, Result, Router, Routed, Signature, UploadFile,
    };
    pub use serde::{Deserialize, Serialize};
}

/// Testing utilities module.
pub mod testing {
    pub use trellis_http::testing::ScriptedReceive;
}
