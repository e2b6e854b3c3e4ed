//! Error types.
//!
//! Every failure the ingestion core can report is a variant of [`Error`].
//! The core never renders responses; a dispatcher maps each variant to a
//! protocol-level response, using [`Error::status_code`] as the default.
//!
//! # Example
//!
//! ```
//! use trellis_core::error::{Error, ValidationError, loc};
//!
//! let err = Error::Validation(
//!     ValidationError::value_error(loc::path("id"), "A valid integer is required."),
//! );
//! assert_eq!(err.status_code(), 422);
//! assert!(err.should_report());
//! ```

use serde::{Serialize, Serializer};
use trellis_types::Method;

/// Result alias used throughout trellis.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The ingestion error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No route matched, or a required path parameter was absent.
    #[error("not found: {detail}")]
    NotFound {
        /// What was not found.
        detail: String,
    },

    /// The route exists but does not accept the request method.
    #[error("method not allowed")]
    MethodNotAllowed {
        /// Methods the route does accept, in canonical order.
        allowed: Vec<Method>,
    },

    /// A parameter failed every validator.
    #[error(transparent)]
    Validation(ValidationError),

    /// An endpoint or sub-router prefix was registered twice.
    #[error("duplicate registration: {detail}")]
    DuplicateRegistration {
        /// Which path or prefix collided.
        detail: String,
    },

    /// A route, prefix or method list is malformed.
    #[error("invalid route: {detail}")]
    InvalidRoute {
        /// Why the registration was rejected.
        detail: String,
    },

    /// The body's media type or multipart framing is unacceptable.
    #[error("unsupported media type: {detail}")]
    UnsupportedMediaType {
        /// Why the media type was rejected.
        detail: String,
    },

    /// Malformed body bytes.
    #[error("decode error: {detail}")]
    Decode {
        /// Parser diagnostic.
        detail: String,
    },

    /// A configured size limit was exceeded.
    #[error("payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Observed size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The client went away while the body was being read.
    #[error("client disconnected")]
    Disconnected,

    /// I/O error while spooling an upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound {
            detail: detail.into(),
        }
    }

    /// Create a `DuplicateRegistration` error.
    #[must_use]
    pub fn duplicate(detail: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            detail: detail.into(),
        }
    }

    /// Create an `InvalidRoute` error.
    #[must_use]
    pub fn invalid_route(detail: impl Into<String>) -> Self {
        Self::InvalidRoute {
            detail: detail.into(),
        }
    }

    /// Create an `UnsupportedMediaType` error.
    #[must_use]
    pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            detail: detail.into(),
        }
    }

    /// Create a `Decode` error.
    #[must_use]
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: detail.into(),
        }
    }

    /// The HTTP status a dispatcher would answer with.
    ///
    /// Registration errors map to 500: they are startup bugs and never
    /// reach a client in a correctly wired application.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::Validation(_) => 422,
            Self::DuplicateRegistration { .. } | Self::InvalidRoute { .. } | Self::Io(_) => 500,
            Self::UnsupportedMediaType { .. } => 415,
            Self::Decode { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::Disconnected => 499,
        }
    }

    /// Returns true if the transport disconnected mid-read.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Whether the error belongs in error reporting.
    ///
    /// A disconnect is a normal termination, not a parsing failure.
    #[must_use]
    pub fn should_report(&self) -> bool {
        !self.is_disconnect()
    }

    /// Returns true for errors raised while building routes.
    #[must_use]
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRegistration { .. } | Self::InvalidRoute { .. }
        )
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

// ============================================================================
// Validation Error
// ============================================================================

/// A location path element: a named field or a list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocItem {
    /// Named field or source (`"path"`, `"id"`).
    Field(String),
    /// Position inside a sequence.
    Index(usize),
}

impl LocItem {
    /// Create a field location item.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Returns the field name, if this is a field item.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Field(s) => Some(s),
            Self::Index(_) => None,
        }
    }
}

impl From<&str> for LocItem {
    fn from(s: &str) -> Self {
        Self::Field(s.to_owned())
    }
}

impl From<usize> for LocItem {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

impl Serialize for LocItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Field(s) => serializer.serialize_str(s),
            Self::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// Location builders.
pub mod loc {
    use super::LocItem;

    /// Location of a path parameter.
    #[must_use]
    pub fn path(param: &str) -> Vec<LocItem> {
        vec![LocItem::field("path"), LocItem::field(param)]
    }

    /// Location of a body field.
    #[must_use]
    pub fn body_field(field: &str) -> Vec<LocItem> {
        vec![LocItem::field("body"), LocItem::field(field)]
    }
}

/// Error type identifiers.
pub mod error_types {
    /// Required value absent.
    pub const MISSING: &str = "missing";
    /// Not an integer.
    pub const INT_PARSING: &str = "int_parsing";
    /// Not a number.
    pub const FLOAT_PARSING: &str = "float_parsing";
    /// Not a UUID.
    pub const UUID_PARSING: &str = "uuid_parsing";
    /// Not an enum member.
    pub const ENUM: &str = "enum";
    /// Numeric constraint violated.
    pub const CONSTRAINT: &str = "constraint";
    /// Generic value error.
    pub const VALUE_ERROR: &str = "value_error";
}

/// A single validation error item, serialized in the 422 `detail` format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Error type identifier (e.g. `"int_parsing"`).
    #[serde(rename = "type")]
    pub error_type: &'static str,
    /// Location path, e.g. `["path", "id"]`.
    pub loc: Vec<LocItem>,
    /// Human-readable message.
    pub msg: String,
    /// The raw input that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(error_type: &'static str, loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Self {
            error_type,
            loc,
            msg: msg.into(),
            input: None,
        }
    }

    /// Create a generic "value_error".
    #[must_use]
    pub fn value_error(loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Self::new(error_types::VALUE_ERROR, loc, msg)
    }

    /// Set the input value.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<serde_json::Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// The field name this error is attached to (last named loc item).
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.loc.iter().rev().find_map(LocItem::as_str)
    }

    /// Render as a `{"detail": [...]}` JSON body.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({ "detail": [self] }).to_string()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field() {
            Some(field) => write!(f, "validation error for '{field}': {}", self.msg),
            None => write!(f, "validation error: {}", self.msg),
        }
    }
}

impl std::error::Error for ValidationError {}
