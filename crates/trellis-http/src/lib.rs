//! Request body ingestion for trellis.
//!
//! - [`BodyReader`]: bounded, forward-only body reads over a [`Receive`]
//!   transport
//! - [`multipart`]: incremental `multipart/form-data` decoding with spooled
//!   uploads
//! - [`Form`] and [`parse_urlencoded`]: form bodies
//! - [`RequestState`]: per-request caches for body, form and JSON
//!
//! Nothing here is tied to an async runtime. The transport is anything that
//! implements [`Receive`]; [`testing::ScriptedReceive`] replays a fixed
//! script and is what the tests use.

#![forbid(unsafe_code)]

mod form;
pub mod multipart;
mod receive;
mod request;
mod stream;
pub mod testing;
mod upload;

pub use form::{parse_urlencoded, BodyPart, Form, FormValue, MediaType};
pub use multipart::{parse_boundary, MultipartConfig, MultipartDecoder};
pub use receive::{Message, Receive};
pub use request::RequestState;
pub use stream::BodyReader;
pub use upload::{UploadFile, DEFAULT_UPLOAD_CONTENT_TYPE};
