//! Per-request state.
//!
//! A [`RequestState`] is created once per request and passed explicitly
//! down the handling chain. It owns the [`BodyReader`] and caches every
//! representation of the body it produces, so a body is read from the
//! transport at most once.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use trellis_core::{Error, PathParams, Result};
use trellis_types::Method;

use crate::form::{parse_urlencoded, Form, MediaType};
use crate::multipart::{MultipartConfig, MultipartDecoder};
use crate::receive::Receive;
use crate::stream::BodyReader;

/// How the body has been consumed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Consumed {
    No,
    /// Drained into the cached bytes.
    Buffered,
    /// Decoded straight from the transport; the raw bytes are gone.
    Streamed,
}

/// Request-scoped ingestion state.
///
/// ```
/// use futures_executor::block_on;
/// use trellis_http::testing::ScriptedReceive;
/// use trellis_http::{BodyReader, RequestState};
/// use trellis_types::Method;
///
/// let reader = BodyReader::new(ScriptedReceive::chunks(["&b=2"]), "a=1", 7);
/// let mut request = RequestState::new(Method::Post, "/submit", reader)
///     .with_content_type("application/x-www-form-urlencoded");
///
/// let form = block_on(request.form()).unwrap();
/// assert_eq!(form.get_text("b"), Some("2"));
/// assert_eq!(block_on(request.body()).unwrap(), "a=1&b=2");
/// ```
#[derive(Debug)]
pub struct RequestState<R> {
    method: Method,
    path: String,
    query: Option<String>,
    params: PathParams,
    content_type: Option<String>,
    reader: BodyReader<R>,
    multipart: MultipartConfig,
    body: Option<Bytes>,
    form: Option<Form>,
    consumed: Consumed,
}

impl<R: Receive> RequestState<R> {
    /// Create the state for one request.
    pub fn new(method: Method, path: impl Into<String>, reader: BodyReader<R>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            params: PathParams::new(),
            content_type: None,
            reader,
            multipart: MultipartConfig::default(),
            body: None,
            form: None,
            consumed: Consumed::No,
        }
    }

    /// Set the raw query string (without `?`).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the converted path parameters.
    #[must_use]
    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    /// Set the Content-Type header value.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the multipart limits.
    #[must_use]
    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart = config;
        self
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query pairs, in order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| parse_urlencoded(q.as_bytes()))
            .unwrap_or_default()
    }

    /// Converted path parameters.
    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Classified body media type.
    #[must_use]
    pub fn media_type(&self) -> MediaType {
        MediaType::from_content_type(self.content_type())
    }

    /// The body reader, for handlers that stream the body themselves.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the body was already consumed.
    pub fn reader(&mut self) -> Result<&mut BodyReader<R>> {
        if self.consumed != Consumed::No {
            return Err(Error::decode("request body was already consumed"));
        }
        self.consumed = Consumed::Streamed;
        Ok(&mut self.reader)
    }

    /// The whole body, read once and cached.
    ///
    /// # Errors
    ///
    /// `Disconnected` if the client goes away, `Decode` if the body was
    /// already decoded straight from the transport.
    pub async fn body(&mut self) -> Result<Bytes> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        if self.consumed == Consumed::Streamed {
            return Err(Error::decode(
                "request body was streamed and cannot be read again",
            ));
        }
        let body = self.reader.read(None).await?;
        tracing::trace!(len = body.len(), "request body buffered");
        self.consumed = Consumed::Buffered;
        self.body = Some(body.clone());
        Ok(body)
    }

    /// The parsed form, parsed once and cached.
    ///
    /// # Errors
    ///
    /// See [`form_mut`](Self::form_mut).
    pub async fn form(&mut self) -> Result<&Form> {
        self.form_mut().await.map(|form| &*form)
    }

    /// Mutable access to the parsed form, for reading uploads.
    ///
    /// URL-encoded bodies are buffered first. Multipart bodies are decoded
    /// straight from the transport unless the body was already buffered.
    ///
    /// # Errors
    ///
    /// `UnsupportedMediaType` for a non-form Content-Type or a bad
    /// boundary, plus every multipart decoding error.
    pub async fn form_mut(&mut self) -> Result<&mut Form> {
        let form = match self.form.take() {
            Some(form) => form,
            None => self.load_form().await?,
        };
        Ok(self.form.insert(form))
    }

    async fn load_form(&mut self) -> Result<Form> {
        match self.media_type() {
            MediaType::UrlEncoded => {
                let body = self.body().await?;
                Ok(parse_urlencoded(&body).into_iter().collect())
            }
            MediaType::Multipart => {
                let content_type = self.content_type.as_deref().unwrap_or_default();
                let decoder = MultipartDecoder::new(content_type, self.multipart.clone())?;
                let fields = match (&self.body, self.consumed) {
                    (Some(body), _) => decoder.parse_bytes(body)?,
                    (None, Consumed::No) => {
                        self.consumed = Consumed::Streamed;
                        decoder.parse(&mut self.reader).await?
                    }
                    (None, _) => {
                        return Err(Error::decode("request body was already consumed"));
                    }
                };
                tracing::debug!(fields = fields.len(), "multipart form decoded");
                Ok(Form::from(fields))
            }
            MediaType::Json | MediaType::MsgPack | MediaType::Other => Err(Error::unsupported_media_type(format!(
                "expected a form body, got '{}'",
                self.content_type().unwrap_or("no content type")
            ))),
        }
    }

    /// Decode a JSON body into `T`.
    ///
    /// The raw bytes stay cached, so [`body`](Self::body) still works
    /// afterwards.
    ///
    /// # Errors
    ///
    /// `UnsupportedMediaType` unless the Content-Type is JSON, `Decode` for
    /// malformed JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        if self.media_type() != MediaType::Json {
            return Err(Error::unsupported_media_type(format!(
                "expected application/json, got '{}'",
                self.content_type().unwrap_or("no content type")
            )));
        }
        let body = self.body().await?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(e.to_string()))
    }

    /// Decode a MessagePack body into `T`.
    ///
    /// Like [`json`](Self::json), the raw bytes stay cached.
    ///
    /// # Errors
    ///
    /// `UnsupportedMediaType` unless the Content-Type is MessagePack,
    /// `Decode` if the body does not decode into `T`.
    pub async fn msgpack<T: DeserializeOwned>(&mut self) -> Result<T> {
        if self.media_type() != MediaType::MsgPack {
            return Err(Error::unsupported_media_type(format!(
                "expected application/msgpack, got '{}'",
                self.content_type().unwrap_or("no content type")
            )));
        }
        let body = self.body().await?;
        rmp_serde::from_slice(&body).map_err(|e| Error::decode(e.to_string()))
    }
}
