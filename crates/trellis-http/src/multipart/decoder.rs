//! Assembles tokenizer events into form values.

use bytes::BytesMut;
use trellis_core::{Error, Result};

use super::tokenizer::{Event, Tokenizer};
use super::{parse_boundary, parse_header_params, MultipartConfig};
use crate::form::{BodyPart, FormValue};
use crate::receive::Receive;
use crate::stream::BodyReader;
use crate::upload::UploadFile;

/// Decodes a `multipart/form-data` body.
///
/// ```
/// use trellis_http::multipart::{MultipartConfig, MultipartDecoder};
///
/// let decoder = MultipartDecoder::new(
///     "multipart/form-data; boundary=XyZ",
///     MultipartConfig::default(),
/// )
/// .unwrap();
/// let body = b"--XyZ\r\n\
///     Content-Disposition: form-data; name=\"name\"\r\n\
///     \r\n\
///     alice\r\n\
///     --XyZ--\r\n";
/// let fields = decoder.parse_bytes(body).unwrap();
/// assert_eq!(fields[0].0, "name");
/// assert_eq!(fields[0].1.as_text(), Some("alice"));
/// ```
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    boundary: String,
    config: MultipartConfig,
}

impl MultipartDecoder {
    /// Create a decoder from the request Content-Type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMediaType` if the boundary is missing or
    /// invalid. No body bytes are touched.
    pub fn new(content_type: &str, config: MultipartConfig) -> Result<Self> {
        let boundary = parse_boundary(content_type)?;
        Ok(Self { boundary, config })
    }

    /// The boundary from the Content-Type.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The limits in effect.
    #[must_use]
    pub fn config(&self) -> &MultipartConfig {
        &self.config
    }

    /// Decode a streamed body, pulling chunks until the reader ends.
    ///
    /// Parts come back in arrival order with duplicate names preserved.
    ///
    /// The only suspension point is the next chunk from `reader`. Once a
    /// file part has rolled over to disk its writes are blocking and happen
    /// between awaits, each bounded by the size of one received chunk.
    ///
    /// # Errors
    ///
    /// `Decode` for malformed framing, `UnsupportedMediaType` for a part
    /// without a name, `PayloadTooLarge` when a limit is hit, `Disconnected`
    /// if the client goes away and `Io` if spooling fails.
    pub async fn parse<R: Receive>(
        &self,
        reader: &mut BodyReader<R>,
    ) -> Result<Vec<(String, FormValue)>> {
        let mut tokenizer = Tokenizer::new(&self.boundary, self.config.get_max_header_size());
        let mut assembler = Assembler::new(&self.config);
        while let Some(chunk) = reader.next_chunk().await? {
            for event in tokenizer.write(&chunk)? {
                assembler.handle(event)?;
            }
        }
        tokenizer.finalize()?;
        Ok(assembler.finish())
    }

    /// Decode a body already held in memory.
    ///
    /// # Errors
    ///
    /// As [`parse`](Self::parse), minus `Disconnected`.
    pub fn parse_bytes(&self, body: &[u8]) -> Result<Vec<(String, FormValue)>> {
        let mut tokenizer = Tokenizer::new(&self.boundary, self.config.get_max_header_size());
        let mut assembler = Assembler::new(&self.config);
        for event in tokenizer.write(body)? {
            assembler.handle(event)?;
        }
        tokenizer.finalize()?;
        Ok(assembler.finish())
    }
}

/// Where the current part's content goes.
#[derive(Debug)]
enum Sink {
    Memory(BytesMut),
    File(UploadFile),
}

#[derive(Debug)]
struct CurrentPart {
    name: String,
    content_type: Option<String>,
    sink: Sink,
    size: usize,
}

#[derive(Debug)]
struct Assembler<'a> {
    config: &'a MultipartConfig,
    fields: Vec<(String, FormValue)>,
    header_field: Vec<u8>,
    header_value: Vec<u8>,
    headers: Vec<(String, String)>,
    content_disposition: Option<String>,
    content_type: Option<String>,
    current: Option<CurrentPart>,
    total_size: usize,
}

impl<'a> Assembler<'a> {
    fn new(config: &'a MultipartConfig) -> Self {
        Self {
            config,
            fields: Vec::new(),
            header_field: Vec::new(),
            header_value: Vec::new(),
            headers: Vec::new(),
            content_disposition: None,
            content_type: None,
            current: None,
            total_size: 0,
        }
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::PartBegin => {
                if self.fields.len() >= self.config.get_max_fields() {
                    return Err(Error::decode(format!(
                        "too many fields (max {})",
                        self.config.get_max_fields()
                    )));
                }
                self.headers.clear();
                self.content_disposition = None;
                self.content_type = None;
                self.current = None;
            }
            Event::HeaderField(bytes) => self.header_field.extend_from_slice(&bytes),
            Event::HeaderValue(bytes) => self.header_value.extend_from_slice(&bytes),
            Event::HeaderEnd => self.header_end(),
            Event::HeadersFinished => self.headers_finished()?,
            Event::PartData(bytes) => self.part_data(&bytes)?,
            Event::PartEnd => self.part_end()?,
            Event::End => {}
        }
        Ok(())
    }

    fn header_end(&mut self) {
        let name = latin1(&self.header_field).to_ascii_lowercase();
        let value = latin1(&self.header_value);
        self.header_field.clear();
        self.header_value.clear();
        match name.as_str() {
            "content-disposition" => self.content_disposition = Some(value.clone()),
            "content-type" => self.content_type = Some(value.clone()),
            _ => {}
        }
        self.headers.push((name, value));
    }

    fn headers_finished(&mut self) -> Result<()> {
        let disposition = self.content_disposition.as_deref().unwrap_or_default();
        let (_, params) = parse_header_params(disposition);
        let mut name = None;
        let mut filename = None;
        for (key, value) in params {
            match key.as_str() {
                "name" => name = Some(value),
                "filename" => filename = Some(value),
                _ => {}
            }
        }
        let name = name.ok_or_else(|| Error::unsupported_media_type("missing name field"))?;

        tracing::debug!(
            field = %name,
            filename = filename.as_deref(),
            content_type = self.content_type.as_deref(),
            "multipart part"
        );

        let sink = match filename {
            Some(filename) => Sink::File(UploadFile::new(
                filename,
                self.content_type.clone(),
                std::mem::take(&mut self.headers),
                self.config.get_spool_threshold(),
            )),
            None => Sink::Memory(BytesMut::new()),
        };
        self.current = Some(CurrentPart {
            name,
            content_type: self.content_type.take(),
            sink,
            size: 0,
        });
        Ok(())
    }

    fn part_data(&mut self, data: &[u8]) -> Result<()> {
        let Some(part) = self.current.as_mut() else {
            return Err(Error::decode("part data before part headers"));
        };

        part.size += data.len();
        self.total_size += data.len();
        if self.total_size > self.config.get_max_total_size() {
            return Err(Error::PayloadTooLarge {
                size: self.total_size,
                max: self.config.get_max_total_size(),
            });
        }

        match &mut part.sink {
            Sink::Memory(buffer) => buffer.extend_from_slice(data),
            Sink::File(file) => {
                if part.size > self.config.get_max_file_size() {
                    return Err(Error::PayloadTooLarge {
                        size: part.size,
                        max: self.config.get_max_file_size(),
                    });
                }
                if file.append(data)? {
                    tracing::debug!(
                        field = %part.name,
                        filename = file.filename(),
                        size = part.size,
                        "upload spooled to disk"
                    );
                }
            }
        }
        Ok(())
    }

    fn part_end(&mut self) -> Result<()> {
        let Some(part) = self.current.take() else {
            return Err(Error::decode("part ended before its headers"));
        };
        let value = match part.sink {
            Sink::Memory(buffer) => FormValue::Part(BodyPart::new(
                buffer.freeze(),
                part.content_type,
                std::mem::take(&mut self.headers),
            )),
            Sink::File(mut file) => {
                file.rewind()?;
                FormValue::File(file)
            }
        };
        self.fields.push((part.name, value));
        Ok(())
    }

    fn finish(self) -> Vec<(String, FormValue)> {
        self.fields
    }
}

/// Header bytes are ISO-8859-1; every byte maps to the same code point.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
