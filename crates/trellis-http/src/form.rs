//! Form bodies and media types.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use trellis_core::{Error, Result};

use crate::multipart::parse_header_params;
use crate::upload::UploadFile;

/// Body encodings the ingestion core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// `application/json` and `*/*+json`.
    Json,
    /// `application/msgpack` and `application/x-msgpack`.
    MsgPack,
    /// `application/x-www-form-urlencoded`.
    UrlEncoded,
    /// `multipart/form-data`.
    Multipart,
    /// Anything else, or no Content-Type at all.
    Other,
}

impl MediaType {
    /// Classify a Content-Type header value.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Other;
        };
        let (essence, _) = parse_header_params(content_type);
        let essence = essence.to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Self::Json,
            "application/msgpack" | "application/x-msgpack" => Self::MsgPack,
            "application/x-www-form-urlencoded" => Self::UrlEncoded,
            "multipart/form-data" => Self::Multipart,
            other if other.starts_with("application/") && other.ends_with("+json") => Self::Json,
            _ => Self::Other,
        }
    }

    /// Returns true for the two form encodings.
    #[must_use]
    pub fn is_form(self) -> bool {
        matches!(self, Self::UrlEncoded | Self::Multipart)
    }
}

/// Decode an `application/x-www-form-urlencoded` body into ordered pairs.
#[must_use]
pub fn parse_urlencoded(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// A non-file multipart part, kept in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    data: Bytes,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
}

impl BodyPart {
    /// Create a part.
    #[must_use]
    pub fn new(
        data: impl Into<Bytes>,
        content_type: Option<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            data: data.into(),
            content_type,
            headers,
        }
    }

    /// Raw part content.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Declared Content-Type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Part headers, names lowercased.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Content as UTF-8, if it is valid.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// One form value.
#[derive(Debug)]
pub enum FormValue {
    /// A URL-encoded field.
    Text(String),
    /// A multipart field without a filename.
    Part(BodyPart),
    /// A multipart file upload.
    File(UploadFile),
}

impl FormValue {
    /// Text of a field. `None` for files and non-UTF-8 parts.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Part(part) => part.text(),
            Self::File(_) => None,
        }
    }

    /// The multipart part, if this is one.
    #[must_use]
    pub fn as_part(&self) -> Option<&BodyPart> {
        match self {
            Self::Part(part) => Some(part),
            _ => None,
        }
    }

    /// The upload, if this is a file.
    #[must_use]
    pub fn as_file(&self) -> Option<&UploadFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// Mutable access to the upload, for reading it.
    pub fn as_file_mut(&mut self) -> Option<&mut UploadFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// Returns true for file uploads.
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    fn to_json(&self) -> Value {
        match self {
            Self::File(file) => Value::String(file.filename().to_owned()),
            Self::Part(part) => {
                Value::String(String::from_utf8_lossy(part.data()).into_owned())
            }
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

/// A decoded form: ordered `(name, value)` entries, duplicates kept.
#[derive(Debug, Default)]
pub struct Form {
    entries: Vec<(String, FormValue)>,
}

impl Form {
    /// Create an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Mutable first value for `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FormValue> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Text of the first value for `name`.
    #[must_use]
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    /// All uploads with their field names.
    pub fn files(&self) -> impl Iterator<Item = (&str, &UploadFile)> {
        self.entries
            .iter()
            .filter_map(|(n, v)| v.as_file().map(|f| (n.as_str(), f)))
    }

    /// Number of entries, duplicates counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the form has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Consume the form, yielding its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<(String, FormValue)> {
        self.entries
    }

    /// JSON object view; repeated names become arrays and files become
    /// their filenames.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.entries {
            let value = value.to_json();
            match object.get_mut(name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(name.clone(), value);
                }
            }
        }
        Value::Object(object)
    }

    /// Deserialize the text fields into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the form does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json_value()).map_err(|e| Error::decode(e.to_string()))
    }
}

impl From<Vec<(String, FormValue)>> for Form {
    fn from(entries: Vec<(String, FormValue)>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, String)> for Form {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n, FormValue::Text(v)))
                .collect(),
        }
    }
}
