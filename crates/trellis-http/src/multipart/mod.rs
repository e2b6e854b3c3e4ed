//! Multipart form data decoding.
//!
//! This module provides incremental decoding of `multipart/form-data`
//! request bodies, which is the standard encoding for file uploads.
//!
//! # Format
//!
//! Multipart form data consists of multiple parts separated by a boundary string:
//!
//! ```text
//! --boundary\r\n
//! Content-Disposition: form-data; name="field1"\r\n
//! \r\n
//! value1\r\n
//! --boundary\r\n
//! Content-Disposition: form-data; name="file"; filename="example.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! file contents...\r\n
//! --boundary--\r\n
//! ```
//!
//! Decoding happens in two layers. The [`Tokenizer`] is a byte-level state
//! machine that turns chunks into [`Event`]s and keeps only a small tail
//! between writes. The [`MultipartDecoder`] consumes those events, builds
//! plain fields in memory and spools file parts into [`UploadFile`]s.
//!
//! [`UploadFile`]: crate::UploadFile

mod decoder;
mod tokenizer;

pub use decoder::MultipartDecoder;
pub use tokenizer::{Event, Tokenizer, TokenizerState};

use serde::Deserialize;
use trellis_core::{Error, Result};

/// Default maximum file size (10MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum total upload size (50MB).
pub const DEFAULT_MAX_TOTAL_SIZE: usize = 50 * 1024 * 1024;

/// Default maximum number of fields.
pub const DEFAULT_MAX_FIELDS: usize = 100;

/// Default maximum length of one part header line (8KB).
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

/// Default in-memory size of an upload before it spills to disk (10KB).
pub const DEFAULT_SPOOL_THRESHOLD: usize = 10 * 1024;

/// Longest boundary RFC 2046 allows.
const MAX_BOUNDARY_LEN: usize = 70;

/// Configuration for multipart parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Maximum size per file in bytes.
    max_file_size: usize,
    /// Maximum total upload size in bytes.
    max_total_size: usize,
    /// Maximum number of fields (including files).
    max_fields: usize,
    /// Maximum length of a single part header line.
    max_header_size: usize,
    /// Bytes an upload keeps in memory before rolling over to a temp file.
    spool_threshold: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            max_fields: DEFAULT_MAX_FIELDS,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl MultipartConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum file size.
    #[must_use]
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set the maximum total upload size.
    #[must_use]
    pub fn max_total_size(mut self, size: usize) -> Self {
        self.max_total_size = size;
        self
    }

    /// Set the maximum number of fields.
    #[must_use]
    pub fn max_fields(mut self, count: usize) -> Self {
        self.max_fields = count;
        self
    }

    /// Set the maximum part header line length.
    #[must_use]
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Set how much of an upload stays in memory.
    #[must_use]
    pub fn spool_threshold(mut self, size: usize) -> Self {
        self.spool_threshold = size;
        self
    }

    /// Get the maximum file size.
    #[must_use]
    pub fn get_max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Get the maximum total upload size.
    #[must_use]
    pub fn get_max_total_size(&self) -> usize {
        self.max_total_size
    }

    /// Get the maximum number of fields.
    #[must_use]
    pub fn get_max_fields(&self) -> usize {
        self.max_fields
    }

    /// Get the maximum part header line length.
    #[must_use]
    pub fn get_max_header_size(&self) -> usize {
        self.max_header_size
    }

    /// Get the spool threshold.
    #[must_use]
    pub fn get_spool_threshold(&self) -> usize {
        self.spool_threshold
    }
}

/// Parse boundary from Content-Type header.
///
/// Content-Type format: `multipart/form-data; boundary=----WebKitFormBoundary...`
///
/// # Errors
///
/// Returns `UnsupportedMediaType` if the media type is not
/// `multipart/form-data` or the boundary is missing or malformed.
pub fn parse_boundary(content_type: &str) -> Result<String> {
    let (essence, params) = parse_header_params(content_type);
    if !essence.eq_ignore_ascii_case("multipart/form-data") {
        return Err(Error::unsupported_media_type(format!(
            "expected multipart/form-data, got '{essence}'"
        )));
    }

    let boundary = params
        .into_iter()
        .find_map(|(key, value)| (key == "boundary").then_some(value))
        .ok_or_else(|| Error::unsupported_media_type("missing boundary in multipart Content-Type"))?;

    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(Error::unsupported_media_type("invalid multipart boundary"));
    }
    Ok(boundary)
}

/// Split a header value into its main value and `key=value` parameters.
///
/// Keys are lowercased; quoted values may contain `;` and backslash
/// escapes.
pub(crate) fn parse_header_params(value: &str) -> (&str, Vec<(String, String)>) {
    let (main, mut rest) = value.split_once(';').unwrap_or((value, ""));
    let mut params = Vec::new();

    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        if rest.is_empty() {
            break;
        }
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (val, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            unquote(quoted)
        } else {
            let end = after.find(';').unwrap_or(after.len());
            (after[..end].trim().to_owned(), &after[end..])
        };
        params.push((key, val));
        rest = remaining;
    }

    (main.trim(), params)
}

/// Read a quoted string body (opening quote already stripped).
fn unquote(s: &str) -> (String, &str) {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return (out, &s[i + 1..]),
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            _ => out.push(c),
        }
    }
    (out, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let ct = "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW";
        let boundary = parse_boundary(ct).unwrap();
        assert_eq!(boundary, "----WebKitFormBoundary7MA4YWxkTrZu0gW");
    }

    #[test]
    fn test_parse_boundary_quoted() {
        let ct = r#"multipart/form-data; charset=utf-8; BOUNDARY="simple;boundary""#;
        assert_eq!(parse_boundary(ct).unwrap(), "simple;boundary");
    }

    #[test]
    fn test_parse_boundary_missing() {
        let err = parse_boundary("multipart/form-data").unwrap_err();
        assert_eq!(err.status_code(), 415);
    }

    #[test]
    fn test_parse_boundary_wrong_content_type() {
        let err = parse_boundary("application/json; boundary=x").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_parse_boundary_too_long() {
        let ct = format!("multipart/form-data; boundary={}", "x".repeat(71));
        assert!(parse_boundary(&ct).is_err());
    }

    #[test]
    fn test_header_params() {
        let (main, params) =
            parse_header_params(r#"form-data; name="file"; filename="a \"b\".txt""#);
        assert_eq!(main, "form-data");
        assert_eq!(
            params,
            [
                ("name".to_owned(), "file".to_owned()),
                ("filename".to_owned(), r#"a "b".txt"#.to_owned()),
            ]
        );
    }

    #[test]
    fn test_config_builder_and_serde() {
        let config = MultipartConfig::new().max_fields(3).spool_threshold(16);
        assert_eq!(config.get_max_fields(), 3);
        assert_eq!(config.get_spool_threshold(), 16);
        assert_eq!(config.get_max_file_size(), DEFAULT_MAX_FILE_SIZE);

        let parsed: MultipartConfig = serde_json::from_str(r#"{"max_header_size": 64}"#).unwrap();
        assert_eq!(parsed.get_max_header_size(), 64);
        assert_eq!(parsed.get_max_fields(), DEFAULT_MAX_FIELDS);
    }
}
