//! Uploaded file handles.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

/// Default Content-Type for uploads that do not declare one.
pub const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// A file received in a multipart form.
///
/// Content is held in memory up to the spool threshold and moved to an
/// anonymous temporary file after that. The temporary file is removed when
/// the handle is dropped.
///
/// After decoding the cursor sits at offset 0, so the handle can be read
/// directly:
///
/// ```
/// use std::io::Read;
/// use trellis_http::UploadFile;
///
/// let mut file = UploadFile::new("a.txt", None, Vec::new(), 1024);
/// std::io::Write::write_all(&mut file, b"hi").unwrap();
/// file.rewind().unwrap();
///
/// let mut text = String::new();
/// file.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "hi");
/// ```
pub struct UploadFile {
    filename: String,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    file: SpooledTempFile,
    size: usize,
}

impl UploadFile {
    /// Create an empty upload that stays in memory up to `spool_threshold`
    /// bytes.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        headers: Vec<(String, String)>,
        spool_threshold: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            headers,
            file: SpooledTempFile::new(spool_threshold),
            size: 0,
        }
    }

    /// The client-supplied filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The part's declared Content-Type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Content-Type, falling back to `application/octet-stream`.
    #[must_use]
    pub fn content_type_or_default(&self) -> &str {
        self.content_type().unwrap_or(DEFAULT_UPLOAD_CONTENT_TYPE)
    }

    /// All part headers, names lowercased, in arrival order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Bytes written so far.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true once the content has spilled to disk.
    #[must_use]
    pub fn is_rolled_over(&self) -> bool {
        self.file.is_rolled()
    }

    /// Move the content to disk now.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating the temporary file.
    pub fn rollover(&mut self) -> io::Result<()> {
        self.file.roll()
    }

    /// Seek back to the start.
    ///
    /// # Errors
    ///
    /// Returns the underlying seek error.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Get the file extension from the filename.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit('.')
            .next()
            .filter(|ext| !ext.is_empty() && *ext != self.filename)
    }

    /// Read the whole content from the start.
    ///
    /// # Errors
    ///
    /// Returns the underlying read error.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut out = Vec::with_capacity(self.size);
        self.file.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Append decoded bytes, returning whether this write rolled the
    /// content over to disk.
    pub(crate) fn append(&mut self, data: &[u8]) -> io::Result<bool> {
        let was_in_memory = !self.file.is_rolled();
        self.file.write_all(data)?;
        self.size += data.len();
        Ok(was_in_memory && self.file.is_rolled())
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("rolled_over", &self.is_rolled_over())
            .finish_non_exhaustive()
    }
}

impl Read for UploadFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for UploadFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        let end = self.file.stream_position()?;
        self.size = self.size.max(usize::try_from(end).unwrap_or(usize::MAX));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for UploadFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
