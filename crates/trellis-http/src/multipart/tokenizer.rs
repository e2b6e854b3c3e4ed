//! Byte-level multipart tokenizer.

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;
use trellis_core::{Error, Result};

/// A tokenizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A new part starts.
    PartBegin,
    /// Header name bytes.
    HeaderField(Bytes),
    /// Header value bytes.
    HeaderValue(Bytes),
    /// The current header line is complete.
    HeaderEnd,
    /// The blank line after the part headers.
    HeadersFinished,
    /// A slice of part content.
    PartData(Bytes),
    /// The current part is complete.
    PartEnd,
    /// The closing boundary was seen.
    End,
}

/// Tokenizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerState {
    /// Before the first boundary.
    Preamble,
    /// Just after a boundary; `\r\n` or `--` follows.
    AfterBoundary,
    /// Reading part header lines.
    Headers,
    /// Reading part content.
    PartData,
    /// After the closing boundary.
    End,
}

/// Incremental multipart tokenizer.
///
/// Between writes it retains at most one delimiter length of content (the
/// part of a chunk that could still turn out to be a boundary), or one
/// unfinished header line.
#[derive(Debug)]
pub struct Tokenizer {
    state: TokenizerState,
    buffer: BytesMut,
    /// `--boundary`
    dash_boundary: Vec<u8>,
    /// `\r\n--boundary`
    delimiter: Vec<u8>,
    max_header_size: usize,
    /// Set once preamble bytes have been discarded, so `buffer[0]` is no
    /// longer the start of the body.
    preamble_dropped: bool,
}

impl Tokenizer {
    /// Create a tokenizer for `boundary`.
    #[must_use]
    pub fn new(boundary: &str, max_header_size: usize) -> Self {
        let dash_boundary = format!("--{boundary}").into_bytes();
        let mut delimiter = b"\r\n".to_vec();
        delimiter.extend_from_slice(&dash_boundary);
        Self {
            state: TokenizerState::Preamble,
            buffer: BytesMut::new(),
            dash_boundary,
            delimiter,
            max_header_size,
            preamble_dropped: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TokenizerState {
        self.state
    }

    /// Bytes held back for the next write.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk, returning the events it completes, in order.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on malformed framing and `PayloadTooLarge` for a
    /// header line longer than the configured maximum.
    pub fn write(&mut self, chunk: &[u8]) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if self.state == TokenizerState::End {
            return Ok(events);
        }
        self.buffer.extend_from_slice(chunk);
        while self.step(&mut events)? {}
        Ok(events)
    }

    /// Check that the closing boundary was seen.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the stream ended early.
    pub fn finalize(&self) -> Result<()> {
        if self.state == TokenizerState::End {
            Ok(())
        } else {
            Err(Error::decode(format!(
                "multipart body ended before the closing boundary (state: {:?})",
                self.state
            )))
        }
    }

    /// Advance once. Returns false when more input is needed.
    fn step(&mut self, events: &mut Vec<Event>) -> Result<bool> {
        match self.state {
            TokenizerState::Preamble => Ok(self.skip_preamble()),
            TokenizerState::AfterBoundary => self.after_boundary(events),
            TokenizerState::Headers => self.header_line(events),
            TokenizerState::PartData => Ok(self.part_data(events)),
            TokenizerState::End => {
                self.buffer.clear();
                Ok(false)
            }
        }
    }

    fn skip_preamble(&mut self) -> bool {
        // A bare `--boundary` only opens the body at its very first byte.
        if !self.preamble_dropped {
            if self.buffer.starts_with(&self.dash_boundary) {
                self.buffer.advance(self.dash_boundary.len());
                self.state = TokenizerState::AfterBoundary;
                return true;
            }
            if self.dash_boundary.starts_with(&self.buffer) {
                return false;
            }
        }
        if let Some(pos) = memmem::find(&self.buffer, &self.delimiter) {
            self.buffer.advance(pos + self.delimiter.len());
            self.state = TokenizerState::AfterBoundary;
            return true;
        }
        // Keep enough to recognise a delimiter split across chunks.
        let keep = self.delimiter.len() - 1;
        if self.buffer.len() > keep {
            self.buffer.advance(self.buffer.len() - keep);
            self.preamble_dropped = true;
        }
        false
    }

    fn after_boundary(&mut self, events: &mut Vec<Event>) -> Result<bool> {
        // Transport padding may follow a boundary.
        let padding = self
            .buffer
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        if padding > self.max_header_size {
            return Err(Error::decode("multipart boundary padding too long"));
        }
        let rest = &self.buffer[padding..];
        if rest.len() < 2 {
            return Ok(false);
        }
        match &rest[..2] {
            b"\r\n" => {
                self.buffer.advance(padding + 2);
                self.state = TokenizerState::Headers;
                events.push(Event::PartBegin);
                Ok(true)
            }
            b"--" => {
                self.buffer.clear();
                self.state = TokenizerState::End;
                events.push(Event::End);
                Ok(false)
            }
            _ => Err(Error::decode("malformed multipart boundary")),
        }
    }

    fn header_line(&mut self, events: &mut Vec<Event>) -> Result<bool> {
        let Some(end) = memmem::find(&self.buffer, b"\r\n") else {
            if self.buffer.len() > self.max_header_size {
                return Err(Error::PayloadTooLarge {
                    size: self.buffer.len(),
                    max: self.max_header_size,
                });
            }
            return Ok(false);
        };
        if end > self.max_header_size {
            return Err(Error::PayloadTooLarge {
                size: end,
                max: self.max_header_size,
            });
        }

        let line = self.buffer.split_to(end).freeze();
        self.buffer.advance(2);

        if line.is_empty() {
            self.state = TokenizerState::PartData;
            events.push(Event::HeadersFinished);
            return Ok(true);
        }

        let colon = memchr::memchr(b':', &line)
            .ok_or_else(|| Error::decode("malformed part header: missing ':'"))?;
        let name = line.slice(..colon);
        let value_start = line[colon + 1..]
            .iter()
            .position(|b| *b != b' ' && *b != b'\t')
            .map_or(line.len(), |p| colon + 1 + p);
        events.push(Event::HeaderField(name));
        events.push(Event::HeaderValue(line.slice(value_start..)));
        events.push(Event::HeaderEnd);
        Ok(true)
    }

    fn part_data(&mut self, events: &mut Vec<Event>) -> bool {
        if let Some(pos) = memmem::find(&self.buffer, &self.delimiter) {
            if pos > 0 {
                events.push(Event::PartData(self.buffer.split_to(pos).freeze()));
            }
            self.buffer.advance(self.delimiter.len());
            self.state = TokenizerState::AfterBoundary;
            events.push(Event::PartEnd);
            return true;
        }

        let safe = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
        if safe > 0 {
            events.push(Event::PartData(self.buffer.split_to(safe).freeze()));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"preamble\r\n--XyZ\r\n\
        Content-Disposition: form-data; name=\"a\"\r\n\
        \r\n\
        hello\r\n--XyZ--\r\nepilogue";

    fn tokenize(chunks: &[&[u8]]) -> (Vec<Event>, Tokenizer) {
        let mut tokenizer = Tokenizer::new("XyZ", 1024);
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(tokenizer.write(chunk).unwrap());
        }
        (events, tokenizer)
    }

    fn data(events: &[Event]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::PartData(b) => Some(b.as_ref()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    #[test]
    fn single_write_produces_full_event_sequence() {
        let (events, tokenizer) = tokenize(&[BODY]);
        assert_eq!(
            events,
            [
                Event::PartBegin,
                Event::HeaderField(Bytes::from_static(b"Content-Disposition")),
                Event::HeaderValue(Bytes::from_static(b"form-data; name=\"a\"")),
                Event::HeaderEnd,
                Event::HeadersFinished,
                Event::PartData(Bytes::from_static(b"hello")),
                Event::PartEnd,
                Event::End,
            ]
        );
        assert!(tokenizer.finalize().is_ok());
        assert_eq!(tokenizer.state(), TokenizerState::End);
    }

    #[test]
    fn byte_at_a_time_yields_same_data() {
        let chunks: Vec<&[u8]> = BODY.chunks(1).collect();
        let (events, tokenizer) = tokenize(&chunks);
        assert_eq!(data(&events), b"hello");
        assert_eq!(events.last(), Some(&Event::End));
        assert!(tokenizer.finalize().is_ok());
    }

    #[test]
    fn preamble_split_mid_boundary_text_is_not_a_boundary() {
        let body: &[u8] = b"Q--XyZz\r\n--XyZ\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\
            \r\n\
            v\r\n--XyZ--\r\n";
        let (whole, _) = tokenize(&[body]);
        for split in 1..body.len() {
            let (events, tokenizer) = tokenize(&[&body[..split], &body[split..]]);
            assert_eq!(events, whole, "split at {split}");
            assert!(tokenizer.finalize().is_ok());
        }
        assert_eq!(data(&whole), b"v");
    }

    #[test]
    fn long_preamble_in_small_chunks() {
        let mut body = vec![b'-'; 40];
        body.extend_from_slice(BODY);
        let chunks: Vec<&[u8]> = body.chunks(3).collect();
        let (events, tokenizer) = tokenize(&chunks);
        assert_eq!(data(&events), b"hello");
        assert!(tokenizer.finalize().is_ok());
    }

    #[test]
    fn retains_at_most_a_delimiter_tail() {
        let mut tokenizer = Tokenizer::new("XyZ", 1024);
        tokenizer
            .write(b"--XyZ\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\n")
            .unwrap();
        let events = tokenizer.write(&[b'x'; 4096]).unwrap();
        assert!(tokenizer.buffered() < b"\r\n--XyZ".len());
        assert_eq!(data(&events).len() + tokenizer.buffered(), 4096);
    }

    #[test]
    fn boundary_text_inside_data_is_not_a_delimiter() {
        let body = b"--XyZ\r\n\r\nab--XyZcd\r\n--XyZ--";
        let (events, _) = tokenize(&[body]);
        assert_eq!(data(&events), b"ab--XyZcd");
    }

    #[test]
    fn finalize_fails_without_closing_boundary() {
        let (_, tokenizer) = tokenize(&[b"--XyZ\r\n\r\ntruncated"]);
        let err = tokenizer.finalize().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let mut tokenizer = Tokenizer::new("XyZ", 1024);
        let err = tokenizer.write(b"--XyZ\r\nbogus\r\n").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn oversized_header_line_is_rejected() {
        let mut tokenizer = Tokenizer::new("XyZ", 16);
        let err = tokenizer
            .write(b"--XyZ\r\nContent-Disposition: form-data; name=\"long\"")
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[test]
    fn garbage_after_boundary_is_rejected() {
        let mut tokenizer = Tokenizer::new("XyZ", 1024);
        assert!(tokenizer.write(b"--XyZxx").is_err());
    }

    #[test]
    fn unbounded_padding_after_boundary_is_rejected() {
        let mut tokenizer = Tokenizer::new("XyZ", 16);
        tokenizer.write(b"--XyZ").unwrap();
        let err = tokenizer.write(&[b' '; 17]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));

        let mut tokenizer = Tokenizer::new("XyZ", 16);
        let events = tokenizer.write(b"--XyZ \t \r\n\r\nx\r\n--XyZ--").unwrap();
        assert_eq!(data(&events), b"x");
    }

    #[test]
    fn epilogue_is_ignored() {
        let (events, tokenizer) = tokenize(&[b"--XyZ--", b"\r\ntrailing junk"]);
        assert_eq!(events, [Event::End]);
        assert_eq!(tokenizer.buffered(), 0);
    }
}
