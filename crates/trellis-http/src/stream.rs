//! Streaming request body reader.
//!
//! A [`BodyReader`] pulls body chunks from the transport on demand and
//! never hands out more than the declared content length. It is forward
//! only: once a chunk has been delivered it is gone.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use trellis_core::{Error, Result};

use crate::receive::{Message, Receive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The initial chunk has not been delivered yet.
    Initial,
    /// Receiving from the transport.
    Streaming,
    /// Only the empty terminal chunk is left.
    Terminal,
    /// Finished, or aborted by a disconnect.
    Done,
}

/// Reads a request body from a [`Receive`] transport.
#[derive(Debug)]
pub struct BodyReader<R> {
    receive: R,
    initial: Bytes,
    buffer: BytesMut,
    content_length: usize,
    bytes_remaining: i64,
    bytes_received: usize,
    phase: Phase,
}

impl<R: Receive> BodyReader<R> {
    /// Create a reader.
    ///
    /// `initial_chunk` is body data the server already holds; it counts
    /// against `content_length` and is truncated to it.
    pub fn new(receive: R, initial_chunk: impl Into<Bytes>, content_length: usize) -> Self {
        let mut initial = initial_chunk.into();
        initial.truncate(content_length);
        let bytes_remaining = content_length as i64 - initial.len() as i64;
        Self {
            receive,
            bytes_received: initial.len(),
            initial,
            buffer: BytesMut::new(),
            content_length,
            bytes_remaining,
            phase: Phase::Initial,
        }
    }

    /// Declared body length.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Bytes accepted from the transport so far, initial chunk included.
    #[must_use]
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Returns true once every chunk has been delivered and nothing is
    /// buffered.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Done && self.buffer.is_empty()
    }

    /// Next chunk of the body.
    ///
    /// Bytes left over from a sized [`read`](Self::read) come first. The
    /// sequence ends with one empty chunk, after which this returns
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the client goes away; the reader is
    /// finished afterwards.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.split().freeze()));
        }
        self.pull().await
    }

    async fn pull(&mut self) -> Result<Option<Bytes>> {
        match self.phase {
            Phase::Initial => {
                self.phase = if self.bytes_remaining > 0 {
                    Phase::Streaming
                } else {
                    Phase::Terminal
                };
                Ok(Some(std::mem::take(&mut self.initial)))
            }
            Phase::Streaming => match self.receive.receive().await {
                Message::Body { mut chunk, more_body } => {
                    let room = usize::try_from(self.bytes_remaining).unwrap_or(0);
                    if chunk.len() > room {
                        tracing::debug!(
                            received = chunk.len(),
                            room,
                            "chunk exceeds declared content length, truncating"
                        );
                        chunk.truncate(room);
                    }
                    self.bytes_remaining -= chunk.len() as i64;
                    self.bytes_received += chunk.len();
                    tracing::trace!(
                        len = chunk.len(),
                        remaining = self.bytes_remaining,
                        more_body,
                        "body chunk"
                    );
                    if !more_body || self.bytes_remaining <= 0 {
                        self.phase = Phase::Terminal;
                    }
                    Ok(Some(chunk))
                }
                Message::Disconnect => {
                    tracing::debug!(
                        received = self.bytes_received,
                        remaining = self.bytes_remaining,
                        "client disconnected while reading body"
                    );
                    self.phase = Phase::Done;
                    Err(Error::Disconnected)
                }
            },
            Phase::Terminal => {
                self.phase = Phase::Done;
                Ok(Some(Bytes::new()))
            }
            Phase::Done => Ok(None),
        }
    }

    /// Read up to `size` bytes, or the rest of the body.
    ///
    /// `None` and `Some(0)` drain everything that is left, buffered bytes
    /// included. `Some(n)` waits until `n` bytes are available or the body
    /// ends, returns at most `n` and keeps the remainder for the next call.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` if the client goes away. Bytes buffered
    /// before the disconnect are kept.
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        let wanted = size.filter(|n| *n > 0);
        loop {
            if wanted.is_some_and(|n| self.buffer.len() >= n) {
                break;
            }
            match self.pull().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => break,
            }
        }
        let take = wanted.map_or(self.buffer.len(), |n| n.min(self.buffer.len()));
        Ok(self.buffer.split_to(take).freeze())
    }

    /// Adapt the reader into a stream of chunks.
    ///
    /// The stream ends after the terminal empty chunk, or right after a
    /// `Disconnected` error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        futures_util::stream::unfold(self, |mut reader| async move {
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedReceive;
    use futures_executor::block_on;
    use futures_util::StreamExt;

    fn collect_chunks<R: Receive>(reader: &mut BodyReader<R>) -> Vec<Bytes> {
        block_on(async {
            let mut chunks = Vec::new();
            while let Some(chunk) = reader.next_chunk().await.unwrap() {
                chunks.push(chunk);
            }
            chunks
        })
    }

    #[test]
    fn chunks_end_with_empty_terminal() {
        let mut reader = BodyReader::new(ScriptedReceive::chunks(["cd", "ef"]), "ab", 6);
        assert_eq!(collect_chunks(&mut reader), ["ab", "cd", "ef", ""]);
        assert!(reader.is_exhausted());
        assert_eq!(reader.bytes_received(), 6);
    }

    #[test]
    fn initial_chunk_covering_body_skips_transport() {
        let mut reader = BodyReader::new(ScriptedReceive::default(), "hello", 5);
        assert_eq!(collect_chunks(&mut reader), ["hello", ""]);
        assert_eq!(reader.receive.calls(), 0);
    }

    #[test]
    fn chunks_are_truncated_to_content_length() {
        let mut reader = BodyReader::new(ScriptedReceive::chunks(["abcdef"]), "", 4);
        assert_eq!(collect_chunks(&mut reader), ["", "abcd", ""]);
    }

    #[test]
    fn stops_when_transport_reports_no_more_body() {
        let script = ScriptedReceive::chunks(["ab"]);
        let mut reader = BodyReader::new(script, "", 10);
        assert_eq!(collect_chunks(&mut reader), ["", "ab", ""]);
        assert_eq!(reader.receive.calls(), 1);
    }

    #[test]
    fn sized_read_keeps_remainder() {
        let mut reader = BodyReader::new(ScriptedReceive::chunks(["cdef", "gh"]), "ab", 8);
        block_on(async {
            assert_eq!(reader.read(Some(3)).await.unwrap(), "abc");
            assert_eq!(reader.read(Some(2)).await.unwrap(), "de");
            assert_eq!(reader.read(None).await.unwrap(), "fgh");
            assert_eq!(reader.read(None).await.unwrap(), "");
        });
    }

    #[test]
    fn zero_size_drains() {
        let mut reader = BodyReader::new(ScriptedReceive::chunks(["bc"]), "a", 3);
        assert_eq!(block_on(reader.read(Some(0))).unwrap(), "abc");
    }

    #[test]
    fn next_chunk_yields_leftover_first() {
        let mut reader = BodyReader::new(ScriptedReceive::chunks(["cdef"]), "ab", 6);
        block_on(async {
            assert_eq!(reader.read(Some(3)).await.unwrap(), "abc");
            assert_eq!(reader.next_chunk().await.unwrap().unwrap(), "def");
        });
    }

    #[test]
    fn disconnect_surfaces_and_finishes() {
        let script = ScriptedReceive::chunks(Vec::<Bytes>::new()).then_disconnect();
        let mut reader = BodyReader::new(script, "ab", 10);
        block_on(async {
            assert_eq!(reader.next_chunk().await.unwrap().unwrap(), "ab");
            let err = reader.next_chunk().await.unwrap_err();
            assert!(err.is_disconnect());
            assert_eq!(reader.next_chunk().await.unwrap(), None);
        });
    }

    #[test]
    fn stream_adapter_yields_all_chunks() {
        let reader = BodyReader::new(ScriptedReceive::chunks(["b", "c"]), "a", 3);
        let chunks: Vec<Bytes> = block_on(
            reader
                .into_stream()
                .map(|chunk| chunk.unwrap())
                .collect::<Vec<_>>(),
        );
        assert_eq!(chunks, ["a", "b", "c", ""]);
    }
}
