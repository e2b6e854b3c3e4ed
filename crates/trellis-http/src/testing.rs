//! In-memory transport for tests.

use std::collections::VecDeque;
use std::future::{ready, Future};

use bytes::Bytes;

use crate::receive::{Message, Receive};

/// A [`Receive`] that replays a fixed script of messages.
///
/// Once the script runs out every call yields [`Message::Disconnect`], the
/// way a server reports a closed connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReceive {
    script: VecDeque<Message>,
    calls: usize,
}

impl ScriptedReceive {
    /// Replay `messages` in order.
    #[must_use]
    pub fn new(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            script: messages.into_iter().collect(),
            calls: 0,
        }
    }

    /// Deliver `chunks` as body messages, the last one with `more_body` unset.
    #[must_use]
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let chunks: Vec<Bytes> = chunks.into_iter().map(Into::into).collect();
        let last = chunks.len().saturating_sub(1);
        Self::new(
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| Message::body(chunk, i != last)),
        )
    }

    /// Split `body` into chunks of `size` bytes.
    #[must_use]
    pub fn split(body: &[u8], size: usize) -> Self {
        Self::chunks(body.chunks(size.max(1)).map(Bytes::copy_from_slice))
    }

    /// Append a disconnect to the script.
    #[must_use]
    pub fn then_disconnect(mut self) -> Self {
        self.script.push_back(Message::Disconnect);
        self
    }

    /// Number of `receive` calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Receive for ScriptedReceive {
    fn receive(&mut self) -> impl Future<Output = Message> + Send {
        self.calls += 1;
        ready(self.script.pop_front().unwrap_or(Message::Disconnect))
    }
}
