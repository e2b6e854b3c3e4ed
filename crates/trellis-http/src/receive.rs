//! The transport receive contract.
//!
//! The server loop is not part of trellis. Whatever drives the connection
//! hands the body over as a sequence of [`Message`]s through [`Receive`];
//! [`BodyReader`](crate::BodyReader) is its only consumer.

use std::future::Future;

use bytes::Bytes;

/// One event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A body chunk.
    Body {
        /// Chunk bytes; may be empty.
        chunk: Bytes,
        /// Whether more chunks follow.
        more_body: bool,
    },
    /// The client went away.
    Disconnect,
}

impl Message {
    /// A body chunk.
    pub fn body(chunk: impl Into<Bytes>, more_body: bool) -> Self {
        Self::Body {
            chunk: chunk.into(),
            more_body,
        }
    }
}

/// Source of body messages for one request.
pub trait Receive: Send {
    /// Wait for the next message.
    fn receive(&mut self) -> impl Future<Output = Message> + Send;
}

impl<R: Receive> Receive for &mut R {
    fn receive(&mut self) -> impl Future<Output = Message> + Send {
        (**self).receive()
    }
}
