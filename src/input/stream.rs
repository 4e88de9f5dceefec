//! Append-only buffer for streamed input.
//!
//! Chunks are collected while the stream is open and concatenated exactly
//! once when it is frozen. A frozen buffer never accepts more data.

use std::sync::Arc;

use crate::error::Error;

#[derive(Debug, Clone)]
pub enum StreamBuffer {
    Open(Vec<Vec<u8>>),
    Frozen(Arc<[u8]>),
}

impl Default for StreamBuffer {
    fn default() -> Self {
        StreamBuffer::Open(Vec::new())
    }
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &[u8]) -> Result<(), Error> {
        match self {
            StreamBuffer::Open(chunks) => {
                chunks.push(chunk.to_vec());
                Ok(())
            }
            StreamBuffer::Frozen(_) => Err(Error::StreamClosed),
        }
    }

    /// Flatten the collected chunks. Later calls return the same bytes.
    pub fn freeze(&mut self) -> Arc<[u8]> {
        match self {
            StreamBuffer::Frozen(bytes) => Arc::clone(bytes),
            StreamBuffer::Open(chunks) => {
                let bytes: Arc<[u8]> = chunks.concat().into();
                *self = StreamBuffer::Frozen(Arc::clone(&bytes));
                bytes
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, StreamBuffer::Frozen(_))
    }

    /// Total bytes received so far.
    pub fn len(&self) -> usize {
        match self {
            StreamBuffer::Open(chunks) => chunks.iter().map(Vec::len).sum(),
            StreamBuffer::Frozen(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The flattened bytes, once frozen.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            StreamBuffer::Frozen(bytes) => Some(&bytes[..]),
            StreamBuffer::Open(_) => None,
        }
    }
}
