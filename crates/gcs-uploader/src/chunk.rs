//! Sequential chunk reader over a byte source

use crate::{ByteSource, Result, UploadError};
use bytes::Bytes;
use std::sync::Arc;

/// Where the next chunk should be read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadAt {
    /// Ask the endpoint for its confirmed offset, read nothing
    Probe,
    /// Continue from the internal cursor
    Cursor,
    /// Read from an explicit offset
    Offset(u64),
}

/// A chunk of file data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Offset of the first byte in the source
    pub offset: u64,
    /// Chunk bytes
    pub data: Bytes,
}

impl Chunk {
    /// Number of bytes in the chunk
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Produces non-overlapping chunks of a byte source on demand.
///
/// There is no prefetch: every call to [`ChunkSource::next`] performs exactly
/// one bounded read.
pub struct ChunkSource {
    source: Arc<dyn ByteSource>,
    chunk_size: u64,
    cursor: u64,
}

impl ChunkSource {
    /// Create a reader with a fixed chunk size
    pub fn new(source: Arc<dyn ByteSource>, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(UploadError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            source,
            chunk_size,
            cursor: 0,
        })
    }

    /// Total size of the underlying source
    pub fn total_size(&self) -> u64 {
        self.source.size()
    }

    /// Content type of the underlying source
    pub fn content_type(&self) -> &str {
        self.source.content_type()
    }

    /// Configured chunk size
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Offset of the next unread byte
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Read the next chunk. A probe resolves to `None` without touching the
    /// source.
    pub async fn next(&mut self, at: ReadAt) -> Result<Option<Chunk>> {
        let offset = match at {
            ReadAt::Probe => return Ok(None),
            ReadAt::Cursor => self.cursor,
            ReadAt::Offset(offset) => offset,
        };

        let total = self.source.size();
        let offset = offset.min(total);
        let limit = self.chunk_size.min(total - offset);

        let data = self
            .source
            .read(offset, limit)
            .await
            .map_err(|source| UploadError::Read { offset, source })?;

        // Sources may hand back more than asked for; never step past the limit.
        let data = if data.len() as u64 > limit {
            data.slice(..limit as usize)
        } else {
            data
        };

        self.cursor = offset + data.len() as u64;
        Ok(Some(Chunk { offset, data }))
    }
}
