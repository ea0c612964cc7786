//! Byte sources the uploader reads from

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// A readable, fixed-size source of bytes
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total size in bytes
    fn size(&self) -> u64;

    /// MIME type sent with data requests
    fn content_type(&self) -> &str;

    /// Read up to `limit` bytes starting at `offset`.
    ///
    /// The returned buffer holds the bytes actually read and may be shorter
    /// than `limit` only at the end of the source.
    async fn read(&self, offset: u64, limit: u64) -> std::io::Result<Bytes>;
}

/// An in-memory byte source
#[derive(Clone, Debug)]
pub struct MemorySource {
    data: Bytes,
    content_type: String,
}

impl MemorySource {
    /// Wrap a buffer
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read(&self, offset: u64, limit: u64) -> std::io::Result<Bytes> {
        let len = self.data.len() as u64;
        let start = offset.min(len);
        let end = offset.saturating_add(limit).min(len);
        Ok(self.data.slice(start as usize..end as usize))
    }
}

/// A byte source backed by a local file
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
    size: u64,
    content_type: String,
}

impl FileSource {
    /// Open a file, guessing its content type from the extension
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        let size = file.metadata().await?.len();
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!(path = %path.display(), size, %content_type, "opened file source");

        Ok(Self {
            path,
            file: Mutex::new(file),
            size,
            content_type,
        })
    }

    /// Override the guessed content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read(&self, offset: u64, limit: u64) -> std::io::Result<Bytes> {
        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(limit.min(self.size.saturating_sub(offset)) as usize);
        (&mut *file).take(limit).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
