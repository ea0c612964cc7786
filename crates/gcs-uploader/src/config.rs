//! Upload configuration

use crate::{Result, UploadError};
use std::time::Duration;

/// Default chunk size (100 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Default number of automatic retries after consecutive failures
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between automatic retries
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Resumable endpoints only accept non-final chunks in multiples of this size
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;

/// Upload configuration
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Bytes sent per request, fixed for the lifetime of an upload
    pub chunk_size: u64,
    /// Maximum automatic retries before the session stalls
    pub max_retries: u32,
    /// Delay before each automatic retry
    pub retry_delay: Duration,
    /// Per-request timeout, `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// User agent string
    pub user_agent: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: None,
            user_agent: format!("gcs-uploader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UploadConfig {
    /// Create a config with the given chunk size
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            ..Default::default()
        }
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retries
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the configuration before an upload starts
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UploadError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size % CHUNK_GRANULARITY != 0 {
            tracing::warn!(
                chunk_size = self.chunk_size,
                "chunk size is not a multiple of {} bytes, the endpoint may reject non-final chunks",
                CHUNK_GRANULARITY
            );
        }
        Ok(())
    }
}
