//! CLI configuration

use gcs_uploader::{UploadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one command line upload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CliConfig {
    /// File to upload
    pub file: PathBuf,
    /// Pre-obtained resumable session URI
    pub session_uri: String,
    /// Bytes per request
    pub chunk_size: u64,
    /// Automatic retries before the upload stalls
    pub max_retries: u32,
    /// Seconds between retries
    pub retry_delay_secs: u64,
    /// Per-request timeout in seconds, 0 disables it
    pub timeout_secs: u64,
    /// Content type override
    pub content_type: Option<String>,
    /// Print a JSON summary instead of text
    pub json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            session_uri: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: 5,
            timeout_secs: 0,
            content_type: None,
            json: false,
        }
    }
}

impl CliConfig {
    /// Library configuration for this upload
    pub fn upload_config(&self) -> UploadConfig {
        let config = UploadConfig::new(self.chunk_size)
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs));
        match self.timeout_secs {
            0 => config,
            secs => config.with_timeout(Duration::from_secs(secs)),
        }
    }
}
