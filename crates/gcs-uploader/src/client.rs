//! Upload entry points

use crate::{
    ByteSource, ChunkSource, HttpTransport, ReqwestTransport, Result, UploadConfig, UploadError,
    UploadSession,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Starts resumable uploads against pre-obtained session URIs
pub struct Uploader {
    config: UploadConfig,
    transport: Arc<dyn HttpTransport>,
}

impl Uploader {
    /// Create an uploader with the default `reqwest` transport
    pub fn new(config: UploadConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self { config, transport })
    }

    /// Create an uploader with a custom transport
    pub fn with_transport(config: UploadConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// Get the configuration
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Start uploading `source` to `session_uri`.
    ///
    /// Returns as soon as the transfer loop is scheduled; the first request
    /// is sent in the background. Must be called from within a tokio runtime.
    pub fn run(
        &self,
        source: impl ByteSource + 'static,
        session_uri: impl Into<String>,
    ) -> Result<UploadSession> {
        self.run_shared(Arc::new(source), session_uri.into())
    }

    /// Start uploading a shared source
    #[instrument(skip(self, source), fields(size = source.size()))]
    pub fn run_shared(
        &self,
        source: Arc<dyn ByteSource>,
        session_uri: String,
    ) -> Result<UploadSession> {
        url::Url::parse(&session_uri).map_err(|e| {
            UploadError::Config(format!("invalid session URI {}: {}", session_uri, e))
        })?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            UploadError::Config("uploads must be started from within a tokio runtime".to_string())
        })?;

        let chunks = ChunkSource::new(source, self.config.chunk_size)?;
        info!(
            chunk_size = self.config.chunk_size,
            content_type = chunks.content_type(),
            "starting resumable upload"
        );

        Ok(UploadSession::start(
            chunks,
            session_uri,
            &self.config,
            Arc::clone(&self.transport),
            runtime,
        ))
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader").field("config", &self.config).finish()
    }
}

/// Upload `source` to `session_uri` with the default configuration,
/// optionally overriding the chunk size.
pub fn run(
    source: impl ByteSource + 'static,
    session_uri: impl Into<String>,
    chunk_size: Option<u64>,
) -> Result<UploadSession> {
    let mut config = UploadConfig::default();
    if let Some(chunk_size) = chunk_size {
        config.chunk_size = chunk_size;
    }
    Uploader::new(config)?.run(source, session_uri)
}
