//! Upload error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// The byte source could not produce the requested range
    #[error("Read error at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a custom transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// A 308 response without a usable `Range` header
    #[error("Invalid 'Range' header received: {0}")]
    InvalidRange(String),

    /// The endpoint answered with a status outside the protocol
    #[error("Unexpected response status: {status}")]
    UnexpectedStatus { status: u16 },

    /// Invalid configuration or arguments
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Check if the byte source failed
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Check if the request could not be sent or its response not received
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Transport(_))
    }

    /// Check if the endpoint answered outside the resumable protocol
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::InvalidRange(_) | Self::UnexpectedStatus { .. })
    }
}
