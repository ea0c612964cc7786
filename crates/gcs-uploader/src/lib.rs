//! # GCS Uploader
//!
//! Resumable, chunked uploads of large files to a cloud object-storage
//! session URI.
//!
//! ## Features
//!
//! - **Resumable**: every chunk is acknowledged by the endpoint, which stays
//!   the authority on how many bytes it persisted
//! - **Retries**: transient failures are retried from a status probe after a
//!   fixed delay
//! - **Control**: pause, resume and cancel while the upload runs
//! - **Events**: progress, error, done, cancel and pause listeners, with
//!   events buffered until a listener is attached
//!
//! The session URI itself must be obtained beforehand, usually by a server
//! that holds the storage credentials.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gcs_uploader::{FileSource, UploadConfig, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let uploader = Uploader::new(UploadConfig::new(8 * 1024 * 1024))?;
//!     let source = FileSource::open("video.mp4").await?;
//!
//!     let upload = uploader.run(source, session_uri)?;
//!     upload.on_progress(|sent| println!("Sent {} bytes", sent));
//!     upload.on_error(|err| eprintln!("Attempt failed: {}", err));
//!     upload.on_done(|| println!("File uploaded"));
//!
//!     // upload.pause();
//!     // upload.resume();
//!     // upload.cancel();
//!
//!     upload.settled().await;
//!     Ok(())
//! }
//! ```

mod chunk;
mod client;
mod config;
mod error;
mod events;
mod protocol;
mod session;
mod source;
mod transport;

#[cfg(test)]
mod testing;

pub use chunk::{Chunk, ChunkSource, ReadAt};
pub use client::{run, Uploader};
pub use config::{
    UploadConfig, CHUNK_GRANULARITY, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
pub use error::{Result, UploadError};
pub use events::{EventKind, Listener, UploadEvent};
pub use protocol::{
    interpret_response, parse_range_end, ContentRange, ExchangeOutcome, UploadRequest,
    RESUME_INCOMPLETE,
};
pub use session::{UploadProgress, UploadSession, UploadStatus};
pub use source::{ByteSource, FileSource, MemorySource};
pub use transport::{
    HttpTransport, ReqwestTransport, SendProgress, TransportResponse, SEND_PIECE_SIZE,
};
