//! Command line uploads to a resumable session URI

pub mod config;

pub use config::CliConfig;

use anyhow::Context;
use gcs_uploader::{FileSource, UploadProgress, UploadSession, UploadStatus, Uploader};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of a command line upload
#[derive(Clone, Debug, Serialize)]
pub struct UploadSummary {
    pub file: PathBuf,
    pub status: UploadStatus,
    pub stalled: bool,
    pub progress: UploadProgress,
    pub last_error: Option<String>,
}

impl UploadSummary {
    fn from_session(file: PathBuf, session: &UploadSession, status: UploadStatus) -> Self {
        Self {
            file,
            status,
            stalled: session.is_stalled(),
            progress: session.snapshot(),
            last_error: session.last_error().map(|e| e.to_string()),
        }
    }

    /// Check if every byte was accepted
    pub fn is_complete(&self) -> bool {
        self.status == UploadStatus::Done
    }

    /// One line human readable report
    pub fn render(&self) -> String {
        let mut line = format!(
            "{}: {:?}, {} of {} bytes ({:.1}%)",
            self.file.display(),
            self.status,
            self.progress.bytes_confirmed,
            self.progress.total_bytes,
            self.progress.percentage()
        );
        if self.stalled {
            line.push_str(", stalled after exhausting retries");
        }
        if let Some(err) = &self.last_error {
            line.push_str(&format!(", last error: {}", err));
        }
        line
    }
}

/// Upload the configured file, cancelling on Ctrl-C
pub async fn run_upload(config: CliConfig) -> anyhow::Result<UploadSummary> {
    let mut source = FileSource::open(&config.file)
        .await
        .with_context(|| format!("cannot open {}", config.file.display()))?;
    if let Some(content_type) = &config.content_type {
        source = source.with_content_type(content_type.clone());
    }

    let uploader = Uploader::new(config.upload_config())?;
    let session = uploader.run(source, config.session_uri.clone())?;
    attach_logging(&session);

    let status = tokio::select! {
        status = session.settled() => status,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling upload");
            session.cancel();
            session.settled().await
        }
    };

    Ok(UploadSummary::from_session(config.file, &session, status))
}

fn attach_logging(session: &UploadSession) {
    let total = session.total_size();
    session.on_progress(move |sent| {
        let progress = UploadProgress {
            bytes_confirmed: sent,
            total_bytes: total,
        };
        info!("{:.1}% uploaded ({} / {} bytes)", progress.percentage(), sent, total);
    });
    session.on_error(|err| warn!("upload attempt failed: {}", err));
    session.on_pause(|| info!("upload paused"));
    session.on_cancel(|| warn!("upload cancelled"));
    session.on_done(|| info!("upload complete"));
}
