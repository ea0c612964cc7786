//! Basic resumable upload example
//!
//! This example demonstrates:
//! - Starting an upload against a pre-obtained session URI
//! - Listening for progress, errors and completion
//! - Pausing and resuming a running upload
//!
//! Run with: cargo run --example basic_upload -- <session-uri>
//! or set GCS_SESSION_URI

use bytes::Bytes;
use gcs_uploader::{MemorySource, UploadConfig, UploadStatus, Uploader};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let session_uri = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GCS_SESSION_URI").ok())
        .ok_or_else(|| anyhow::anyhow!("usage: basic_upload <session-uri>"))?;

    println!("🚀 Resumable Upload - Basic Example\n");

    // 1 MiB of sample data, sent in 256 KiB chunks
    let data = Bytes::from((0..1024 * 1024).map(|i| (i % 251) as u8).collect::<Vec<u8>>());
    let config = UploadConfig::new(256 * 1024).with_retry_delay(Duration::from_secs(2));
    let uploader = Uploader::new(config)?;

    let session = uploader.run(MemorySource::new(data, "application/octet-stream"), session_uri)?;
    let total = session.total_size();

    session.on_progress(move |sent| println!("   📤 {} / {} bytes", sent, total));
    session.on_error(|err| println!("   ⚠️  {}", err));
    session.on_pause(|| println!("   ⏸️  Paused"));
    session.on_done(|| println!("   ✅ Upload complete"));

    // ==================== Pause and Resume ====================

    tokio::time::sleep(Duration::from_millis(500)).await;
    if session.status() == UploadStatus::InProgress {
        session.pause();
        session.settled().await;
        println!("\n▶️  Resuming from byte {}...", session.progress());
        session.resume();
    }

    let status = session.settled().await;
    println!("\n📋 Finished as {:?} with {:.1}% confirmed", status, session.snapshot().percentage());

    if session.is_stalled() {
        if let Some(err) = session.last_error() {
            println!("   Gave up after {} retries: {}", session.retry_count(), err);
        }
    }

    Ok(())
}
