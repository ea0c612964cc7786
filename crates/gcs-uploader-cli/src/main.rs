//! gcs-upload - resumable upload of a local file to a session URI

use clap::Parser;
use gcs_uploader::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES};
use gcs_uploader_cli::{run_upload, CliConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gcs-upload")]
#[command(about = "Resumable upload of a local file to a pre-obtained session URI")]
#[command(version)]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Resumable upload session URI
    #[arg(short = 'u', long, env = "GCS_SESSION_URI")]
    session_uri: String,

    /// Bytes per request (multiples of 256 KiB are expected by the endpoint)
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE, env = "GCS_CHUNK_SIZE")]
    chunk_size: u64,

    /// Automatic retries before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, env = "GCS_MAX_RETRIES")]
    max_retries: u32,

    /// Seconds to wait between retries
    #[arg(long, default_value = "5", env = "GCS_RETRY_DELAY")]
    retry_delay: u64,

    /// Per-request timeout in seconds (0 = none)
    #[arg(long, default_value = "0", env = "GCS_TIMEOUT")]
    timeout: u64,

    /// Content type to send instead of the one guessed from the file name
    #[arg(long)]
    content_type: Option<String>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, env = "GCS_UPLOAD_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gcs_uploader={},gcs_uploader_cli={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Uploading {}", args.file.display());

    let config = CliConfig {
        file: args.file,
        session_uri: args.session_uri,
        chunk_size: args.chunk_size,
        max_retries: args.max_retries,
        retry_delay_secs: args.retry_delay,
        timeout_secs: args.timeout,
        content_type: args.content_type,
        json: args.json,
    };
    let json = config.json;

    let summary = run_upload(config).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.render());
    }

    if !summary.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}
