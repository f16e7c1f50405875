//! CLI entry point for the sensor-network ingest tool.
//!
//! Provides subcommands for converting a single envelope locally, processing
//! one envelope blob from storage, and watching the input prefix for new
//! arrivals.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sensornet_ingest::converters::{Outcome, dispatch};
use sensornet_ingest::{
    config,
    fetch::{BasicClient, fetch_bytes},
    output, storage,
};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sensornet_ingest")]
#[command(about = "Normalize sensor-network payloads into canonical CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one envelope from a file or URL and write a local CSV
    Convert {
        /// Provider identifier the envelope belongs to
        provider_id: String,

        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Directory to write <label>.csv into
        #[arg(short, long, default_value = ".")]
        output_dir: String,

        /// Path to the grid config document
        #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Convert one envelope blob from storage and upload the CSV
    ConsumeBlob {
        /// Bucket holding the input blob
        #[arg(long)]
        bucket: String,

        /// Input key, e.g. json/<provider-id>/<name>
        #[arg(long)]
        key: String,

        /// Bucket for the CSV result (defaults to the input bucket)
        #[arg(long)]
        dest_bucket: Option<String>,

        /// Key prefix for the CSV result
        #[arg(long, default_value = "csv/latest")]
        dest_prefix: String,

        /// Path to the grid config document
        #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
        config: String,

        /// Gzip compress the CSV before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Poll the input prefix and convert envelope blobs as they arrive
    Watch {
        /// Bucket holding the input blobs
        #[arg(long)]
        bucket: String,

        /// Key prefix the providers drop envelopes under
        #[arg(long, default_value = "json")]
        prefix: String,

        /// Bucket for CSV results (defaults to the input bucket)
        #[arg(long)]
        dest_bucket: Option<String>,

        /// Key prefix for CSV results
        #[arg(long, default_value = "csv/latest")]
        dest_prefix: String,

        /// Poll interval in seconds
        #[arg(short = 'r', long, default_value_t = 60)]
        poll_rate: u64,

        /// Number of polling rounds (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_rounds: usize,

        /// Maximum number of blobs processed concurrently
        #[arg(short, long, default_value_t = 5)]
        concurrency: usize,

        /// Path to the grid config document
        #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
        config: String,

        /// Gzip compress CSVs before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/sensornet_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("sensornet_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            provider_id,
            source,
            output_dir,
            config,
        } => {
            let bytes = fetcher(&source).await?;
            let raw =
                String::from_utf8(bytes).context("envelope payload is not UTF-8 text")?;

            // The bounding box is read fresh for every conversion; grid
            // config edits take effect without a restart.
            let bbox = config::load_bounding_box(&config)?;

            match dispatch(&provider_id, &raw, &bbox)? {
                Outcome::NoProvider | Outcome::Unpublishable(_) => {}
                Outcome::Published(result) => {
                    if result.rows.is_empty() {
                        info!(
                            label = result.provider_label,
                            "all rows filtered out, nothing to write"
                        );
                    } else {
                        std::fs::create_dir_all(&output_dir)?;
                        let path = format!("{}/{}.csv", output_dir, result.provider_label);
                        output::write_csv_file(&path, &result.rows)?;
                        info!(path, rows = result.rows.len(), "CSV written");
                    }
                }
            }
        }
        Commands::ConsumeBlob {
            bucket,
            key,
            dest_bucket,
            dest_prefix,
            config,
            gzip,
        } => {
            let aws = aws_config::load_from_env().await;
            let s3 = aws_sdk_s3::Client::new(&aws);
            let dest_bucket = dest_bucket.unwrap_or_else(|| bucket.clone());

            process_blob(&s3, &bucket, &key, &dest_bucket, &dest_prefix, &config, gzip).await?;
        }
        Commands::Watch {
            bucket,
            prefix,
            dest_bucket,
            dest_prefix,
            poll_rate,
            num_rounds,
            concurrency,
            config,
            gzip,
        } => {
            watch(
                &bucket,
                &prefix,
                dest_bucket.unwrap_or_else(|| bucket.clone()),
                &dest_prefix,
                poll_rate,
                num_rounds,
                concurrency,
                &config,
                gzip,
            )
            .await?;
        }
    }

    Ok(())
}

/// Loads an envelope from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %source))]
async fn fetcher(source: &String) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, source).await?
    } else {
        std::fs::read(source)?
    };
    Ok(bytes)
}

/// Downloads one envelope blob, converts it, and uploads the CSV result
/// under a write-unique key.
///
/// The provider identifier is the parent "folder" component of the input
/// key. Keys that don't carry one are logged and skipped, like unknown
/// providers.
#[tracing::instrument(skip(s3, dest_bucket, dest_prefix, config_path, gzip))]
async fn process_blob(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    dest_bucket: &str,
    dest_prefix: &str,
    config_path: &str,
    gzip: bool,
) -> Result<()> {
    let Some(provider_id) = provider_id_from_key(key) else {
        warn!(key, "cannot derive a provider id from blob key");
        return Ok(());
    };

    let bytes = storage::download_blob(s3, bucket, key).await?;
    let raw = String::from_utf8(bytes).context("envelope blob is not UTF-8 text")?;

    // Re-read per event, same as the local mode.
    let bbox = config::load_bounding_box(config_path)?;

    match dispatch(&provider_id, &raw, &bbox)? {
        Outcome::NoProvider | Outcome::Unpublishable(_) => {}
        Outcome::Published(result) => {
            if result.rows.is_empty() {
                info!(
                    label = result.provider_label,
                    "all rows filtered out, nothing to upload"
                );
            } else {
                // Unique per write so concurrent conversions for the same
                // provider never collide.
                let dest_key = format!(
                    "{}/{}-{}.csv",
                    dest_prefix,
                    result.provider_label,
                    Uuid::new_v4()
                );
                let csv = output::to_csv_bytes(&result.rows)?;
                storage::upload_csv(s3, dest_bucket, &dest_key, csv, gzip).await?;
            }
        }
    }

    Ok(())
}

/// Extracts the provider id from a key of the form
/// `<prefix>/<provider-id>/<blob-name>`.
fn provider_id_from_key(key: &str) -> Option<String> {
    Path::new(key)
        .parent()
        .and_then(Path::file_name)
        .and_then(OsStr::to_str)
        .map(str::to_string)
}

/// Polls the input prefix at a fixed interval, converting every blob not yet
/// seen. Blobs are processed concurrently up to `concurrency`; one failing
/// blob never stops the loop.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(dest_bucket, dest_prefix, config_path, gzip))]
async fn watch(
    bucket: &str,
    prefix: &str,
    dest_bucket: String,
    dest_prefix: &str,
    poll_rate: u64,
    num_rounds: usize,
    concurrency: usize,
    config_path: &str,
    gzip: bool,
) -> Result<()> {
    let aws = aws_config::load_from_env().await;
    let s3 = aws_sdk_s3::Client::new(&aws);

    if num_rounds == 0 {
        info!(poll_rate, "Polling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_rounds, poll_rate, "Starting polling");
    }

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(concurrency));
    let mut seen: HashSet<String> = HashSet::new();
    let mut round = 0;

    loop {
        if num_rounds > 0 && round >= num_rounds {
            break;
        }
        round += 1;

        let keys = storage::list_keys(&s3, bucket, prefix).await?;
        let fresh: Vec<String> = keys
            .into_iter()
            .filter(|k| !k.ends_with('/') && !seen.contains(k))
            .collect();

        info!(round, fresh = fresh.len(), "Polling round");

        let mut tasks = vec![];

        for key in fresh {
            seen.insert(key.clone());

            let sem = semaphore.clone();
            let s3 = s3.clone();
            let bucket = bucket.to_string();
            let dest_bucket = dest_bucket.clone();
            let dest_prefix = dest_prefix.to_string();
            let config_path = config_path.to_string();

            let blob_span = tracing::info_span!("process_blob_task", key = %key);

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire().await.unwrap();

                    if let Err(e) = process_blob(
                        &s3,
                        &bucket,
                        &key,
                        &dest_bucket,
                        &dest_prefix,
                        &config_path,
                        gzip,
                    )
                    .await
                    {
                        error!(error = %e, "Blob processing failed");
                    }
                }
                .instrument(blob_span),
            );

            tasks.push(task);
        }

        // Wait for all tasks to complete
        for task in tasks {
            let _ = task.await;
        }

        if num_rounds == 0 || round < num_rounds {
            info!(poll_rate, "Waiting before next round");
            tokio::time::sleep(tokio::time::Duration::from_secs(poll_rate)).await;
        }
    }

    info!("Finished polling");
    Ok(())
}
