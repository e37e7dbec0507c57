//! Window Runtime - streaming sliding-window statistics
//!
//! Reads JSONL observations, keeps a trailing-window aggregate and emits a
//! JSONL snapshot on a fixed interval.
//!
//! Usage:
//!   cargo run --release --bin window_runtime < observations.jsonl
//!
//! Environment variables:
//!   BUCKET_WIDTH_MS - Bucket resolution (default: 100)
//!   WINDOW_DURATION_MS - Trailing window length (default: 60000)
//!   OBSERVATIONS_INPUT - Input file, `-` for stdin (default: -)
//!   SNAPSHOT_OUTPUT - Output file, `-` for stdout (default: -)
//!   EMISSION_INTERVAL_MS - Snapshot interval (default: 1000)
//!   INGEST_CHANNEL_BUFFER - Channel size (default: 10000)

use dotenv::dotenv;
use env_logger::{Env, Target};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use windowstat::clock::{Clock, SystemClock};
use windowstat::config::RuntimeConfig;
use windowstat::ingestion::{start_ingestion, IngestMessage};
use windowstat::snapshot_writer::{JsonlSnapshotWriter, SnapshotSink};
use windowstat::source::{forward_lines, open_input};
use windowstat::window::WindowAggregator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Logs go to stderr so stdout stays clean for snapshots
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .init();

    info!("🚀 Window Runtime");

    let config = RuntimeConfig::from_env()?;

    info!("✅ Configuration loaded");
    info!("   ├─ Bucket width: {:?}", config.window.bucket_width);
    info!("   ├─ Window duration: {:?}", config.window.window_duration);
    info!("   ├─ Buckets: {}", config.window.capacity());
    info!("   ├─ Emission interval: {}ms", config.emission_interval_ms);
    info!("   └─ Channel buffer: {}", config.channel_buffer);

    let aggregator = Arc::new(WindowAggregator::new(config.window)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sink: Box<dyn SnapshotSink> = match &config.output_path {
        Some(path) => Box::new(JsonlSnapshotWriter::open(path)?),
        None => Box::new(JsonlSnapshotWriter::stdout()),
    };

    let input = open_input(config.input_path.as_deref()).await?;
    let (tx, rx) = mpsc::channel::<IngestMessage>(config.channel_buffer);

    let reader_tx = tx.clone();
    let mut reader = tokio::spawn(async move { forward_lines(input, reader_tx).await });

    let ingestion = tokio::spawn(start_ingestion(
        rx,
        aggregator,
        clock,
        sink,
        Duration::from_millis(config.emission_interval_ms),
    ));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    tokio::select! {
        result = &mut reader => match result {
            Ok(Ok(lines)) => info!("📭 Input exhausted after {} lines", lines),
            Ok(Err(e)) => error!("❌ Failed to read observations: {}", e),
            Err(e) => error!("❌ Reader task failed: {}", e),
        },
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
            Err(e) => error!("❌ Failed to listen for CTRL+C: {}", e),
        },
    }

    reader.abort();
    // Queued lines are processed before the shutdown message
    let _ = tx.send(IngestMessage::Shutdown).await;
    drop(tx);

    match ingestion.await? {
        Ok(stats) => {
            info!(
                "✅ Window runtime stopped ({} processed, {} snapshots)",
                stats.processed(),
                stats.snapshots
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Window runtime aborted: {}", e);
            Err(e.into())
        }
    }
}
