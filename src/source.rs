//! Line source - feeds raw JSONL observations into the ingestion channel

use crate::ingestion::IngestMessage;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Open `path` for line reading, or stdin when `None`
pub async fn open_input(
    path: Option<&Path>,
) -> std::io::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            log::info!("📂 Reading observations from: {}", path.display());
            Box::new(BufReader::new(file))
        }
        None => {
            log::info!("📂 Reading observations from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };
    Ok(reader)
}

/// Forward every non-blank line to `tx` until EOF or the receiver is dropped.
///
/// Returns the number of lines forwarded.
pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<IngestMessage>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if tx.send(IngestMessage::Line(line.to_string())).await.is_err() {
            log::warn!("⚠️  Ingestion channel closed, stopping reader");
            break;
        }
        forwarded += 1;
    }

    log::debug!("Reader finished after {} lines", forwarded);
    Ok(forwarded)
}
