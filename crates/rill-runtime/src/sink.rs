use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

use rill_core::ResultRecord;

// ---------------------------------------------------------------------------
// SinkConnector — the runtime output boundary
// ---------------------------------------------------------------------------

/// Connector receiving finalized result records for a destination stream.
///
/// Records arrive in per-window emission order (bucket N strictly before
/// bucket N+1 for the same definition).
#[async_trait]
pub trait SinkConnector: Send {
    async fn deliver(&mut self, record: &ResultRecord) -> anyhow::Result<()>;

    /// Called once when the runtime stops, after the last record.
    async fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Pairs a connector with the destination stream it consumes. A `None`
/// stream subscribes the connector to every destination stream.
pub struct SinkBinding {
    pub stream: Option<String>,
    pub connector: Box<dyn SinkConnector>,
}

impl SinkBinding {
    pub fn for_stream(stream: impl Into<String>, connector: Box<dyn SinkConnector>) -> Self {
        Self {
            stream: Some(stream.into()),
            connector,
        }
    }

    pub fn all_streams(connector: Box<dyn SinkConnector>) -> Self {
        Self {
            stream: None,
            connector,
        }
    }

    fn wants(&self, stream: &str) -> bool {
        self.stream.as_deref().is_none_or(|s| s == stream)
    }
}

// ---------------------------------------------------------------------------
// Sink task
// ---------------------------------------------------------------------------

/// Consume finalized results until the channel closes, then flush every
/// connector. Single consumer + FIFO channel preserves emission order end
/// to end.
pub(crate) async fn run_sink_task(
    mut rx: mpsc::UnboundedReceiver<ResultRecord>,
    mut sinks: Vec<SinkBinding>,
) -> anyhow::Result<()> {
    while let Some(record) = rx.recv().await {
        for binding in sinks.iter_mut() {
            if !binding.wants(&record.stream) {
                continue;
            }
            if let Err(e) = binding.connector.deliver(&record).await {
                rl_warn!(sink, stream = %record.stream, error = %e, "sink delivery failed");
            }
        }
    }
    for binding in sinks.iter_mut() {
        if let Err(e) = binding.connector.flush().await {
            rl_warn!(sink, error = %e, "sink flush failed");
        }
    }
    rl_debug!(sink, "sink task stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// JsonlFileSink
// ---------------------------------------------------------------------------

/// Appends each result record as one JSON line.
pub struct JsonlFileSink {
    writer: BufWriter<tokio::fs::File>,
}

impl JsonlFileSink {
    pub async fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
                })?;
            }
        }
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl SinkConnector for JsonlFileSink {
    async fn deliver(&mut self, record: &ResultRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(&record.to_json())?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StdoutSink
// ---------------------------------------------------------------------------

/// Writes each result record as one JSON line to stdout.
pub struct StdoutSink {
    stdout: tokio::io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SinkConnector for StdoutSink {
    async fn deliver(&mut self, record: &ResultRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&record.to_json())?;
        line.push('\n');
        self.stdout.write_all(line.as_bytes()).await?;
        self.stdout.flush().await?;
        Ok(())
    }
}
