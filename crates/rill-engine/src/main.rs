use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use rill_config::RillConfig;
use rill_core::Value;
use rill_runtime::tracing_init::init_tracing;
use rill_runtime::{wait_for_signal, JsonlFileSink, Runtime, SinkBinding, StdoutSink};

#[derive(Parser)]
#[command(name = "rill", about = "Tumbling-window streaming aggregation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query, reading JSONL events from stdin
    Run {
        /// Path to the .rql query file
        query: PathBuf,
        /// Path to rill.toml config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write results to this JSONL file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { query, config, out } => run(query, config, out).await,
    }
}

async fn run(query: PathBuf, config_path: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let (config, base_dir) = match config_path {
        Some(path) => {
            let path = path
                .canonicalize()
                .map_err(|e| anyhow!("config path '{}': {e}", path.display()))?;
            let config = RillConfig::load(&path)?;
            let base_dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, base_dir)
        }
        None => (RillConfig::default(), PathBuf::from(".")),
    };

    let _guard = init_tracing(&config.logging, &base_dir)?;

    let source = std::fs::read_to_string(&query)
        .map_err(|e| anyhow!("query file '{}': {e}", query.display()))?;

    let sink: SinkBinding = match &out {
        Some(path) => SinkBinding::all_streams(Box::new(JsonlFileSink::create(path).await?)),
        None => SinkBinding::all_streams(Box::new(StdoutSink::new())),
    };

    let mut runtime = Runtime::start(&config, &source, vec![sink])
        .await
        .map_err(|e| anyhow!("{e}"))?;
    let handle = runtime.ingest_handle();
    let metrics = runtime.metrics();

    // Feed stdin JSONL until EOF or ctrl-c.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = wait_for_signal() => {
                runtime.shutdown();
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_ingest_line(&line) {
                        Ok((stream, record, ts)) => {
                            if let Err(e) = handle.publish(stream, record, ts).await {
                                bail!("ingest failed: {e}");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "skipping malformed input line"),
                    }
                }
                None => break,
            }
        }
    }

    drop(handle);
    runtime.close_ingest();
    runtime.wait().await.map_err(|e| anyhow!("{e}"))?;
    tracing::info!(metrics = %metrics.snapshot(), "done");
    Ok(())
}

/// Split one stdin line into `(stream, record, timestamp)`.
///
/// The envelope fields are `stream` (default `"in"`) and `ts` (nanoseconds
/// since the epoch, or an RFC 3339 string; defaults to now). Everything
/// else is the event record.
fn parse_ingest_line(line: &str) -> Result<(String, Value, i64)> {
    let mut json: serde_json::Value = serde_json::from_str(line)?;
    let Some(obj) = json.as_object_mut() else {
        bail!("event must be a JSON object");
    };

    let stream = match obj.remove("stream") {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => bail!("'stream' must be a string, got {other}"),
        None => "in".to_string(),
    };

    let ts = match obj.remove("ts") {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| anyhow!("'ts' must be an integer nanosecond timestamp"))?,
        Some(serde_json::Value::String(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map_err(|e| anyhow!("'ts' is not RFC 3339: {e}"))?
            .timestamp_nanos_opt()
            .ok_or_else(|| anyhow!("'ts' is out of the nanosecond range"))?,
        Some(other) => bail!("'ts' must be a number or RFC 3339 string, got {other}"),
        None => chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
    };

    Ok((stream, Value::from(json), ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_timestamp() {
        let (stream, record, ts) =
            parse_ingest_line(r#"{"stream": "in", "ts": 5000000000, "value": 10}"#).unwrap();
        assert_eq!(stream, "in");
        assert_eq!(ts, 5_000_000_000);
        assert_eq!(
            record.get_path(&["value".to_string()]),
            Some(&Value::Number(10.0)),
        );
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        let (_, _, ts) =
            parse_ingest_line(r#"{"ts": "1970-01-01T00:00:05Z", "value": 1}"#).unwrap();
        assert_eq!(ts, 5_000_000_000);
    }

    #[test]
    fn defaults_stream_name() {
        let (stream, _, _) = parse_ingest_line(r#"{"ts": 0, "value": 1}"#).unwrap();
        assert_eq!(stream, "in");
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_ingest_line("[1, 2]").is_err());
        assert!(parse_ingest_line(r#"{"ts": true}"#).is_err());
    }
}
