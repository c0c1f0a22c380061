use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use rill_config::DrainMode;
use rill_core::{Engine, Event, Value};

use crate::metrics::RuntimeMetrics;

// ---------------------------------------------------------------------------
// IngestEvent — the runtime input boundary
// ---------------------------------------------------------------------------

/// One message over the ingest channel: `(stream, record, timestamp)`.
#[derive(Debug, Clone)]
pub struct IngestEvent {
    pub stream: String,
    pub record: Value,
    pub timestamp_nanos: i64,
}

// ---------------------------------------------------------------------------
// Engine task
// ---------------------------------------------------------------------------

pub(crate) struct EngineTaskConfig {
    pub engine: Engine,
    pub ingest_rx: mpsc::Receiver<IngestEvent>,
    pub cancel: CancellationToken,
    pub tick_interval: Duration,
    pub drain: DrainMode,
    pub metrics: Arc<RuntimeMetrics>,
}

/// Run the engine until cancelled or until every ingest handle is dropped.
///
/// The task exclusively owns the [`Engine`] — the single-writer discipline
/// that keeps window state transitions ordered. A periodic tick advances
/// window time with the wall clock so idle streams still close; deployments
/// whose event time is far from the wall clock should raise
/// `runtime.tick_interval` accordingly.
pub(crate) async fn run_engine_task(config: EngineTaskConfig) -> anyhow::Result<()> {
    let EngineTaskConfig {
        mut engine,
        mut ingest_rx,
        cancel,
        tick_interval,
        drain,
        metrics,
    } = config;

    // First tick only after a full interval; an immediate tick would close
    // windows before any event arrives.
    let mut tick = tokio::time::interval_at(
        tokio::time::Instant::now() + tick_interval,
        tick_interval,
    );
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Route whatever is already queued before applying the
                // drain policy.
                while let Ok(msg) = ingest_rx.try_recv() {
                    process(&mut engine, &metrics, msg);
                }
                finish(&mut engine, &metrics, drain);
                rl_debug!(pipe, "engine task shutdown complete");
                break;
            }
            maybe = ingest_rx.recv() => match maybe {
                Some(msg) => process(&mut engine, &metrics, msg),
                None => {
                    finish(&mut engine, &metrics, drain);
                    rl_debug!(pipe, "ingest channel closed, engine task stopping");
                    break;
                }
            },
            _ = tick.tick() => {
                let emitted = engine.tick(wall_clock_nanos());
                if emitted > 0 {
                    metrics.add_windows_emitted(emitted as u64);
                    rl_debug!(pipe, emitted, "tick closed windows");
                }
            }
        }
    }
    Ok(())
}

fn process(engine: &mut Engine, metrics: &RuntimeMetrics, msg: IngestEvent) {
    let event = Event::new(msg.timestamp_nanos, msg.record);
    let report = engine.publish(&msg.stream, &event);
    metrics.record_publish(&report);
}

fn finish(engine: &mut Engine, metrics: &RuntimeMetrics, drain: DrainMode) {
    let n = engine.drain(drain);
    match drain {
        DrainMode::Flush => {
            metrics.add_windows_emitted(n as u64);
            rl_info!(pipe, windows = n, "flushed open windows on drain");
        }
        DrainMode::Discard => {
            if n > 0 {
                rl_info!(pipe, windows = n, "discarded open windows on drain");
            }
        }
    }
    metrics.set_coercion_skips(engine.stats().coercion_skips);
}

fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}
