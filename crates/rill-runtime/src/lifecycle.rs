use std::sync::Arc;

use orion_error::compat_prelude::*;
use orion_error::op_context;
use orion_error::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rill_config::RillConfig;
use rill_core::{Engine, Value};
use rill_lang::{bind_unit, parse_rql};

use crate::engine_task::{run_engine_task, EngineTaskConfig, IngestEvent};
use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::RuntimeMetrics;
use crate::sink::{run_sink_task, SinkBinding};

// ---------------------------------------------------------------------------
// Task groups
// ---------------------------------------------------------------------------

struct TaskGroup {
    name: &'static str,
    handle: JoinHandle<anyhow::Result<()>>,
}

// ---------------------------------------------------------------------------
// IngestHandle — the runtime input boundary
// ---------------------------------------------------------------------------

/// Clonable handle for pushing events into the runtime:
/// `(stream, record, timestamp) -> ()`.
///
/// The engine task stops once every handle (and the runtime's own copy) is
/// dropped, applying the configured drain policy on the way out.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestEvent>,
}

impl IngestHandle {
    pub async fn publish(
        &self,
        stream: impl Into<String>,
        record: Value,
        timestamp_nanos: i64,
    ) -> RuntimeResult<()> {
        let msg = IngestEvent {
            stream: stream.into(),
            record,
            timestamp_nanos,
        };
        if self.tx.send(msg).await.is_err() {
            return StructError::from(RuntimeReason::Shutdown)
                .with_detail("engine task has stopped")
                .err();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime — the top-level lifecycle handle
// ---------------------------------------------------------------------------

/// Manages the full lifecycle: bootstrap (compile source → build engine →
/// spawn tasks), run, and graceful shutdown.
///
/// Task groups are stored in start order and joined in reverse (LIFO)
/// during [`wait`](Self::wait): the engine task stops first (draining open
/// windows per policy), then the sink task drains the result channel and
/// flushes connectors.
pub struct Runtime {
    cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    ingest_tx: Option<mpsc::Sender<IngestEvent>>,
    metrics: Arc<RuntimeMetrics>,
}

impl Runtime {
    /// Bootstrap the runtime from a configuration, an `.rql` source unit,
    /// and the sink connectors to attach.
    ///
    /// Syntax errors are fatal. Bind errors are fatal only to their own
    /// statement: they are logged and skipped, and bootstrap fails only if
    /// no statement bound at all.
    pub async fn start(
        config: &RillConfig,
        source: &str,
        sinks: Vec<SinkBinding>,
    ) -> RuntimeResult<Self> {
        let mut op = op_context!("engine-bootstrap").with_auto_log();

        // Phase 1: compile the source unit.
        let stmts = parse_rql(source)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .owe(RuntimeReason::Bootstrap)?;
        let outcome = bind_unit(&stmts);
        for err in &outcome.errors {
            rl_warn!(conf, error = %err, "statement skipped");
        }
        if outcome.plans.is_empty() {
            return StructError::from(RuntimeReason::Bootstrap)
                .with_detail("no executable statements in source unit")
                .err();
        }
        let plan_count = outcome.plans.len();

        // Phase 2: build the engine and wire sink subscriptions.
        let mut engine = Engine::build(outcome.plans, config.runtime.late_policy).err_conv()?;

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        for stream in engine
            .sink_streams()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
        {
            let tx = results_tx.clone();
            engine.subscribe(&stream, Box::new(move |record| {
                // Receiver outlives the engine task; a send can only fail
                // during teardown, where dropping the record is fine.
                let _ = tx.send(record.clone());
            }));
        }
        drop(results_tx);

        rl_info!(
            sys,
            plans = plan_count,
            skipped = outcome.errors.len(),
            "engine bootstrap complete"
        );

        // Phase 3: spawn task groups (start order: sink → engine).
        let cancel = CancellationToken::new();
        let (ingest_tx, ingest_rx) = mpsc::channel(config.runtime.channel_capacity);
        let metrics = Arc::new(RuntimeMetrics::new());

        let mut groups = Vec::with_capacity(2);
        groups.push(TaskGroup {
            name: "sink",
            handle: tokio::spawn(run_sink_task(results_rx, sinks)),
        });
        groups.push(TaskGroup {
            name: "engine",
            handle: tokio::spawn(run_engine_task(EngineTaskConfig {
                engine,
                ingest_rx,
                cancel: cancel.child_token(),
                tick_interval: config.runtime.tick_interval.as_duration(),
                drain: config.runtime.drain,
                metrics: Arc::clone(&metrics),
            })),
        });

        op.mark_suc();
        Ok(Self {
            cancel,
            groups,
            ingest_tx: Some(ingest_tx),
            metrics,
        })
    }

    /// A new ingest handle. Panics if called after [`close_ingest`](Self::close_ingest).
    pub fn ingest_handle(&self) -> IngestHandle {
        IngestHandle {
            tx: self
                .ingest_tx
                .as_ref()
                .expect("ingest already closed")
                .clone(),
        }
    }

    /// Drop the runtime's own ingest sender. Once every externally held
    /// [`IngestHandle`] is gone too, the engine task drains and stops.
    pub fn close_ingest(&mut self) {
        self.ingest_tx = None;
    }

    pub fn metrics(&self) -> Arc<RuntimeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Request graceful shutdown of all tasks.
    pub fn shutdown(&self) {
        rl_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    /// Wait for all task groups to complete, joining in LIFO order:
    /// engine first (drains open windows, closes the result channel), then
    /// sink (drains remaining results, flushes connectors).
    pub async fn wait(mut self) -> RuntimeResult<()> {
        self.ingest_tx = None;
        while let Some(group) = self.groups.pop() {
            match group.handle.await {
                Ok(Ok(())) => rl_debug!(sys, task = group.name, "task group stopped"),
                Ok(Err(e)) => {
                    return StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("task {} failed: {e}", group.name))
                        .err();
                }
                Err(e) => {
                    return StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("task {} panicked: {e}", group.name))
                        .err();
                }
            }
        }
        rl_info!(sys, metrics = %self.metrics.snapshot(), "runtime stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Resolve when the process receives ctrl-c.
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        rl_warn!(sys, error = %e, "failed to listen for ctrl-c");
    }
}
