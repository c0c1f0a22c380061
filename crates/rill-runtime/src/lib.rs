#[macro_use]
mod log_macros;

pub mod engine_task;
mod error;
pub mod lifecycle;
pub mod metrics;
pub mod sink;
pub mod tracing_init;

pub use engine_task::IngestEvent;
pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use lifecycle::{wait_for_signal, IngestHandle, Runtime};
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use sink::{JsonlFileSink, SinkBinding, SinkConnector, StdoutSink};
