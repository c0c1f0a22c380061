use std::time::Duration;

use serde::Deserialize;

use crate::types::HumanDuration;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What to do with an event whose bucket has already closed and emitted.
///
/// Only `drop` exists today; the enum leaves room for a side-output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatePolicy {
    /// Drop the event and increment the late-event counter.
    Drop,
}

/// What to do with windows still open when the engine shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainMode {
    /// Drop open windows without emitting.
    Discard,
    /// Close and emit open windows before exiting.
    Flush,
}

// ---------------------------------------------------------------------------
// RuntimeConfig — deserialized from [runtime]
// ---------------------------------------------------------------------------

/// Runtime behavior knobs. All fields have defaults so the `[runtime]`
/// section may be omitted entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub late_policy: LatePolicy,
    pub drain: DrainMode,
    /// Capacity of the ingest channel between connectors and the engine task.
    pub channel_capacity: usize,
    /// How often the engine task advances window time without new events.
    pub tick_interval: HumanDuration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            late_policy: LatePolicy::Drop,
            drain: DrainMode::Discard,
            channel_capacity: 1024,
            tick_interval: HumanDuration::new(Duration::from_secs(1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
