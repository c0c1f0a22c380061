use orion_error::prelude::*;
use rill_config::{DrainMode, LatePolicy};
use rill_lang::plan::QueryPlan;

use crate::error::{CoreReason, CoreResult};
use crate::event::Event;
use crate::router::{EventRouter, ResultRecord, SinkHandler};
use crate::window::{ClosedWindow, EventOutcome, TumblingWindow};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of a single [`Engine::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    /// Plans that accepted the event.
    pub delivered: usize,
    /// Plans that dropped the event as late.
    pub dropped_late: usize,
    /// Windows closed and emitted as a consequence of this event.
    pub emitted: usize,
}

/// Lifetime counters for one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub events_in: u64,
    pub late_dropped: u64,
    pub coercion_skips: u64,
    pub windows_emitted: u64,
    pub results_delivered: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct PlanRuntime {
    window: TumblingWindow,
    sink_stream: String,
}

/// A compiled query scope: bound plans, their window state, and sink
/// subscriptions.
///
/// The engine is an explicit object rather than process-global state, so a
/// process may run any number of independent instances. All methods take
/// `&mut self`: one owner drives the whole timeline, which is what keeps
/// the close-before-open invariant and per-window emission order.
pub struct Engine {
    plans: Vec<PlanRuntime>,
    router: EventRouter,
    events_in: u64,
    windows_emitted: u64,
    results_delivered: u64,
}

impl Engine {
    /// Wire bound plans into an executable engine.
    pub fn build(plans: Vec<QueryPlan>, late_policy: LatePolicy) -> CoreResult<Self> {
        if plans.is_empty() {
            return StructError::from(CoreReason::EngineBuild)
                .with_detail("no query plans to run")
                .err();
        }

        let mut router = EventRouter::new();
        let mut runtimes = Vec::with_capacity(plans.len());
        for (idx, plan) in plans.into_iter().enumerate() {
            router.add_route(&plan.source_stream, idx);
            let window = TumblingWindow::new(&plan.window, plan.aggregates, late_policy)?;
            runtimes.push(PlanRuntime {
                window,
                sink_stream: plan.sink_stream,
            });
        }

        Ok(Self {
            plans: runtimes,
            router,
            events_in: 0,
            windows_emitted: 0,
            results_delivered: 0,
        })
    }

    /// Register a result handler for a destination stream.
    pub fn subscribe(&mut self, stream: &str, handler: SinkHandler) {
        self.router.subscribe(stream, handler);
    }

    /// Destination streams named by the plans, deduplicated, in plan order.
    pub fn sink_streams(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for plan in &self.plans {
            if !out.contains(&plan.sink_stream.as_str()) {
                out.push(&plan.sink_stream);
            }
        }
        out
    }

    /// Feed one event to every plan reading `stream`.
    ///
    /// Window closures triggered by the event's timestamp are finalized and
    /// delivered before this call returns, oldest bucket first.
    pub fn publish(&mut self, stream: &str, event: &Event) -> PublishReport {
        self.events_in += 1;
        let mut report = PublishReport::default();
        let mut closed: Vec<ClosedWindow> = Vec::new();

        let plan_count = self.router.plans_for(stream).len();
        for i in 0..plan_count {
            let idx = self.router.plans_for(stream)[i];
            match self.plans[idx].window.on_event(event, &mut closed) {
                EventOutcome::Accepted => report.delivered += 1,
                EventOutcome::Late => report.dropped_late += 1,
            }
            report.emitted += self.emit_closed(idx, &mut closed);
        }

        report
    }

    /// Advance observed time for every plan (the explicit clock tick).
    /// Returns the number of windows emitted.
    pub fn tick(&mut self, now_nanos: i64) -> usize {
        let mut emitted = 0;
        let mut closed: Vec<ClosedWindow> = Vec::new();
        for idx in 0..self.plans.len() {
            self.plans[idx].window.advance_to(now_nanos, &mut closed);
            emitted += self.emit_closed(idx, &mut closed);
        }
        emitted
    }

    /// Apply the shutdown drain policy to all open windows. Returns the
    /// number of windows emitted (`flush`) or discarded (`discard`).
    pub fn drain(&mut self, mode: DrainMode) -> usize {
        match mode {
            DrainMode::Flush => {
                let mut emitted = 0;
                let mut closed: Vec<ClosedWindow> = Vec::new();
                for idx in 0..self.plans.len() {
                    self.plans[idx].window.flush(&mut closed);
                    emitted += self.emit_closed(idx, &mut closed);
                }
                emitted
            }
            DrainMode::Discard => {
                let mut discarded = 0;
                for plan in &mut self.plans {
                    discarded += plan.window.discard_open();
                }
                discarded
            }
        }
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            events_in: self.events_in,
            windows_emitted: self.windows_emitted,
            results_delivered: self.results_delivered,
            ..EngineStats::default()
        };
        for plan in &self.plans {
            stats.late_dropped += plan.window.late_dropped();
            stats.coercion_skips += plan.window.coercion_skips();
        }
        stats
    }

    // -- private helpers ----------------------------------------------------

    /// Turn closed windows into result records and deliver them, preserving
    /// bucket order.
    fn emit_closed(&mut self, idx: usize, closed: &mut Vec<ClosedWindow>) -> usize {
        let mut emitted = 0;
        for cw in closed.drain(..) {
            let record = ResultRecord {
                stream: self.plans[idx].sink_stream.clone(),
                fields: cw.fields,
            };
            self.windows_emitted += 1;
            emitted += 1;
            self.results_delivered += self.router.deliver(&record) as u64;
        }
        emitted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
