use std::collections::BTreeMap;

use orion_error::prelude::*;
use rill_config::LatePolicy;
use rill_lang::plan::{AggBinding, WindowPlan};

use crate::agg::Accumulator;
use crate::error::{CoreReason, CoreResult};
use crate::event::{Event, Value};

// ---------------------------------------------------------------------------
// ClosedWindow — emission payload
// ---------------------------------------------------------------------------

/// A finalized window instance: identity, bounds, and the select clause's
/// outputs in clause order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow {
    pub window: String,
    pub bucket: i64,
    pub start_nanos: i64,
    pub end_nanos: i64,
    pub events: u64,
    pub fields: Vec<(String, Value)>,
}

/// Outcome of feeding one event to a window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Accepted,
    /// The event's bucket has already closed and emitted; dropped + counted.
    Late,
}

// ---------------------------------------------------------------------------
// TumblingWindow — per-definition state machine
// ---------------------------------------------------------------------------

/// Tumbling-window manager for one window definition bound to one select
/// clause.
///
/// Bucket `k` covers `[k*interval, (k+1)*interval)` — a boundary timestamp
/// belongs to the right bucket. Instances are created lazily on the first
/// event mapping to their bucket and evicted after emission. Each bucket
/// passes `Empty → Open → Closing → Emitted`; buckets always close in
/// increasing order, driven either by a newer event's timestamp or by an
/// explicit [`advance_to`](Self::advance_to) tick.
pub struct TumblingWindow {
    name: String,
    interval_nanos: i64,
    bindings: Vec<AggBinding>,
    late_policy: LatePolicy,
    /// Open instances keyed by bucket index. Always above `max_closed`.
    open: BTreeMap<i64, Instance>,
    max_closed: Option<i64>,
    late_dropped: u64,
    coercion_skips: u64,
}

#[derive(Debug)]
struct Instance {
    accs: Vec<Accumulator>,
    events: u64,
}

impl Instance {
    fn new(bindings: &[AggBinding]) -> Self {
        Self {
            accs: bindings.iter().map(|b| Accumulator::new(b.kind)).collect(),
            events: 0,
        }
    }
}

impl TumblingWindow {
    pub fn new(
        window: &WindowPlan,
        bindings: Vec<AggBinding>,
        late_policy: LatePolicy,
    ) -> CoreResult<Self> {
        let interval_nanos = i64::try_from(window.interval.as_nanos()).unwrap_or(0);
        if interval_nanos <= 0 {
            return StructError::from(CoreReason::WindowBuild)
                .with_detail(format!(
                    "window `{}`: interval must be a positive duration",
                    window.name,
                ))
                .err();
        }

        Ok(Self {
            name: window.name.clone(),
            interval_nanos,
            bindings,
            late_policy,
            open: BTreeMap::new(),
            max_closed: None,
            late_dropped: 0,
            coercion_skips: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed one event. Any open bucket strictly below the event's bucket is
    /// closed into `out` (in increasing order) before the event is accepted.
    pub fn on_event(&mut self, event: &Event, out: &mut Vec<ClosedWindow>) -> EventOutcome {
        let bucket = event.timestamp_nanos.div_euclid(self.interval_nanos);

        self.close_below(bucket, out);

        if self.max_closed.is_some_and(|mc| bucket <= mc) {
            match self.late_policy {
                LatePolicy::Drop => {
                    self.late_dropped += 1;
                    log::debug!(
                        "window {}: late event at t={} (bucket {} already emitted), dropped",
                        self.name,
                        event.timestamp_nanos,
                        bucket,
                    );
                }
            }
            return EventOutcome::Late;
        }

        let instance = self
            .open
            .entry(bucket)
            .or_insert_with(|| Instance::new(&self.bindings));

        // One pass over the event: one update per accumulator.
        for (binding, acc) in self.bindings.iter().zip(instance.accs.iter_mut()) {
            let sample = match &binding.field {
                Some(path) => match event.numeric_field(path) {
                    Some(v) => Some(v),
                    None => {
                        self.coercion_skips += 1;
                        log::warn!(
                            "window {}: {} is not numeric at t={}; sample skipped for {}",
                            self.name,
                            path,
                            event.timestamp_nanos,
                            binding.kind.name(),
                        );
                        continue;
                    }
                },
                None => None,
            };
            acc.update(sample);
        }
        instance.events += 1;

        EventOutcome::Accepted
    }

    /// Advance observed time to `now_nanos`, closing every open bucket whose
    /// end boundary has been crossed. This is the explicit-tick signal for
    /// idle streams; tests drive it with a virtual clock.
    pub fn advance_to(&mut self, now_nanos: i64, out: &mut Vec<ClosedWindow>) {
        let limit = now_nanos.div_euclid(self.interval_nanos);
        self.close_below(limit, out);
    }

    /// Close and emit every open bucket regardless of time (drain = flush).
    pub fn flush(&mut self, out: &mut Vec<ClosedWindow>) {
        self.close_below(i64::MAX, out);
    }

    /// Drop open buckets without emitting (drain = discard). Returns how
    /// many instances were discarded.
    pub fn discard_open(&mut self) -> usize {
        let n = self.open.len();
        self.open.clear();
        n
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn late_dropped(&self) -> u64 {
        self.late_dropped
    }

    pub fn coercion_skips(&self) -> u64 {
        self.coercion_skips
    }

    // -- private helpers ----------------------------------------------------

    /// Close every open bucket strictly below `limit`, in increasing order.
    fn close_below(&mut self, limit: i64, out: &mut Vec<ClosedWindow>) {
        while let Some((&bucket, _)) = self.open.first_key_value() {
            if bucket >= limit {
                break;
            }
            let instance = self.open.remove(&bucket).expect("first key just observed");
            out.push(self.finalize_instance(bucket, &instance));
            // Buckets pop in ascending order and are always above the
            // previous max_closed.
            self.max_closed = Some(bucket);
        }
    }

    fn finalize_instance(&self, bucket: i64, instance: &Instance) -> ClosedWindow {
        ClosedWindow {
            window: self.name.clone(),
            bucket,
            start_nanos: bucket * self.interval_nanos,
            end_nanos: (bucket + 1) * self.interval_nanos,
            events: instance.events,
            fields: self
                .bindings
                .iter()
                .zip(instance.accs.iter())
                .map(|(b, acc)| (b.key.clone(), acc.finalize()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use rill_lang::ast::FieldPath;
    use rill_lang::plan::AggKind;

    use super::*;

    const SEC: i64 = 1_000_000_000;

    fn value_path() -> FieldPath {
        FieldPath {
            segments: vec!["value".to_string()],
        }
    }

    fn bindings() -> Vec<AggBinding> {
        let field = Some(value_path());
        vec![
            AggBinding {
                key: "count".into(),
                kind: AggKind::Count,
                field: None,
            },
            AggBinding {
                key: "min".into(),
                kind: AggKind::Min,
                field: field.clone(),
            },
            AggBinding {
                key: "max".into(),
                kind: AggKind::Max,
                field: field.clone(),
            },
            AggBinding {
                key: "mean".into(),
                kind: AggKind::Mean,
                field,
            },
        ]
    }

    fn window(interval_secs: u64) -> TumblingWindow {
        TumblingWindow::new(
            &WindowPlan {
                name: "w".into(),
                interval: Duration::from_secs(interval_secs),
            },
            bindings(),
            LatePolicy::Drop,
        )
        .unwrap()
    }

    fn event(t_secs: i64, value: f64) -> Event {
        let mut map = HashMap::new();
        map.insert("value".to_string(), Value::Number(value));
        Event::new(t_secs * SEC, Value::Object(map))
    }

    fn field_value<'a>(cw: &'a ClosedWindow, key: &str) -> &'a Value {
        &cw.fields
            .iter()
            .find(|(k, _)| k == key)
            .unwrap_or_else(|| panic!("missing key {key}"))
            .1
    }

    // -- 1. bucket_rollover_scenario -----------------------------------------

    #[test]
    fn bucket_rollover_scenario() {
        // interval=5s, events at t=1(v=10), t=3(v=20), t=6(v=30):
        // bucket 0 closes with count=2, min=10, max=20, mean=15.
        let mut w = window(5);
        let mut out = Vec::new();

        assert_eq!(w.on_event(&event(1, 10.0), &mut out), EventOutcome::Accepted);
        assert_eq!(w.on_event(&event(3, 20.0), &mut out), EventOutcome::Accepted);
        assert!(out.is_empty());

        assert_eq!(w.on_event(&event(6, 30.0), &mut out), EventOutcome::Accepted);
        assert_eq!(out.len(), 1);

        let cw = &out[0];
        assert_eq!(cw.bucket, 0);
        assert_eq!(cw.start_nanos, 0);
        assert_eq!(cw.end_nanos, 5 * SEC);
        assert_eq!(cw.events, 2);
        assert_eq!(field_value(cw, "count"), &Value::Number(2.0));
        assert_eq!(field_value(cw, "min"), &Value::Number(10.0));
        assert_eq!(field_value(cw, "max"), &Value::Number(20.0));
        assert_eq!(field_value(cw, "mean"), &Value::Number(15.0));

        // Bucket 1 is accumulating the t=6 event.
        assert_eq!(w.open_count(), 1);
    }

    // -- 2. boundary_belongs_to_right_bucket ---------------------------------

    #[test]
    fn boundary_belongs_to_right_bucket() {
        let mut w = window(5);
        let mut out = Vec::new();

        w.on_event(&event(1, 1.0), &mut out);
        // t=5 is exactly the boundary: closes bucket 0, opens bucket 1.
        w.on_event(&event(5, 2.0), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bucket, 0);
        assert_eq!(out[0].events, 1);
        assert_eq!(w.open_count(), 1);
    }

    // -- 3. late_events_drop_and_count ---------------------------------------

    #[test]
    fn late_events_drop_and_count() {
        let mut w = window(5);
        let mut out = Vec::new();

        w.on_event(&event(1, 1.0), &mut out);
        w.on_event(&event(7, 2.0), &mut out); // closes bucket 0
        assert_eq!(out.len(), 1);

        // t=2 maps to the already-emitted bucket 0.
        assert_eq!(w.on_event(&event(2, 3.0), &mut out), EventOutcome::Late);
        assert_eq!(w.late_dropped(), 1);
        // Nothing further emitted; no state was touched.
        assert_eq!(out.len(), 1);
    }

    // -- 4. tick_closes_without_newer_event ----------------------------------

    #[test]
    fn tick_closes_without_newer_event() {
        let mut w = window(5);
        let mut out = Vec::new();

        w.on_event(&event(1, 10.0), &mut out);
        // Time observed up to t=4: bucket 0's end (5s) not crossed yet.
        w.advance_to(4 * SEC, &mut out);
        assert!(out.is_empty());

        // Tick exactly at the end boundary closes the bucket.
        w.advance_to(5 * SEC, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bucket, 0);
        assert_eq!(w.open_count(), 0);
    }

    // -- 5. out_of_order_buckets_close_in_order ------------------------------

    #[test]
    fn out_of_order_buckets_close_in_order() {
        let mut w = window(5);
        let mut out = Vec::new();

        // Bucket 1 opens first, then an older bucket-0 event arrives while
        // nothing has been closed yet.
        w.on_event(&event(6, 60.0), &mut out);
        assert_eq!(w.on_event(&event(2, 20.0), &mut out), EventOutcome::Accepted);
        assert_eq!(w.open_count(), 2);

        // A bucket-2 event closes both, oldest first.
        w.on_event(&event(11, 110.0), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].bucket, 0);
        assert_eq!(out[1].bucket, 1);
    }

    // -- 6. contiguous_buckets_never_overlap ---------------------------------

    #[test]
    fn contiguous_buckets_never_overlap() {
        let mut w = window(5);
        let mut out = Vec::new();
        for t in 0..20 {
            w.on_event(&event(t, t as f64), &mut out);
        }
        w.flush(&mut out);

        assert_eq!(out.len(), 4);
        for (i, cw) in out.iter().enumerate() {
            assert_eq!(cw.bucket, i as i64);
            assert_eq!(cw.start_nanos, cw.bucket * 5 * SEC);
            assert_eq!(cw.end_nanos, (cw.bucket + 1) * 5 * SEC);
            assert_eq!(cw.events, 5);
        }
        // Adjacent buckets share exactly one boundary.
        for pair in out.windows(2) {
            assert_eq!(pair[0].end_nanos, pair[1].start_nanos);
        }
    }

    // -- 7. all_samples_skipped_emits_nulls ----------------------------------

    #[test]
    fn all_samples_skipped_emits_nulls() {
        let mut w = window(5);
        let mut out = Vec::new();

        // "value" is a string: every value-bearing aggregate skips it.
        let mut map = HashMap::new();
        map.insert("value".to_string(), Value::Str("oops".to_string()));
        let ev = Event::new(SEC, Value::Object(map));

        w.on_event(&ev, &mut out);
        w.flush(&mut out);

        let cw = &out[0];
        // count still counts the event; the rest saw zero qualifying samples.
        assert_eq!(field_value(cw, "count"), &Value::Number(1.0));
        assert_eq!(field_value(cw, "min"), &Value::Null);
        assert_eq!(field_value(cw, "max"), &Value::Null);
        assert_eq!(field_value(cw, "mean"), &Value::Null);
        assert_eq!(w.coercion_skips(), 3);
    }

    // -- 8. negative_timestamps_bucket_correctly -----------------------------

    #[test]
    fn negative_timestamps_bucket_correctly() {
        let mut w = window(5);
        let mut out = Vec::new();

        // floor(-1s / 5s) = bucket -1, covering [-5s, 0).
        w.on_event(&event(-1, 1.0), &mut out);
        w.on_event(&event(0, 2.0), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bucket, -1);
        assert_eq!(out[0].start_nanos, -5 * SEC);
        assert_eq!(out[0].end_nanos, 0);
    }

    // -- 9. discard_drops_without_emitting -----------------------------------

    #[test]
    fn discard_drops_without_emitting() {
        let mut w = window(5);
        let mut out = Vec::new();

        w.on_event(&event(1, 1.0), &mut out);
        assert_eq!(w.discard_open(), 1);
        assert!(out.is_empty());
        assert_eq!(w.open_count(), 0);
    }

    // -- 10. zero_interval_rejected ------------------------------------------

    #[test]
    fn zero_interval_rejected() {
        let result = TumblingWindow::new(
            &WindowPlan {
                name: "w".into(),
                interval: Duration::ZERO,
            },
            bindings(),
            LatePolicy::Drop,
        );
        assert!(result.is_err());
    }
}
