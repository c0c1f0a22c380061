use std::collections::HashMap;
use std::fmt;

use crate::event::Value;

// ---------------------------------------------------------------------------
// ResultRecord
// ---------------------------------------------------------------------------

/// Finalized window result bound for a destination stream.
///
/// `fields` preserves select-clause order; [`to_json`](Self::to_json)
/// produces the mapping-shaped record delivered over the output boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub stream: String,
    pub fields: Vec<(String, Value)>,
}

impl ResultRecord {
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// EventRouter
// ---------------------------------------------------------------------------

/// Handler invoked synchronously, in emission order, for each result
/// delivered to a subscribed destination stream.
pub type SinkHandler = Box<dyn FnMut(&ResultRecord) + Send>;

/// Routing table for one engine: input streams → plan indices, destination
/// streams → sink handlers.
///
/// Destination streams need no prior declaration — they exist from the
/// first write — and delivering to a stream nobody subscribed to is a
/// no-op.
#[derive(Default)]
pub struct EventRouter {
    routes: HashMap<String, Vec<usize>>,
    sinks: HashMap<String, Vec<SinkHandler>>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("input_streams", &self.routes.keys().collect::<Vec<_>>())
            .field("sink_streams", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a plan to an input stream. Per-stream delivery order follows
    /// registration order.
    pub(crate) fn add_route(&mut self, stream: &str, plan_idx: usize) {
        self.routes
            .entry(stream.to_string())
            .or_default()
            .push(plan_idx);
    }

    /// Plans subscribed to an input stream, in registration order.
    pub(crate) fn plans_for(&self, stream: &str) -> &[usize] {
        self.routes.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register a result handler for a destination stream.
    pub fn subscribe(&mut self, stream: &str, handler: SinkHandler) {
        self.sinks
            .entry(stream.to_string())
            .or_default()
            .push(handler);
    }

    /// Deliver a result to every handler subscribed to its stream. Returns
    /// the number of handlers invoked.
    pub fn deliver(&mut self, record: &ResultRecord) -> usize {
        let Some(handlers) = self.sinks.get_mut(&record.stream) else {
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(record);
        }
        handlers.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn record(stream: &str, n: f64) -> ResultRecord {
        ResultRecord {
            stream: stream.to_string(),
            fields: vec![("n".to_string(), Value::Number(n))],
        }
    }

    // -- 1. deliver_reaches_subscribers --------------------------------------

    #[test]
    fn deliver_reaches_subscribers() {
        let mut router = EventRouter::new();
        let (tx, rx) = mpsc::channel();
        router.subscribe("out", Box::new(move |r| tx.send(r.clone()).unwrap()));

        assert_eq!(router.deliver(&record("out", 1.0)), 1);
        assert_eq!(router.deliver(&record("out", 2.0)), 1);

        let got: Vec<ResultRecord> = rx.try_iter().collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].fields[0].1, Value::Number(1.0));
        assert_eq!(got[1].fields[0].1, Value::Number(2.0));
    }

    // -- 2. unsubscribed_stream_is_noop --------------------------------------

    #[test]
    fn unsubscribed_stream_is_noop() {
        let mut router = EventRouter::new();
        assert_eq!(router.deliver(&record("nowhere", 1.0)), 0);
    }

    // -- 3. multiple_handlers_all_invoked ------------------------------------

    #[test]
    fn multiple_handlers_all_invoked() {
        let mut router = EventRouter::new();
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        router.subscribe("out", Box::new(move |r| tx_a.send(r.clone()).unwrap()));
        router.subscribe("out", Box::new(move |r| tx_b.send(r.clone()).unwrap()));

        assert_eq!(router.deliver(&record("out", 7.0)), 2);
        assert_eq!(rx_a.try_iter().count(), 1);
        assert_eq!(rx_b.try_iter().count(), 1);
    }

    // -- 4. routes_preserve_registration_order -------------------------------

    #[test]
    fn routes_preserve_registration_order() {
        let mut router = EventRouter::new();
        router.add_route("in", 2);
        router.add_route("in", 0);
        router.add_route("other", 1);

        assert_eq!(router.plans_for("in"), &[2, 0]);
        assert_eq!(router.plans_for("other"), &[1]);
        assert!(router.plans_for("unknown").is_empty());
    }

    // -- 5. record_to_json_preserves_keys ------------------------------------

    #[test]
    fn record_to_json_preserves_keys() {
        let rec = ResultRecord {
            stream: "out".into(),
            fields: vec![
                ("count".to_string(), Value::Number(2.0)),
                ("mean".to_string(), Value::Null),
            ],
        };
        assert_eq!(
            rec.to_json(),
            serde_json::json!({"count": 2, "mean": null}),
        );
    }
}
