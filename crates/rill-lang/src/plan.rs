use std::time::Duration;

use crate::ast::FieldPath;

// ---------------------------------------------------------------------------
// AggKind — the aggregate function vocabulary
// ---------------------------------------------------------------------------

/// Aggregate function kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Count,
    Min,
    Max,
    Mean,
    Stdev,
    Variance,
}

impl AggKind {
    /// The surface name of the function as written in `.rql` source.
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::Count => "count",
            AggKind::Min => "min",
            AggKind::Max => "max",
            AggKind::Mean => "mean",
            AggKind::Stdev => "stdev",
            AggKind::Variance => "var",
        }
    }

    /// Resolve a surface name to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(AggKind::Count),
            "min" => Some(AggKind::Min),
            "max" => Some(AggKind::Max),
            "mean" => Some(AggKind::Mean),
            "stdev" => Some(AggKind::Stdev),
            "var" => Some(AggKind::Variance),
            _ => None,
        }
    }

    /// Whether this function takes a field-path argument.
    pub fn takes_field(&self) -> bool {
        !matches!(self, AggKind::Count)
    }
}

// ---------------------------------------------------------------------------
// WindowPlan
// ---------------------------------------------------------------------------

/// A resolved window definition: name plus tumbling interval.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    pub name: String,
    pub interval: Duration,
}

// ---------------------------------------------------------------------------
// AggBinding
// ---------------------------------------------------------------------------

/// One output of a select clause: key, function, and (for all functions but
/// `count`) the event field it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AggBinding {
    pub key: String,
    pub kind: AggKind,
    pub field: Option<FieldPath>,
}

// ---------------------------------------------------------------------------
// QueryPlan — one bound select statement
// ---------------------------------------------------------------------------

/// Executable plan for one select statement: source stream → window
/// assignment → aggregation → sink stream.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub window: WindowPlan,
    /// Ordered as written in the select clause.
    pub aggregates: Vec<AggBinding>,
    pub source_stream: String,
    pub sink_stream: String,
}
