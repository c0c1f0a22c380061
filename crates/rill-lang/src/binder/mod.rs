use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use crate::ast::{OptionValue, SelectStmt, Stmt, WindowDecl};
use crate::plan::{AggBinding, AggKind, QueryPlan, WindowPlan};
use crate::rql_parser::parse_rql;


/// The namespace all aggregate functions live in.
pub const AGG_MODULE: &str = "aggr::stats";

// ---------------------------------------------------------------------------
// BindError
// ---------------------------------------------------------------------------

/// Bind-time diagnostic. Each error is fatal to its statement only; the
/// remaining statements in the unit still bind.
#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// `from` references a window not defined earlier in the unit.
    UnresolvedWindow { stmt: usize, name: String },
    /// Second `define` for an existing window name. The first definition
    /// stays in force.
    Redefinition { stmt: usize, name: String },
    /// Wrong argument count for an aggregate function.
    BadArity {
        stmt: usize,
        func: String,
        expected: usize,
        got: usize,
    },
    /// Namespaced call outside the known aggregate vocabulary.
    UnknownFunction { stmt: usize, name: String },
    /// Repeated output key within one select clause.
    DuplicateKey { stmt: usize, key: String },
    /// Tumbling window defined without an `interval` option.
    MissingInterval { stmt: usize, window: String },
    /// Unrecognized option in a `with` block.
    UnknownOption {
        stmt: usize,
        window: String,
        option: String,
    },
    /// Option present but its value is unusable (e.g. a zero or numeric
    /// interval).
    BadOptionValue {
        stmt: usize,
        window: String,
        option: String,
    },
}

impl BindError {
    fn stmt(&self) -> usize {
        match self {
            BindError::UnresolvedWindow { stmt, .. }
            | BindError::Redefinition { stmt, .. }
            | BindError::BadArity { stmt, .. }
            | BindError::UnknownFunction { stmt, .. }
            | BindError::DuplicateKey { stmt, .. }
            | BindError::MissingInterval { stmt, .. }
            | BindError::UnknownOption { stmt, .. }
            | BindError::BadOptionValue { stmt, .. } => *stmt,
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement {}: ", self.stmt() + 1)?;
        match self {
            BindError::UnresolvedWindow { name, .. } => {
                write!(f, "unresolved window `{name}`")
            }
            BindError::Redefinition { name, .. } => {
                write!(f, "window `{name}` is already defined; first definition wins")
            }
            BindError::BadArity {
                func,
                expected,
                got,
                ..
            } => write!(
                f,
                "{func} takes {expected} argument{}, got {got}",
                if *expected == 1 { "" } else { "s" },
            ),
            BindError::UnknownFunction { name, .. } => {
                write!(f, "unknown aggregate function '{name}'")
            }
            BindError::DuplicateKey { key, .. } => {
                write!(f, "duplicate output key {key:?} in select clause")
            }
            BindError::MissingInterval { window, .. } => {
                write!(f, "tumbling window `{window}` requires an interval option")
            }
            BindError::UnknownOption { window, option, .. } => {
                write!(f, "window `{window}`: unknown option '{option}'")
            }
            BindError::BadOptionValue { window, option, .. } => {
                write!(f, "window `{window}`: option '{option}' must be a positive duration")
            }
        }
    }
}

impl std::error::Error for BindError {}

// ---------------------------------------------------------------------------
// bind_unit — per-statement binding
// ---------------------------------------------------------------------------

/// Result of binding one source unit: the plans that bound successfully plus
/// the diagnostics for the statements that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct BindOutcome {
    pub plans: Vec<QueryPlan>,
    pub errors: Vec<BindError>,
}

/// Bind a parsed statement sequence into executable [`QueryPlan`]s.
///
/// Statements are processed in order; a window must be defined before any
/// select statement references it. A statement that fails to bind is
/// reported and skipped without poisoning the rest of the unit.
pub fn bind_unit(stmts: &[Stmt]) -> BindOutcome {
    let mut windows: HashMap<String, WindowPlan> = HashMap::new();
    let mut plans = Vec::new();
    let mut errors = Vec::new();

    for (idx, stmt) in stmts.iter().enumerate() {
        match stmt {
            Stmt::DefineWindow(decl) => match bind_window(idx, decl, &windows) {
                Ok(plan) => {
                    windows.insert(plan.name.clone(), plan);
                }
                Err(e) => errors.push(e),
            },
            Stmt::Select(sel) => match bind_select(idx, sel, &windows) {
                Ok(plan) => plans.push(plan),
                Err(e) => errors.push(e),
            },
        }
    }

    BindOutcome { plans, errors }
}

/// Parse and bind a source unit, failing on the first syntax error or any
/// bind error. Convenience for callers that want all-or-nothing semantics;
/// tolerant callers use [`parse_rql`] + [`bind_unit`] directly.
pub fn compile_rql(source: &str) -> anyhow::Result<Vec<QueryPlan>> {
    let stmts = parse_rql(source).map_err(|e| anyhow::anyhow!("{e}"))?;
    let outcome = bind_unit(&stmts);
    if !outcome.errors.is_empty() {
        let msgs: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("bind errors:\n{}", msgs.join("\n"));
    }
    Ok(outcome.plans)
}

// ---------------------------------------------------------------------------
// Window binding
// ---------------------------------------------------------------------------

fn bind_window(
    idx: usize,
    decl: &WindowDecl,
    windows: &HashMap<String, WindowPlan>,
) -> Result<WindowPlan, BindError> {
    if windows.contains_key(&decl.name) {
        return Err(BindError::Redefinition {
            stmt: idx,
            name: decl.name.clone(),
        });
    }

    let mut interval: Option<Duration> = None;
    for option in &decl.options {
        match option.name.as_str() {
            "interval" => match option.value {
                OptionValue::Duration(d) if !d.is_zero() => interval = Some(d),
                _ => {
                    return Err(BindError::BadOptionValue {
                        stmt: idx,
                        window: decl.name.clone(),
                        option: option.name.clone(),
                    });
                }
            },
            other => {
                return Err(BindError::UnknownOption {
                    stmt: idx,
                    window: decl.name.clone(),
                    option: other.to_string(),
                });
            }
        }
    }

    let Some(interval) = interval else {
        return Err(BindError::MissingInterval {
            stmt: idx,
            window: decl.name.clone(),
        });
    };

    Ok(WindowPlan {
        name: decl.name.clone(),
        interval,
    })
}

// ---------------------------------------------------------------------------
// Select binding
// ---------------------------------------------------------------------------

fn bind_select(
    idx: usize,
    sel: &SelectStmt,
    windows: &HashMap<String, WindowPlan>,
) -> Result<QueryPlan, BindError> {
    let Some(window) = windows.get(&sel.source.window) else {
        return Err(BindError::UnresolvedWindow {
            stmt: idx,
            name: sel.source.window.clone(),
        });
    };

    let mut seen_keys: HashSet<&str> = HashSet::new();
    let mut aggregates = Vec::with_capacity(sel.fields.len());

    for field in &sel.fields {
        if !seen_keys.insert(field.key.as_str()) {
            return Err(BindError::DuplicateKey {
                stmt: idx,
                key: field.key.clone(),
            });
        }

        let call = &field.expr;
        if call.module != AGG_MODULE {
            return Err(BindError::UnknownFunction {
                stmt: idx,
                name: call.qualified_name(),
            });
        }
        let Some(kind) = AggKind::from_name(&call.name) else {
            return Err(BindError::UnknownFunction {
                stmt: idx,
                name: call.qualified_name(),
            });
        };

        let expected = usize::from(kind.takes_field());
        let got = usize::from(call.arg.is_some());
        if expected != got {
            return Err(BindError::BadArity {
                stmt: idx,
                func: call.qualified_name(),
                expected,
                got,
            });
        }

        aggregates.push(AggBinding {
            key: field.key.clone(),
            kind,
            field: call.arg.clone(),
        });
    }

    Ok(QueryPlan {
        window: window.clone(),
        aggregates,
        source_stream: sel.source.stream.clone(),
        sink_stream: sel.sink.clone(),
    })
}
