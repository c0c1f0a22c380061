use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level statements
// ---------------------------------------------------------------------------

/// A top-level statement in an `.rql` source unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    DefineWindow(WindowDecl),
    Select(SelectStmt),
}

// ---------------------------------------------------------------------------
// Window definitions
// ---------------------------------------------------------------------------

/// Window shape. Only tumbling windows exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WindowKind {
    Tumbling,
}

/// `define tumbling window `name` with ... end;`
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDecl {
    pub name: String,
    pub kind: WindowKind,
    pub options: Vec<WithOption>,
}

/// One `name = value` entry inside a `with ... end` block.
#[derive(Debug, Clone, PartialEq)]
pub struct WithOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Duration(Duration),
    Number(f64),
}

// ---------------------------------------------------------------------------
// Select statements
// ---------------------------------------------------------------------------

/// `select { "key": expr, ... } from stream[`window`] into sink;`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub fields: Vec<SelectField>,
    pub source: SourceRef,
    pub sink: String,
}

/// One `"key": aggregate` pair of a select clause. Order is significant.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub key: String,
    pub expr: AggCall,
}

/// Source binding: stream name plus the window it is read through.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub stream: String,
    pub window: String,
}

// ---------------------------------------------------------------------------
// Aggregate expressions
// ---------------------------------------------------------------------------

/// A namespaced aggregate call, e.g. `aggr::stats::mean(event.value)`.
///
/// Single-colon separators are accepted in source and canonicalized to `::`
/// at parse time; `module` is always the `::`-joined form.
#[derive(Debug, Clone, PartialEq)]
pub struct AggCall {
    pub module: String,
    pub name: String,
    pub arg: Option<FieldPath>,
}

impl AggCall {
    /// The fully qualified call name as written after canonicalization.
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module, self.name)
        }
    }
}

/// Dotted field path into the event record, rooted at `event`.
///
/// `event.detail.bytes` is stored as `segments = ["detail", "bytes"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    pub segments: Vec<String>,
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event")?;
        for seg in &self.segments {
            write!(f, ".{seg}")?;
        }
        Ok(())
    }
}
