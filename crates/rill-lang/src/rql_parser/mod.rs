use std::fmt;

use winnow::combinator::{alt, cut_err, opt, separated};
use winnow::error::{ContextError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::literal;

mod primitives;

use crate::ast::*;
use primitives::{
    backtick_ident, duration_value, ident, kw, number_literal, quoted_string, ws_skip,
};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse an `.rql` source unit into a sequence of top-level statements.
///
/// On failure returns a [`SyntaxError`] carrying the 1-based line/column of
/// the offending position and a description of what was expected there.
pub fn parse_rql(input: &str) -> Result<Vec<Stmt>, SyntaxError> {
    rql_unit
        .parse(input)
        .map_err(|e| SyntaxError::at_offset(input, e.offset(), e.inner()))
}

/// Parse-time failure: position plus an expected-token description.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub expected: String,
}

impl SyntaxError {
    fn at_offset(input: &str, offset: usize, ctx: &ContextError) -> Self {
        let offset = offset.min(input.len());
        let consumed = &input[..offset];
        let line = consumed.matches('\n').count() + 1;
        let line_start = consumed.rfind('\n').map(|p| p + 1).unwrap_or(0);
        let column = offset - line_start + 1;

        let mut expected = ctx.to_string();
        if expected.trim().is_empty() {
            expected = "unexpected input".to_string();
        }
        Self {
            line,
            column,
            expected,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error at line {}, column {}: {}",
            self.line, self.column, self.expected,
        )
    }
}

impl std::error::Error for SyntaxError {}

// ---------------------------------------------------------------------------
// Top-level grammar
// ---------------------------------------------------------------------------

fn rql_unit(input: &mut &str) -> ModalResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    loop {
        ws_skip.parse_next(input)?;
        if input.is_empty() {
            break;
        }
        let stmt = statement.parse_next(input)?;
        stmts.push(stmt);
    }
    Ok(stmts)
}

fn statement(input: &mut &str) -> ModalResult<Stmt> {
    alt((
        define_stmt.map(Stmt::DefineWindow),
        select_stmt.map(Stmt::Select),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "a 'define' or 'select' statement",
    )))
    .parse_next(input)
}

// ---------------------------------------------------------------------------
// define statement
// ---------------------------------------------------------------------------

fn define_stmt(input: &mut &str) -> ModalResult<WindowDecl> {
    kw("define").parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(kw("tumbling"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'tumbling' after 'define'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(kw("window"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'window' after 'tumbling'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let name = cut_err(backtick_ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "backtick-quoted window name",
        )))
        .parse_next(input)?;

    ws_skip.parse_next(input)?;
    let options = opt(with_block).parse_next(input)?.unwrap_or_default();

    ws_skip.parse_next(input)?;
    cut_err(literal(";"))
        .context(StrContext::Expected(StrContextValue::Description(
            "';' terminating the definition",
        )))
        .parse_next(input)?;

    Ok(WindowDecl {
        name,
        kind: WindowKind::Tumbling,
        options,
    })
}

// ---------------------------------------------------------------------------
// with block
// ---------------------------------------------------------------------------

fn with_block(input: &mut &str) -> ModalResult<Vec<WithOption>> {
    kw("with").parse_next(input)?;
    ws_skip.parse_next(input)?;

    let options: Vec<WithOption> = cut_err(separated(
        1..,
        with_option,
        (ws_skip, literal(","), ws_skip),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "at least one 'name = value' option",
    )))
    .parse_next(input)?;

    // Allow trailing comma
    ws_skip.parse_next(input)?;
    let _ = opt(literal(",")).parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(kw("end"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'end' closing the with block",
        )))
        .parse_next(input)?;

    Ok(options)
}

fn with_option(input: &mut &str) -> ModalResult<WithOption> {
    let name = ident.parse_next(input)?;
    if name == "end" {
        // `end` closes the block, it is not an option name.
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }
    let name = name.to_string();

    ws_skip.parse_next(input)?;
    cut_err(literal("="))
        .context(StrContext::Expected(StrContextValue::Description(
            "'=' after option name",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let value = cut_err(option_value).parse_next(input)?;
    Ok(WithOption { name, value })
}

fn option_value(input: &mut &str) -> ModalResult<OptionValue> {
    alt((
        duration_value.map(OptionValue::Duration),
        number_literal.map(OptionValue::Number),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "a duration (e.g. 15s) or a number",
    )))
    .parse_next(input)
}

// ---------------------------------------------------------------------------
// select statement
// ---------------------------------------------------------------------------

fn select_stmt(input: &mut &str) -> ModalResult<SelectStmt> {
    kw("select").parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(literal("{"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'{' opening the select clause",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let fields: Vec<SelectField> = cut_err(separated(
        1..,
        select_field,
        (ws_skip, literal(","), ws_skip),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "at least one '\"key\": aggregate' pair",
    )))
    .parse_next(input)?;

    // Allow trailing comma
    ws_skip.parse_next(input)?;
    let _ = opt(literal(",")).parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(literal("}"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'}' closing the select clause",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(kw("from"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'from' clause",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let source = cut_err(source_ref)
        .context(StrContext::Expected(StrContextValue::Description(
            "source binding like in[`15secs`]",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(kw("into"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'into' clause",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let sink = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "destination stream name",
        )))
        .parse_next(input)?
        .to_string();

    ws_skip.parse_next(input)?;
    cut_err(literal(";"))
        .context(StrContext::Expected(StrContextValue::Description(
            "';' terminating the statement",
        )))
        .parse_next(input)?;

    Ok(SelectStmt {
        fields,
        source,
        sink,
    })
}

fn select_field(input: &mut &str) -> ModalResult<SelectField> {
    let key = quoted_string.parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(literal(":"))
        .context(StrContext::Expected(StrContextValue::Description(
            "':' after output key",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let expr = cut_err(agg_call)
        .context(StrContext::Expected(StrContextValue::Description(
            "aggregate call like aggr::stats::count()",
        )))
        .parse_next(input)?;

    Ok(SelectField { key, expr })
}

fn source_ref(input: &mut &str) -> ModalResult<SourceRef> {
    let stream = ident.parse_next(input)?.to_string();
    ws_skip.parse_next(input)?;

    cut_err(literal("["))
        .context(StrContext::Expected(StrContextValue::Description(
            "'[' after stream name",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let window = cut_err(backtick_ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "backtick-quoted window name",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(literal("]"))
        .context(StrContext::Expected(StrContextValue::Description(
            "']' closing the window reference",
        )))
        .parse_next(input)?;

    Ok(SourceRef { stream, window })
}

// ---------------------------------------------------------------------------
// Aggregate calls
// ---------------------------------------------------------------------------

/// `module::path::name(arg?)`. `:` is accepted wherever `::` is; the module
/// path is stored `::`-joined either way.
fn agg_call(input: &mut &str) -> ModalResult<AggCall> {
    let first = ident.parse_next(input)?.to_string();
    let mut segments = vec![first];

    while opt(alt((literal("::"), literal(":"))))
        .parse_next(input)?
        .is_some()
    {
        let next = cut_err(ident)
            .context(StrContext::Expected(StrContextValue::Description(
                "identifier after namespace separator",
            )))
            .parse_next(input)?;
        segments.push(next.to_string());
    }

    ws_skip.parse_next(input)?;
    cut_err(literal("("))
        .context(StrContext::Expected(StrContextValue::Description(
            "'(' opening the argument list",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let arg = opt(field_path).parse_next(input)?;
    ws_skip.parse_next(input)?;

    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description(
            "')' closing the argument list",
        )))
        .parse_next(input)?;

    let name = segments.pop().expect("call path has at least one segment");
    Ok(AggCall {
        module: segments.join("::"),
        name,
        arg,
    })
}

fn field_path(input: &mut &str) -> ModalResult<FieldPath> {
    kw("event").parse_next(input)?;

    cut_err(literal("."))
        .context(StrContext::Expected(StrContextValue::Description(
            "'.' after 'event'",
        )))
        .parse_next(input)?;
    let first = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "field name after '.'",
        )))
        .parse_next(input)?;

    let mut segments = vec![first.to_string()];
    while opt(literal(".")).parse_next(input)?.is_some() {
        let seg = cut_err(ident)
            .context(StrContext::Expected(StrContextValue::Description(
                "field name after '.'",
            )))
            .parse_next(input)?;
        segments.push(seg.to_string());
    }

    Ok(FieldPath { segments })
}
