use std::time::Duration;

use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub(super) fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    // First character must be alphabetic or underscore (not digit).
    if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// Backtick-quoted name, e.g. `` `15secs` ``. The quoted form allows names
/// that start with a digit.
pub(super) fn backtick_ident(input: &mut &str) -> ModalResult<String> {
    literal("`").parse_next(input)?;
    let content = cut_err(take_while(1.., |c: char| c != '`' && c != '\n'))
        .context(StrContext::Expected(StrContextValue::Description(
            "window name between backticks",
        )))
        .parse_next(input)?;
    cut_err(literal("`"))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing backtick",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

pub(super) fn quoted_string(input: &mut &str) -> ModalResult<String> {
    literal("\"").parse_next(input)?;
    let content = take_while(0.., |c: char| c != '"').parse_next(input)?;
    cut_err(literal("\""))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing quote",
        )))
        .parse_next(input)?;
    Ok(content.to_string())
}

// ---------------------------------------------------------------------------
// Duration
// ---------------------------------------------------------------------------

pub(super) fn duration_value(input: &mut &str) -> ModalResult<Duration> {
    let digits = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let num: u64 = digits
        .parse()
        .map_err(|_| ErrMode::Cut(ContextError::new()))?;

    let suffix = alt((
        literal("s").value(1u64),
        literal("m").value(60u64),
        literal("h").value(3600u64),
        literal("d").value(86400u64),
    ))
    .parse_next(input)?;

    Ok(Duration::from_secs(num * suffix))
}

// ---------------------------------------------------------------------------
// Number literal
// ---------------------------------------------------------------------------

/// Parse a number literal: integer or float.
pub(super) fn number_literal(input: &mut &str) -> ModalResult<f64> {
    let integer_part = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let has_dot = opt(literal(".")).parse_next(input)?.is_some();
    if has_dot {
        let frac_part = take_while(1.., |c: char| c.is_ascii_digit())
            .context(StrContext::Expected(StrContextValue::Description(
                "digits after decimal point",
            )))
            .parse_next(input)?;
        let s = format!("{integer_part}.{frac_part}");
        let v: f64 = s.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
        Ok(v)
    } else {
        let v: f64 = integer_part
            .parse()
            .map_err(|_| ErrMode::Cut(ContextError::new()))?;
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Whitespace & comments
// ---------------------------------------------------------------------------

/// Skip whitespace and `# ...` line comments.
pub(super) fn ws_skip(input: &mut &str) -> ModalResult<()> {
    loop {
        let _ = multispace0.parse_next(input)?;
        if opt(literal("#")).parse_next(input)?.is_some() {
            let _ = take_while(0.., |c: char| c != '\n').parse_next(input)?;
        } else {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Keyword matching with word boundary
// ---------------------------------------------------------------------------

/// Match an exact keyword string, ensuring it's not a prefix of a longer
/// identifier (i.e. the next character is not alphanumeric or `_`).
pub(super) fn kw<'a>(keyword: &'static str) -> impl FnMut(&mut &'a str) -> ModalResult<()> {
    move |input: &mut &'a str| {
        let saved = *input;
        literal(keyword).parse_next(input)?;
        if input.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            *input = saved;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        Ok(())
    }
}
