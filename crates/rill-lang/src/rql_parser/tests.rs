use std::time::Duration;

use super::*;
use crate::ast::*;

const FIXTURE: &str = r#"
define tumbling window `15secs`
with
    interval = 15s
end;

select {
    "count": aggr::stats::count(),
    "min":   aggr::stats::min(event.value),
    "max":   aggr::stats::max(event.value),
    "mean":  aggr::stats::mean(event.value),
    "stdev": aggr::stats::stdev(event.value),
    "var":   aggr::stats::var(event.value)
} from in[`15secs`] into out;
"#;

fn field(path: &[&str]) -> FieldPath {
    FieldPath {
        segments: path.iter().map(|s| s.to_string()).collect(),
    }
}

// -- 1. parse_fixture --------------------------------------------------------

#[test]
fn parse_fixture() {
    let stmts = parse_rql(FIXTURE).unwrap();
    assert_eq!(stmts.len(), 2);

    let Stmt::DefineWindow(decl) = &stmts[0] else {
        panic!("expected window definition, got {:?}", stmts[0]);
    };
    assert_eq!(decl.name, "15secs");
    assert_eq!(decl.kind, WindowKind::Tumbling);
    assert_eq!(decl.options.len(), 1);
    assert_eq!(decl.options[0].name, "interval");
    assert_eq!(
        decl.options[0].value,
        OptionValue::Duration(Duration::from_secs(15)),
    );

    let Stmt::Select(sel) = &stmts[1] else {
        panic!("expected select statement, got {:?}", stmts[1]);
    };
    assert_eq!(sel.source.stream, "in");
    assert_eq!(sel.source.window, "15secs");
    assert_eq!(sel.sink, "out");

    let keys: Vec<&str> = sel.fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["count", "min", "max", "mean", "stdev", "var"]);

    assert_eq!(sel.fields[0].expr.module, "aggr::stats");
    assert_eq!(sel.fields[0].expr.name, "count");
    assert_eq!(sel.fields[0].expr.arg, None);
    assert_eq!(sel.fields[1].expr.arg, Some(field(&["value"])));
}

// -- 2. single_colon_canonicalized -------------------------------------------

#[test]
fn single_colon_canonicalized() {
    let src = "define tumbling window `w` with interval = 5s end;\n\
               select { \"n\": aggr:stats:count() } from in[`w`] into out;";
    let stmts = parse_rql(src).unwrap();
    let Stmt::Select(sel) = &stmts[1] else {
        panic!("expected select");
    };
    assert_eq!(sel.fields[0].expr.module, "aggr::stats");
    assert_eq!(sel.fields[0].expr.qualified_name(), "aggr::stats::count");
}

// -- 3. nested_field_path ----------------------------------------------------

#[test]
fn nested_field_path() {
    let src = "define tumbling window `w` with interval = 5s end;\n\
               select { \"m\": aggr::stats::mean(event.detail.bytes) } from in[`w`] into out;";
    let stmts = parse_rql(src).unwrap();
    let Stmt::Select(sel) = &stmts[1] else {
        panic!("expected select");
    };
    assert_eq!(sel.fields[0].expr.arg, Some(field(&["detail", "bytes"])));
}

// -- 4. trailing_commas_and_comments -----------------------------------------

#[test]
fn trailing_commas_and_comments() {
    let src = "# window for the demo\n\
               define tumbling window `w`\n\
               with\n\
                   interval = 10s,  # ten seconds\n\
               end;\n\
               select {\n\
                   \"count\": aggr::stats::count(),\n\
               } from in[`w`] into out;";
    let stmts = parse_rql(src).unwrap();
    assert_eq!(stmts.len(), 2);
}

// -- 5. define_without_options -----------------------------------------------

#[test]
fn define_without_options() {
    let stmts = parse_rql("define tumbling window `w`;").unwrap();
    let Stmt::DefineWindow(decl) = &stmts[0] else {
        panic!("expected define");
    };
    assert!(decl.options.is_empty());
}

// -- 6. misspelled_keyword_is_syntax_error -----------------------------------

#[test]
fn misspelled_keyword_is_syntax_error() {
    let err = parse_rql("defin tumbling window `w`;").unwrap_err();
    assert_eq!(err.line, 1);
    assert!(
        err.expected.contains("define") || err.expected.contains("select"),
        "expected-token description should mention the statement keywords: {}",
        err.expected,
    );
}

// -- 7. error_carries_line_and_column ----------------------------------------

#[test]
fn error_carries_line_and_column() {
    // Missing ';' after the definition: the error lands on line 2.
    let err = parse_rql("define tumbling window `w`\nselect").unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.column >= 1);
    assert!(!err.expected.is_empty());
}

// -- 8. unterminated_backtick ------------------------------------------------

#[test]
fn unterminated_backtick() {
    let err = parse_rql("define tumbling window `w;").unwrap_err();
    assert!(
        err.expected.contains("backtick"),
        "got: {}",
        err.expected,
    );
}

// -- 9. missing_from_clause --------------------------------------------------

#[test]
fn missing_from_clause() {
    let err =
        parse_rql("select { \"n\": aggr::stats::count() } into out;").unwrap_err();
    assert!(err.expected.contains("from"), "got: {}", err.expected);
}

// -- 10. bad_duration_suffix -------------------------------------------------

#[test]
fn bad_duration_suffix() {
    let err = parse_rql("define tumbling window `w` with interval = 15y end;").unwrap_err();
    assert!(!err.expected.is_empty());
}

// -- 11. empty_select_clause_rejected ----------------------------------------

#[test]
fn empty_select_clause_rejected() {
    let err = parse_rql("select { } from in[`w`] into out;").unwrap_err();
    assert!(!err.expected.is_empty());
}

// -- 12. numeric_option_value ------------------------------------------------

#[test]
fn numeric_option_value() {
    let stmts = parse_rql("define tumbling window `w` with size = 42 end;").unwrap();
    let Stmt::DefineWindow(decl) = &stmts[0] else {
        panic!("expected define");
    };
    assert_eq!(decl.options[0].value, OptionValue::Number(42.0));
}
