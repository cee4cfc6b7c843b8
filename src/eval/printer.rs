//! The value printer emitted into every synthesized program.
//!
//! Values are rendered with Go's `%#v` verb so composite values show their
//! structure. A multi-result call passed straight to the printer expands
//! into all of its results, printed space-separated on one line.

/// Name of the Go print helper.
pub const PRINT_FN: &str = "__goeval_print";

/// Line printed before the candidate; stdout up to and including it is
/// replayed history and is discarded.
pub const OUTPUT_MARKER: &str = "\u{1e}goeval:candidate\u{1e}";

/// Packages the preamble itself needs.
pub const PREAMBLE_IMPORTS: &[&str] = &["fmt"];

/// Go source of the print helper.
#[must_use]
pub fn helper_source() -> String {
    format!(
        "func {PRINT_FN}(xs ...interface{{}}) {{\n\
         \tfor i, x := range xs {{\n\
         \t\tif i > 0 {{\n\
         \t\t\tfmt.Print(\" \")\n\
         \t\t}}\n\
         \t\tfmt.Printf(\"%#v\", x)\n\
         \t}}\n\
         \tfmt.Print(\"\\n\")\n\
         }}\n"
    )
}

/// Go statement printing the output marker.
#[must_use]
pub fn marker_statement() -> String {
    let literal = OUTPUT_MARKER.replace('\u{1e}', "\\x1e");
    format!("fmt.Print(\"{literal}\\n\")")
}

/// Wrap a Go expression in a printer call.
#[must_use]
pub fn print_call(expr: &str) -> String {
    format!("{PRINT_FN}({})", expr.trim())
}

/// Split program stdout at the marker, returning only the candidate's output.
///
/// Without a marker (the candidate is a file-level declaration that
/// printed nothing) the output is empty.
#[must_use]
pub fn candidate_output(stdout: &str) -> &str {
    let marker = format!("{OUTPUT_MARKER}\n");
    stdout
        .find(&marker)
        .map_or("", |pos| &stdout[pos + marker.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_is_variadic_and_uses_go_syntax_verb() {
        let src = helper_source();
        assert!(src.starts_with("func __goeval_print(xs ...interface{}) {"));
        assert!(src.contains(r#"fmt.Printf("%#v", x)"#));
        assert!(src.contains(r#"fmt.Print("\n")"#));
    }

    #[test]
    fn print_call_trims_expression() {
        assert_eq!(print_call(" 1+1 "), "__goeval_print(1+1)");
    }

    #[test]
    fn marker_statement_is_go_string() {
        let stmt = marker_statement();
        assert_eq!(stmt, r#"fmt.Print("\x1egoeval:candidate\x1e\n")"#);
        assert!(stmt.ends_with("\\n\")"));
    }

    #[test]
    fn output_after_marker_only() {
        let stdout = format!("old\n{OUTPUT_MARKER}\nnew\n");
        assert_eq!(candidate_output(&stdout), "new\n");
        assert_eq!(candidate_output("no marker\n"), "");
    }
}
