//! Quick fixes: rewrite a candidate in response to recoverable diagnostics.
//!
//! Every rule routes a value the compiler says is discarded into the value
//! printer, so results the user did not explicitly print still show up:
//!
//! - an expression evaluated for nothing is wrapped in a print call;
//! - a variable declared and never used gets a print call right after the
//!   statement declaring it, keeping the binding for later fragments, or at
//!   the top of the body when an `if`, `for` or `switch` header declares it;
//! - a bare expression that turned out to be a call without results is
//!   demoted to a plain statement.
//!
//! After a rewrite the value is consumed by the print call, so the same
//! diagnostic cannot come back for it.

use super::diagnostic::{Category, Diagnostic, Position};
use super::fragment::{Fragment, FragmentKind};
use super::printer;
use super::scan::{self, TokenKind};
use super::synth::CandidateProgram;

/// A stateless rewrite for one diagnostic class.
pub type QuickFixRule = fn(&Fragment, &Diagnostic, &CandidateProgram) -> Option<Fragment>;

/// The rule table, in matching order.
pub const RULES: &[(&str, QuickFixRule)] = &[
    ("print-unused-value", print_unused_value),
    ("print-unused-variable", print_unused_variable),
    ("demote-void-expression", demote_void_expression),
];

/// Whether a diagnostic belongs to a class some rule handles.
#[must_use]
pub fn is_recoverable(diagnostic: &Diagnostic) -> bool {
    matches!(
        diagnostic.category,
        Category::UnusedValue { .. } | Category::UnusedVariable { .. } | Category::NoValue { .. }
    )
}

/// Apply one round of fixes.
///
/// Returns `None` unless every positioned diagnostic is recoverable, lies in
/// the candidate, and is handled by a rule. Diagnostics are applied from the
/// last position to the first so earlier offsets stay valid, which also
/// keeps several print calls inserted at one place in source order.
#[must_use]
pub fn apply(
    fragment: &Fragment,
    diagnostics: &[Diagnostic],
    program: &CandidateProgram,
) -> Option<Fragment> {
    let mut located: Vec<&Diagnostic> =
        diagnostics.iter().filter(|d| d.position.is_some()).collect();
    if located.is_empty() {
        return None;
    }
    if let Some(blocker) = located.iter().find(|d| {
        !is_recoverable(d) || !d.position.is_some_and(|p| program.contains_line(p.line))
    }) {
        tracing::debug!(diagnostic = %blocker, "not recoverable by quick fix");
        return None;
    }

    located.sort_by_key(|d| d.position);
    located.dedup_by(|a, b| a.position == b.position && a.category == b.category);

    let mut current = fragment.clone();
    for diag in located.iter().rev().copied() {
        let (name, fixed) = RULES
            .iter()
            .find_map(|(name, rule)| rule(&current, diag, program).map(|f| (*name, f)))?;
        tracing::debug!(rule = name, diagnostic = %diag, "quick fix applied");
        current = fixed;
    }
    (current != *fragment).then_some(current)
}

fn offset_of(
    fragment: &Fragment,
    position: Option<Position>,
    program: &CandidateProgram,
) -> Option<usize> {
    let pos = position?;
    program.candidate_offset(fragment.source(), pos.line, pos.column.unwrap_or(1))
}

/// Wrap a discarded expression in a print call.
fn print_unused_value(
    fragment: &Fragment,
    diagnostic: &Diagnostic,
    program: &CandidateProgram,
) -> Option<Fragment> {
    let Category::UnusedValue { .. } = diagnostic.category else {
        return None;
    };
    if fragment.kind() == FragmentKind::Expression {
        return None;
    }
    let source = fragment.source();
    let start = offset_of(fragment, diagnostic.position, program)?;
    let end = statement_end(source, start);
    let expr = source[start..end].trim_end();
    if expr.is_empty() {
        return None;
    }
    let rewritten = format!(
        "{}{}{}",
        &source[..start],
        printer::print_call(expr),
        &source[start + expr.len()..]
    );
    Some(fragment.rewritten(&rewritten, fragment.kind()))
}

/// Print a variable nobody reads, right after the statement declaring it.
fn print_unused_variable(
    fragment: &Fragment,
    diagnostic: &Diagnostic,
    program: &CandidateProgram,
) -> Option<Fragment> {
    let Category::UnusedVariable { ident } = &diagnostic.category else {
        return None;
    };
    let source = fragment.source();
    let at = offset_of(fragment, diagnostic.position, program)?;
    if !source[at..].starts_with(ident.as_str()) {
        return None;
    }
    let rewritten = match header_insertions(source, at) {
        Some(points) if points.is_empty() => return None,
        Some(points) => {
            let mut text = source.to_string();
            for point in points.into_iter().rev() {
                text.insert_str(point, &format!(" {};", printer::print_call(ident)));
            }
            text
        }
        None => {
            let end = statement_end(source, at);
            let insert_at = source[..end].trim_end().len();
            format!(
                "{}; {}{}",
                &source[..insert_at],
                printer::print_call(ident),
                &source[insert_at..]
            )
        }
    };
    let kind = match fragment.kind() {
        FragmentKind::Expression => FragmentKind::Statement,
        other => other,
    };
    Some(fragment.rewritten(&rewritten, kind))
}

/// A bare expression that produces no value is evaluated for its effect only.
fn demote_void_expression(
    fragment: &Fragment,
    diagnostic: &Diagnostic,
    program: &CandidateProgram,
) -> Option<Fragment> {
    let Category::NoValue { .. } = diagnostic.category else {
        return None;
    };
    if fragment.kind() != FragmentKind::Expression {
        return None;
    }
    let line = diagnostic.position?.line;
    (Some(line) == program.candidate_line)
        .then(|| fragment.rewritten(fragment.source(), FragmentKind::Statement))
}

const HEADER_KEYWORDS: &[&str] = &["if", "for", "switch", "else"];

/// Where to print a name declared in the header of an `if`, `for` or
/// `switch` statement, or `None` if `offset` is not in such a header.
///
/// The name is in scope in the body only: `if` and `for` bodies get the
/// print first thing; a `switch` gets it at the start of every clause, and
/// a `switch` without clauses has nowhere to put it.
fn header_insertions(source: &str, offset: usize) -> Option<Vec<usize>> {
    let tokens = scan::scan(source).tokens;
    let at = tokens.iter().position(|t| t.start >= offset)?;
    let depth = tokens[at].depth;

    let mut head = at;
    for idx in (0..at).rev() {
        let tok = &tokens[idx];
        if tok.depth < depth || (tok.depth == depth && tok.is_separator()) {
            break;
        }
        if tok.depth == depth {
            head = idx;
        }
    }
    let head = tokens[head];
    if head.kind != TokenKind::Ident || !HEADER_KEYWORDS.contains(&head.text) {
        return None;
    }
    let open = at
        + tokens[at..]
            .iter()
            .take_while(|t| t.depth >= depth)
            .position(|t| t.depth == depth && t.is(TokenKind::Open, "{"))?;
    if head.text != "switch" {
        return Some(vec![tokens[open].end()]);
    }

    let inner = depth + 1;
    let mut points = Vec::new();
    let mut in_case = false;
    for tok in &tokens[open + 1..] {
        if tok.depth < inner {
            break;
        }
        if tok.depth != inner {
            continue;
        }
        if tok.kind == TokenKind::Ident && matches!(tok.text, "case" | "default") {
            in_case = true;
        } else if in_case && tok.is_punct(":") {
            points.push(tok.end());
            in_case = false;
        }
    }
    Some(points)
}

/// End offset of the statement containing `offset`.
///
/// Statements end at a `;` or newline in the innermost enclosing brace
/// block, at the brace closing that block, or at end of input. Separators
/// inside parentheses or brackets do not end a statement, so grouped
/// `var ( ... )` declarations are treated as one statement.
fn statement_end(source: &str, offset: usize) -> usize {
    let tokens = scan::scan(source).tokens;
    let mut stack: Vec<&str> = Vec::new();
    let mut boundary = None;

    for tok in &tokens {
        if boundary.is_none() && tok.start >= offset {
            boundary = Some(
                stack
                    .iter()
                    .rposition(|b| *b == "{")
                    .map_or(0, |idx| idx + 1),
            );
        }
        if let Some(level) = boundary {
            if tok.start >= offset {
                if stack.len() == level && tok.is_separator() {
                    return tok.start;
                }
                if tok.kind == TokenKind::Close && stack.len() == level {
                    return tok.start;
                }
            }
        }
        match tok.kind {
            TokenKind::Open => stack.push(tok.text),
            TokenKind::Close => {
                stack.pop();
            }
            _ => {}
        }
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::eval::diagnostic;
    use crate::eval::state::SessionState;
    use crate::eval::synth;

    struct Case {
        frag: Fragment,
        program: CandidateProgram,
    }

    impl Case {
        fn new(source: &str) -> Self {
            let state = SessionState::new().unwrap();
            let frag = Fragment::new(1, source);
            let program = synth::synthesize(&state, Some(&frag), &BTreeSet::new());
            Self { frag, program }
        }

        /// A compiler line for candidate line `rel` (0-based) and column.
        fn diag(&self, rel: usize, col: usize, msg: &str) -> Diagnostic {
            let line = self.program.candidate_line.unwrap() + rel;
            let col = if rel == 0 { col + self.program.candidate_prefix } else { col };
            diagnostic::parse(&format!("./main.go:{line}:{col}: {msg}\n")).remove(0)
        }

        fn apply(&self, diags: &[Diagnostic]) -> Option<Fragment> {
            apply(&self.frag, diags, &self.program)
        }
    }

    #[test]
    fn unused_variable_is_printed() {
        let case = Case::new("a := 1");
        let fixed = case.apply(&[case.diag(0, 1, "declared and not used: a")]).unwrap();
        assert_eq!(fixed.source(), "a := 1; __goeval_print(a)");
        assert_eq!(fixed.introduced(), ["a"]);
        assert_eq!(fixed.id(), case.frag.id());
    }

    #[test]
    fn two_unused_variables_print_in_order() {
        let case = Case::new("b, err := json.Marshal(nil)");
        let fixed = case
            .apply(&[
                case.diag(0, 1, "declared and not used: b"),
                case.diag(0, 4, "declared and not used: err"),
            ])
            .unwrap();
        assert_eq!(
            fixed.source(),
            "b, err := json.Marshal(nil); __goeval_print(b); __goeval_print(err)"
        );
    }

    #[test]
    fn older_wording_is_fixed_too() {
        let case = Case::new("a := 1");
        let fixed = case.apply(&[case.diag(0, 1, "a declared but not used")]).unwrap();
        assert_eq!(fixed.source(), "a := 1; __goeval_print(a)");
    }

    #[test]
    fn unused_variable_in_block_stays_in_scope() {
        let case = Case::new("if true {\nx := 2\n}");
        let fixed = case.apply(&[case.diag(1, 1, "declared and not used: x")]).unwrap();
        assert_eq!(fixed.source(), "if true {\nx := 2; __goeval_print(x)\n}");
    }

    #[test]
    fn unused_header_variable_printed_in_body() {
        let case = Case::new(r#"if v, ok := m["a"]; ok { }"#);
        let fixed = case.apply(&[case.diag(0, 4, "declared and not used: v")]).unwrap();
        assert_eq!(fixed.source(), r#"if v, ok := m["a"]; ok { __goeval_print(v); }"#);
    }

    #[test]
    fn unused_range_variables_printed_in_body_in_order() {
        let case = Case::new("for k, v := range m {\nfmt.Println()\n}");
        let fixed = case
            .apply(&[
                case.diag(0, 5, "declared and not used: k"),
                case.diag(0, 8, "declared and not used: v"),
            ])
            .unwrap();
        assert_eq!(
            fixed.source(),
            "for k, v := range m { __goeval_print(k); __goeval_print(v);\nfmt.Println()\n}"
        );
    }

    #[test]
    fn unused_type_switch_variable_printed_in_every_clause() {
        let case = Case::new("switch v := x.(type) {\ncase int:\nif true {}\ndefault:\n}");
        let fixed = case.apply(&[case.diag(0, 8, "declared and not used: v")]).unwrap();
        assert_eq!(
            fixed.source(),
            "switch v := x.(type) {\ncase int: __goeval_print(v);\nif true {}\ndefault: __goeval_print(v);\n}"
        );
    }

    #[test]
    fn header_detection() {
        assert_eq!(header_insertions("if v := 1; true {}", 3), Some(vec![17]));
        assert_eq!(
            header_insertions("if false {} else if v := 1; true {}", 20),
            Some(vec![34])
        );
        assert_eq!(header_insertions("x := 1", 0), None);
        assert_eq!(header_insertions("if true {\nx := 2\n}", 10), None);
        assert_eq!(header_insertions("switch v := f(); {}", 7), Some(vec![]));
    }

    #[test]
    fn grouped_var_printed_after_group() {
        let case = Case::new("var (\nx = 1\n)");
        let fixed = case.apply(&[case.diag(1, 1, "declared and not used: x")]).unwrap();
        assert_eq!(fixed.source(), "var (\nx = 1\n); __goeval_print(x)");
    }

    #[test]
    fn unused_value_in_statement_is_wrapped() {
        let case = Case::new("x := 3; x * 2");
        let fixed = case
            .apply(&[case.diag(0, 9, "x * 2 (value of type int) is not used")])
            .unwrap();
        assert_eq!(fixed.source(), "x := 3; __goeval_print(x * 2)");
        assert_eq!(fixed.kind(), FragmentKind::Statement);
    }

    #[test]
    fn unused_value_inside_block() {
        let case = Case::new("if true { 1 + 2 }");
        let fixed = case
            .apply(&[case.diag(0, 11, "1 + 2 (untyped int constant 3) is not used")])
            .unwrap();
        assert_eq!(fixed.source(), "if true { __goeval_print(1 + 2) }");
    }

    #[test]
    fn void_expression_is_demoted() {
        let case = Case::new(r#"log.SetPrefix("")"#);
        let fixed = case
            .apply(&[case.diag(0, 1, r#"log.SetPrefix("") (no value) used as value"#)])
            .unwrap();
        assert_eq!(fixed.kind(), FragmentKind::Statement);
        assert_eq!(fixed.source(), r#"log.SetPrefix("")"#);
    }

    #[test]
    fn unrecoverable_diagnostic_blocks_round() {
        let case = Case::new("a := foo");
        assert!(case
            .apply(&[
                case.diag(0, 1, "declared and not used: a"),
                case.diag(0, 6, "undefined: foo"),
            ])
            .is_none());
    }

    #[test]
    fn diagnostics_outside_candidate_are_not_fixed() {
        let case = Case::new("a := 1");
        let line = case.program.candidate_line.unwrap() - 1;
        let diag =
            diagnostic::parse(&format!("./main.go:{line}:1: declared and not used: z\n")).remove(0);
        assert!(case.apply(&[diag]).is_none());
    }

    #[test]
    fn no_positioned_diagnostics() {
        let case = Case::new("a := 1");
        assert!(case.apply(&diagnostic::parse("go: something odd\n")).is_none());
    }

    #[test]
    fn statement_end_boundaries() {
        assert_eq!(statement_end("a := f(1,\n2); b", 0), 12);
        assert_eq!(statement_end("{ x := 1 }", 2), 9);
        assert_eq!(statement_end("x := 1", 0), 6);
    }
}
