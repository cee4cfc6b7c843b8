//! Input classification for the evaluation session.
//!
//! Determines whether user input is an import, a declaration, a statement,
//! a meta-command, or a bare expression, and which identifiers it binds.

use super::fragment::FragmentKind;
use super::scan::{self, Token, TokenKind, ASSIGN_OPS};

/// The kind of input entered at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Go source to be evaluated as a fragment.
    Fragment(FragmentKind),
    /// A meta-command (starts with `:`).
    Command(ReplCommand),
}

/// A meta-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `:help` — show available commands.
    Help,
    /// `:quit` or `:q` — exit.
    Quit,
    /// `:clear` — reset session state.
    Clear,
    /// `:import <path>...` — add packages to the import set.
    Import(Vec<String>),
    /// `:include <path>` — load an auxiliary Go file or directory.
    Include(String),
    /// `:print` — show the current synthesized program.
    Print,
    /// `:write <file>` — save the current synthesized program.
    Write(String),
    /// Unknown command.
    Unknown(String),
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "if",
    "for",
    "switch",
    "select",
    "go",
    "defer",
    "return",
    "break",
    "continue",
    "goto",
    "fallthrough",
];

/// Classify a line of input.
#[must_use]
pub fn classify(input: &str) -> InputKind {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return InputKind::Fragment(FragmentKind::Expression);
    }

    if let Some(cmd) = trimmed.strip_prefix(':') {
        return InputKind::Command(parse_command(cmd));
    }

    InputKind::Fragment(classify_source(trimmed))
}

/// Classify Go source as a fragment kind.
#[must_use]
pub fn classify_source(source: &str) -> FragmentKind {
    let scanned = scan::scan(source);
    let tokens: Vec<Token<'_>> = scanned
        .tokens
        .into_iter()
        .skip_while(|t| t.kind == TokenKind::Newline)
        .collect();
    let Some(first) = tokens.first() else {
        return FragmentKind::Expression;
    };

    if first.kind == TokenKind::Ident {
        match first.text {
            "import" => return FragmentKind::Import,
            "type" | "var" | "const" => return FragmentKind::Declaration,
            "func" if is_func_declaration(&tokens) => return FragmentKind::Declaration,
            kw if STATEMENT_KEYWORDS.contains(&kw) => return FragmentKind::Statement,
            _ => {}
        }
    }
    if first.is(TokenKind::Open, "{") {
        return FragmentKind::Statement;
    }

    let stmts = scan::statements(&tokens);
    if stmts.len() > 1 || stmts.first().is_some_and(|s| is_simple_statement(s)) {
        FragmentKind::Statement
    } else {
        FragmentKind::Expression
    }
}

/// `func name(...)` or `func (recv T) name(...)`, as opposed to a literal.
fn is_func_declaration(tokens: &[Token<'_>]) -> bool {
    match tokens.get(1) {
        Some(t) if t.kind == TokenKind::Ident => true,
        Some(t) if t.is(TokenKind::Open, "(") => scan::matching_close(tokens, 1)
            .and_then(|close| tokens.get(close + 1..close + 3))
            .is_some_and(|next| next[0].kind == TokenKind::Ident && next[1].is(TokenKind::Open, "(")),
        _ => false,
    }
}

/// A top-level assignment, inc/dec, send or labeled statement.
fn is_simple_statement(stmt: &[Token<'_>]) -> bool {
    let base = stmt[0].depth;
    if stmt.len() >= 2 && stmt[0].kind == TokenKind::Ident && stmt[1].is_punct(":") {
        return true;
    }
    stmt.iter().enumerate().any(|(idx, tok)| {
        tok.depth == base
            && tok.kind == TokenKind::Punct
            && (ASSIGN_OPS.contains(&tok.text)
                || tok.text == "++"
                || tok.text == "--"
                || (tok.text == "<-" && idx > 0 && !stmt[idx - 1].is_punct("<-")))
    })
}

/// Names bound by one statement or one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Bound names, without the blank identifier.
    pub names: Vec<String>,
    /// A `:=` short variable declaration.
    pub short: bool,
}

impl Binding {
    /// Whether this binding cannot share a scope with `is_bound` names.
    ///
    /// A `:=` reuses names already declared in the scope as long as at
    /// least one name on its left is new. A declaration never does.
    pub fn collides(&self, is_bound: impl Fn(&str) -> bool) -> bool {
        if self.short {
            !self.names.is_empty() && self.names.iter().all(|n| is_bound(n))
        } else {
            self.names.iter().any(|n| is_bound(n))
        }
    }
}

/// Identifiers a fragment binds for later fragments.
///
/// Method declarations are reported as `Type.Method` so a re-declared
/// method replaces the earlier one. The blank identifier is never bound.
#[must_use]
pub fn introduced_identifiers(source: &str, kind: FragmentKind) -> Vec<String> {
    bindings(source, kind)
        .into_iter()
        .flat_map(|b| b.names)
        .collect()
}

/// Bindings of a fragment, one per top-level statement that binds names.
#[must_use]
pub fn bindings(source: &str, kind: FragmentKind) -> Vec<Binding> {
    let scanned = scan::scan(source);
    let tokens = &scanned.tokens;
    let mut found = Vec::new();

    for stmt in scan::statements(tokens) {
        let first = stmt[0];
        let mut names = Vec::new();
        let mut short = false;
        match (kind, first.text) {
            (FragmentKind::Declaration, "func") => {
                if let Some(name) = func_declaration_name(stmt) {
                    names.push(name);
                }
            }
            (_, "type" | "var" | "const") if first.kind == TokenKind::Ident => {
                spec_names(&stmt[1..], first.text == "type", &mut names);
            }
            (FragmentKind::Statement | FragmentKind::Declaration, _)
                if first.kind == TokenKind::Ident =>
            {
                if let Some(define) = stmt
                    .iter()
                    .position(|t| t.depth == first.depth && t.is_punct(":="))
                {
                    if !STATEMENT_KEYWORDS.contains(&first.text) {
                        ident_list(&stmt[..define], &mut names);
                        short = true;
                    }
                }
            }
            _ => {}
        }
        names.retain(|n| n != "_");
        if !names.is_empty() {
            found.push(Binding { names, short });
        }
    }
    found
}

fn func_declaration_name(stmt: &[Token<'_>]) -> Option<String> {
    match stmt.get(1) {
        Some(t) if t.kind == TokenKind::Ident => Some(t.text.to_string()),
        Some(t) if t.is(TokenKind::Open, "(") => {
            let close = scan::matching_close(stmt, 1)?;
            // The receiver type is the last identifier inside the parens.
            let recv = stmt[2..close]
                .iter()
                .rev()
                .find(|t| t.kind == TokenKind::Ident)?;
            let method = stmt.get(close + 1).filter(|t| t.kind == TokenKind::Ident)?;
            Some(format!("{}.{}", recv.text, method.text))
        }
        _ => None,
    }
}

/// Names from `x, y T = ...` or a parenthesized group of such specs.
fn spec_names(rest: &[Token<'_>], single_name: bool, names: &mut Vec<String>) {
    match rest.first() {
        Some(t) if t.is(TokenKind::Open, "(") => {
            let close = scan::matching_close(rest, 0).unwrap_or(rest.len());
            for spec in scan::statements(&rest[1..close]) {
                spec_names(spec, single_name, names);
            }
        }
        Some(t) if t.kind == TokenKind::Ident => {
            if single_name {
                names.push(t.text.to_string());
            } else {
                ident_list(rest, names);
            }
        }
        _ => {}
    }
}

/// Leading `a, b, c` identifier list.
fn ident_list(tokens: &[Token<'_>], names: &mut Vec<String>) {
    let mut expect_ident = true;
    for tok in tokens {
        match (expect_ident, tok.kind) {
            (true, TokenKind::Ident) => names.push(tok.text.to_string()),
            (false, TokenKind::Punct) if tok.text == "," => {}
            _ => break,
        }
        expect_ident = !expect_ident;
    }
}

/// Package paths named by an `import` fragment.
#[must_use]
pub fn import_paths(source: &str) -> Vec<String> {
    scan::scan(source)
        .tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Str)
        .map(|t| t.text.trim_matches(|c| c == '"' || c == '`').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether a statement of the fragment is a `defer` in `main` itself.
///
/// Such a call would run when `main` returns, after the output of every
/// later evaluation.
#[must_use]
pub fn defers_in_main(source: &str) -> bool {
    let tokens = scan::scan(source).tokens;
    scan::statements(&tokens)
        .iter()
        .any(|stmt| stmt[0].is(TokenKind::Ident, "defer"))
}

/// Aliases other than `_` given in an `import` fragment, such as `j` in
/// `import j "encoding/json"` or `.` in a dot import.
#[must_use]
pub fn import_aliases(source: &str) -> Vec<String> {
    let tokens = scan::scan(source).tokens;
    tokens
        .windows(2)
        .filter(|pair| pair[1].kind == TokenKind::Str)
        .filter(|pair| match pair[0].kind {
            TokenKind::Ident => !matches!(pair[0].text, "import" | "_"),
            TokenKind::Punct => pair[0].text == ".",
            _ => false,
        })
        .map(|pair| pair[0].text.to_string())
        .collect()
}

/// Parse a meta-command string (after the leading `:`).
fn parse_command(cmd: &str) -> ReplCommand {
    let parts: Vec<&str> = cmd.trim().splitn(2, char::is_whitespace).collect();
    let name = parts[0];
    let arg = parts.get(1).map(|s| s.trim().to_string());

    match name {
        "help" | "h" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        "clear" => ReplCommand::Clear,
        "import" | "i" => ReplCommand::Import(
            arg.unwrap_or_default()
                .split_whitespace()
                .map(|p| p.trim_matches('"').to_string())
                .collect(),
        ),
        "include" => ReplCommand::Include(arg.unwrap_or_default()),
        "print" | "p" => ReplCommand::Print,
        "write" | "w" => ReplCommand::Write(arg.unwrap_or_default()),
        other => ReplCommand::Unknown(other.to_string()),
    }
}

/// Check whether input has unclosed delimiters or literals (for multi-line input).
#[must_use]
pub fn has_unclosed_delimiters(input: &str) -> bool {
    let scanned = scan::scan(input);
    scanned.open_depth > 0 || (scanned.unterminated && input.contains('`'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(src: &str) -> FragmentKind {
        classify_source(src)
    }

    #[test]
    fn classify_declarations() {
        assert_eq!(kind("func f() int { return 1 }"), FragmentKind::Declaration);
        assert_eq!(kind("func (p Point) Len() int { return 0 }"), FragmentKind::Declaration);
        assert_eq!(kind("type Point struct{ X int }"), FragmentKind::Declaration);
        assert_eq!(kind("const ( a = iota; b )"), FragmentKind::Declaration);
        assert_eq!(kind("var x int"), FragmentKind::Declaration);
        assert_eq!(kind(r#"import "fmt""#), FragmentKind::Import);
    }

    #[test]
    fn classify_statements() {
        assert_eq!(kind("a := 1"), FragmentKind::Statement);
        assert_eq!(kind("b, err := json.Marshal(nil)"), FragmentKind::Statement);
        assert_eq!(kind("x += 2"), FragmentKind::Statement);
        assert_eq!(kind("i++"), FragmentKind::Statement);
        assert_eq!(kind("ch <- 1"), FragmentKind::Statement);
        assert_eq!(kind("if a > 0 { panic(a) }"), FragmentKind::Statement);
        assert_eq!(kind("x := 1; x * 2"), FragmentKind::Statement);
        assert_eq!(kind("loop: for {}"), FragmentKind::Statement);
    }

    #[test]
    fn classify_expressions() {
        assert_eq!(kind("1+1"), FragmentKind::Expression);
        assert_eq!(kind(r#"[]byte("")"#), FragmentKind::Expression);
        assert_eq!(kind("func() {}"), FragmentKind::Expression);
        assert_eq!(kind("func(x int) int { return x }(3)"), FragmentKind::Expression);
        assert_eq!(kind("(4 & (1 << 1))"), FragmentKind::Expression);
        assert_eq!(kind("<-ch"), FragmentKind::Expression);
        assert_eq!(kind("x == 1"), FragmentKind::Expression);
        assert_eq!(kind("map[string]int{\"a\": 1}"), FragmentKind::Expression);
        assert_eq!(kind(r#"log.SetPrefix("")"#), FragmentKind::Expression);
    }

    #[test]
    fn classify_commands() {
        assert_eq!(classify(":help"), InputKind::Command(ReplCommand::Help));
        assert_eq!(classify(":q"), InputKind::Command(ReplCommand::Quit));
        assert_eq!(classify(":clear"), InputKind::Command(ReplCommand::Clear));
        assert_eq!(
            classify(":import encoding/json \"os\""),
            InputKind::Command(ReplCommand::Import(vec![
                "encoding/json".to_string(),
                "os".to_string()
            ]))
        );
        assert_eq!(
            classify(":include ./helpers"),
            InputKind::Command(ReplCommand::Include("./helpers".to_string()))
        );
        assert_eq!(
            classify(":frobnicate"),
            InputKind::Command(ReplCommand::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn introduced_by_statements() {
        assert_eq!(
            introduced_identifiers("b, err := json.Marshal(nil)", FragmentKind::Statement),
            ["b", "err"]
        );
        assert_eq!(
            introduced_identifiers("_, ok := m[k]", FragmentKind::Statement),
            ["ok"]
        );
        assert!(introduced_identifiers("for i := 0; i < 3; i++ {}", FragmentKind::Statement)
            .is_empty());
        assert!(introduced_identifiers("x = 2", FragmentKind::Statement).is_empty());
    }

    #[test]
    fn short_declaration_reuses_bound_names() {
        let bound = |n: &str| n == "x" || n == "err";
        let partial = bindings("x, y := 2, 3", FragmentKind::Statement);
        assert_eq!(partial.len(), 1);
        assert!(partial[0].short);
        assert!(!partial[0].collides(bound));

        let repeated = bindings(r#"x := "two""#, FragmentKind::Statement);
        assert!(repeated[0].collides(bound));

        let blank = bindings("_, err := f()", FragmentKind::Statement);
        assert!(blank[0].collides(bound));

        let var = bindings("var x, z int", FragmentKind::Declaration);
        assert!(!var[0].short);
        assert!(var[0].collides(bound));
    }

    #[test]
    fn introduced_by_declarations() {
        assert_eq!(
            introduced_identifiers("const ( a = iota; b )", FragmentKind::Declaration),
            ["a", "b"]
        );
        assert_eq!(
            introduced_identifiers("var x, y int = 1, 2", FragmentKind::Declaration),
            ["x", "y"]
        );
        assert_eq!(
            introduced_identifiers("type ( A int\n B string )", FragmentKind::Declaration),
            ["A", "B"]
        );
        assert_eq!(
            introduced_identifiers("func double(x int) int { return 2 * x }", FragmentKind::Declaration),
            ["double"]
        );
        assert_eq!(
            introduced_identifiers("func (p *Point) Scale(k int) {}", FragmentKind::Declaration),
            ["Point.Scale"]
        );
    }

    #[test]
    fn import_fragment_paths() {
        assert_eq!(import_paths(r#"import "fmt""#), ["fmt"]);
        assert_eq!(
            import_paths("import (\n\"os\"\n\"path/filepath\"\n)"),
            ["os", "path/filepath"]
        );
    }

    #[test]
    fn defer_in_main() {
        assert!(defers_in_main(r#"defer fmt.Println("bye")"#));
        assert!(defers_in_main("f, _ := os.Open(p)\ndefer f.Close()"));
        assert!(!defers_in_main("func() { defer recover() }()"));
        assert!(!defers_in_main("deferred := 1"));
    }

    #[test]
    fn import_fragment_aliases() {
        assert_eq!(import_aliases(r#"import j "encoding/json""#), ["j"]);
        assert_eq!(import_aliases("import (\n. \"math\"\n_ \"image/png\"\n\"os\"\n)"), ["."]);
        assert!(import_aliases(r#"import _ "embed""#).is_empty());
        assert!(import_aliases(r#"import "fmt""#).is_empty());
    }

    #[test]
    fn unclosed_delimiters() {
        assert!(has_unclosed_delimiters("func f() {"));
        assert!(has_unclosed_delimiters("x := (1 +"));
        assert!(has_unclosed_delimiters("s := `line one"));
        assert!(!has_unclosed_delimiters("func f() {}"));
        assert!(!has_unclosed_delimiters(r#"s := "hello {world""#));
    }

    #[test]
    fn empty_input() {
        assert_eq!(classify(""), InputKind::Fragment(FragmentKind::Expression));
        assert_eq!(classify("   "), InputKind::Fragment(FragmentKind::Expression));
    }
}
