//! Program synthesis: render committed history plus a candidate as one
//! compilable Go file.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

use super::fragment::{Fragment, FragmentKind};
use super::imports;
use super::printer;
use super::scan;
use super::state::SessionState;

/// A synthesized `main.go` for one build attempt.
#[derive(Debug, Clone)]
pub struct CandidateProgram {
    /// The full Go source.
    pub source: String,
    /// First line (1-based) of the candidate in `source`, if there is one.
    pub candidate_line: Option<usize>,
    /// Number of lines the candidate spans.
    pub candidate_lines: usize,
    /// Bytes inserted before the candidate's text on its first line.
    pub candidate_prefix: usize,
}

impl CandidateProgram {
    /// Map a compiler position to a byte offset in the candidate's own
    /// source text, or `None` if the position lies outside the candidate.
    #[must_use]
    pub fn candidate_offset(&self, candidate: &str, line: usize, column: usize) -> Option<usize> {
        let first = self.candidate_line?;
        if line < first || line >= first + self.candidate_lines {
            return None;
        }
        let rel_line = line - first;
        let mut col = column.saturating_sub(1);
        if rel_line == 0 {
            col = col.checked_sub(self.candidate_prefix)?;
        }
        let line_start: usize = candidate
            .split_inclusive('\n')
            .take(rel_line)
            .map(str::len)
            .sum();
        let offset = line_start + col;
        (offset <= candidate.len()).then_some(offset)
    }

    /// Whether a compiler position lies within the candidate.
    #[must_use]
    pub fn contains_line(&self, line: usize) -> bool {
        self.candidate_line
            .is_some_and(|first| line >= first && line < first + self.candidate_lines)
    }
}

/// How a fragment appears in the program.
fn render(fragment: &Fragment) -> String {
    match fragment.kind() {
        FragmentKind::Import => String::new(),
        FragmentKind::Expression => printer::print_call(fragment.source()),
        FragmentKind::Declaration | FragmentKind::Statement => fragment.source().to_string(),
    }
}

/// Build the program for `candidate` on top of the committed history.
///
/// `pending_imports` are imports the candidate needs that are not yet part
/// of the session; they are rendered but not recorded.
#[must_use]
pub fn synthesize(
    state: &SessionState,
    candidate: Option<&Fragment>,
    pending_imports: &BTreeSet<String>,
) -> CandidateProgram {
    let history = state.fragments();
    let candidate_file_level = candidate.is_some_and(Fragment::is_file_level);

    // File-level declarations: a later declaration of the same name wins.
    let mut file_level: Vec<&Fragment> = Vec::new();
    let mut later_names: HashSet<&str> = candidate
        .filter(|c| c.is_file_level())
        .map(|c| c.introduced().iter().map(String::as_str).collect())
        .unwrap_or_default();
    for frag in history.iter().rev().filter(|f| f.is_file_level()) {
        if frag.introduced().iter().any(|n| later_names.contains(n.as_str())) {
            continue;
        }
        later_names.extend(frag.introduced().iter().map(String::as_str));
        file_level.push(frag);
    }
    file_level.reverse();

    let mut decls = String::new();
    for frag in &file_level {
        decls.push_str(&render(frag));
        decls.push_str("\n\n");
    }

    let mut body = String::new();
    let mut bound: HashSet<&str> = HashSet::new();
    let mut depth = 0usize;
    for frag in history
        .iter()
        .filter(|f| !f.is_file_level() && f.kind() != FragmentKind::Import)
    {
        if shadows(frag, &bound) {
            body.push_str("{\n");
            depth += 1;
        }
        bound.extend(frag.introduced().iter().map(String::as_str));
        body.push_str(&render(frag));
        body.push('\n');
    }
    body.push_str(&printer::marker_statement());
    body.push('\n');

    let main_candidate =
        candidate.filter(|c| !c.is_file_level() && c.kind() != FragmentKind::Import);
    if main_candidate.is_some_and(|c| shadows(c, &bound)) {
        body.push_str("{\n");
        depth += 1;
    }
    let closing = "}\n".repeat(depth);

    // Imports are decided last so unreferenced ones can be rendered blank.
    let candidate_text = candidate.map(render).unwrap_or_default();
    let all_code = format!("{decls}\n{body}\n{candidate_text}\n{}", printer::helper_source());
    let mut paths: BTreeSet<&str> = printer::PREAMBLE_IMPORTS.iter().copied().collect();
    paths.extend(state.imports().iter().map(String::as_str));
    paths.extend(pending_imports.iter().map(String::as_str));
    let candidate_import_paths: Vec<String> =
        candidate.map(Fragment::import_paths).unwrap_or_default();
    paths.extend(candidate_import_paths.iter().map(String::as_str));

    let mut source = String::from("package main\n\nimport (\n");
    for path in &paths {
        let name = imports::package_name(path);
        if scan::references_qualifier(&all_code, &name) {
            let _ = writeln!(source, "\t{path:?}");
        } else {
            let _ = writeln!(source, "\t_ {path:?}");
        }
    }
    source.push_str(")\n\n");
    source.push_str(&printer::helper_source());
    source.push('\n');
    source.push_str(&decls);

    let mut candidate_line = None;
    let mut candidate_prefix = 0;
    if let Some(frag) = candidate.filter(|c| c.is_file_level()) {
        candidate_line = Some(line_of_end(&source));
        source.push_str(frag.source());
        source.push_str("\n\n");
    }

    source.push_str("func main() {\n");
    source.push_str(&body);
    if let Some(frag) = main_candidate {
        candidate_line = Some(line_of_end(&source));
        if frag.kind() == FragmentKind::Expression {
            candidate_prefix = printer::PRINT_FN.len() + 1;
        }
        source.push_str(&candidate_text);
        source.push('\n');
    }
    source.push_str(&closing);
    source.push_str("}\n");

    let candidate_lines = candidate
        .filter(|c| candidate_file_level || c.kind() != FragmentKind::Import)
        .map_or(0, |c| render(c).lines().count().max(1));

    CandidateProgram {
        source,
        candidate_line: candidate_line.filter(|_| candidate_lines > 0),
        candidate_lines,
        candidate_prefix,
    }
}

/// A later binding that would redeclare names in the current scope of
/// `main` needs a scope of its own. A `:=` with at least one new name
/// reuses the others, as it would in one Go function body.
fn shadows(fragment: &Fragment, bound: &HashSet<&str>) -> bool {
    fragment
        .bindings()
        .iter()
        .any(|b| b.collides(|n| bound.contains(n)))
}

/// 1-based number of the line that the next appended text starts on.
fn line_of_end(source: &str) -> usize {
    source.matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(sources: &[&str]) -> SessionState {
        let mut state = SessionState::new().unwrap();
        for src in sources {
            let id = state.next_fragment_id();
            state.commit(Fragment::new(id, src));
        }
        state
    }

    fn program(state: &SessionState, candidate: &str) -> CandidateProgram {
        let frag = Fragment::new(99, candidate);
        synthesize(state, Some(&frag), &BTreeSet::new())
    }

    fn line(source: &str, n: usize) -> &str {
        source.lines().nth(n - 1).unwrap()
    }

    #[test]
    fn expression_is_printed() {
        let state = state_with(&[]);
        let prog = program(&state, "1+1");
        assert!(prog.source.starts_with("package main\n"));
        assert!(prog.source.contains("\t\"fmt\"\n"));
        let first = prog.candidate_line.unwrap();
        assert_eq!(line(&prog.source, first), "__goeval_print(1+1)");
        assert_eq!(prog.candidate_prefix, "__goeval_print(".len());
    }

    #[test]
    fn history_precedes_marker_and_candidate() {
        let state = state_with(&["a := 1", "b := a + 1"]);
        let prog = program(&state, "b");
        let a = prog.source.find("a := 1").unwrap();
        let b = prog.source.find("b := a + 1").unwrap();
        let marker = prog.source.find("goeval:candidate").unwrap();
        let cand = prog.source.find("__goeval_print(b)").unwrap();
        assert!(a < b && b < marker && marker < cand);
    }

    #[test]
    fn declarations_at_file_level() {
        let state = state_with(&["func double(x int) int { return 2 * x }", "type T struct{}"]);
        let prog = program(&state, "double(2)");
        let main = prog.source.find("func main()").unwrap();
        assert!(prog.source.find("func double").unwrap() < main);
        assert!(prog.source.find("type T struct{}").unwrap() < main);
    }

    #[test]
    fn redeclared_function_replaces_earlier() {
        let state = state_with(&["func f() int { return 1 }", "func g() {}"]);
        let prog = program(&state, "func f() int { return 2 }");
        assert!(!prog.source.contains("return 1"));
        assert!(prog.source.contains("return 2"));
        assert!(prog.source.contains("func g() {}"));
    }

    #[test]
    fn rebinding_opens_scope() {
        let state = state_with(&["x := 1"]);
        let prog = program(&state, "x := \"two\"");
        let first = prog.candidate_line.unwrap();
        assert_eq!(line(&prog.source, first - 1), "{");
        assert_eq!(line(&prog.source, first), "x := \"two\"");
        assert!(prog.source.ends_with("}\n}\n"));
    }

    #[test]
    fn partial_rebinding_reuses_variable() {
        let state = state_with(&["x := 1; __goeval_print(x)"]);
        let prog = program(&state, "x, y := 2, 3");
        let first = prog.candidate_line.unwrap();
        assert_ne!(line(&prog.source, first - 1), "{");
        assert_eq!(line(&prog.source, first), "x, y := 2, 3");
        assert!(!prog.source.lines().any(|l| l == "{"));
    }

    #[test]
    fn redeclared_var_opens_scope() {
        let state = state_with(&["x := 1"]);
        let prog = program(&state, "var x string");
        let first = prog.candidate_line.unwrap();
        assert_eq!(line(&prog.source, first - 1), "{");
    }

    #[test]
    fn unreferenced_imports_are_blank() {
        let mut state = state_with(&[]);
        state.add_import("encoding/json");
        state.add_import("os");
        let prog = program(&state, "b, err := json.Marshal(nil)");
        assert!(prog.source.contains("\t\"encoding/json\"\n"));
        assert!(prog.source.contains("\t_ \"os\"\n"));
    }

    #[test]
    fn imports_are_deduplicated() {
        let mut state = state_with(&[]);
        state.add_import("fmt");
        state.add_import("fmt");
        let pending: BTreeSet<String> = ["fmt".to_string()].into();
        let frag = Fragment::new(1, "fmt.Sprint(1)");
        let prog = synthesize(&state, Some(&frag), &pending);
        assert_eq!(prog.source.matches("\"fmt\"").count(), 1);
    }

    #[test]
    fn pending_imports_rendered() {
        let state = state_with(&[]);
        let pending: BTreeSet<String> = ["path/filepath".to_string()].into();
        let frag = Fragment::new(1, r#"filepath.Join("a", "b")"#);
        let prog = synthesize(&state, Some(&frag), &pending);
        assert!(prog.source.contains("\t\"path/filepath\"\n"));
    }

    #[test]
    fn candidate_offsets() {
        let state = state_with(&[]);
        let frag = Fragment::new(1, "a := 1\nb := 2");
        let prog = synthesize(&state, Some(&frag), &BTreeSet::new());
        let first = prog.candidate_line.unwrap();
        assert_eq!(prog.candidate_lines, 2);
        assert_eq!(prog.candidate_offset(frag.source(), first + 1, 1), Some(7));
        assert_eq!(prog.candidate_offset(frag.source(), first - 1, 1), None);
        assert!(!prog.contains_line(first + 2));
    }

    #[test]
    fn no_candidate_renders_history() {
        let state = state_with(&["a := 1"]);
        let prog = synthesize(&state, None, &BTreeSet::new());
        assert!(prog.candidate_line.is_none());
        assert!(prog.source.contains("a := 1\n"));
    }
}
