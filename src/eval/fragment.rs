//! Fragments: the units of input a session accumulates.

use std::fmt;

use super::classify::{self, Binding};

/// What a fragment contributes to the synthesized program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// `import "path"`; contributes only to the import set.
    Import,
    /// `func`, `type`, `var` or `const` declaration.
    Declaration,
    /// Any statement, or several statements.
    Statement,
    /// A single bare expression whose value is printed.
    Expression,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "import",
            Self::Declaration => "declaration",
            Self::Statement => "statement",
            Self::Expression => "expression",
        })
    }
}

/// One unit of input.
///
/// Fragments are never edited in place: a quick fix builds a new fragment
/// with [`Fragment::rewritten`], keeping the id of the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    id: u64,
    source: String,
    kind: FragmentKind,
    bindings: Vec<Binding>,
    introduced: Vec<String>,
}

impl Fragment {
    /// Build a fragment from user input, classifying it.
    #[must_use]
    pub fn new(id: u64, source: &str) -> Self {
        let source = source.trim();
        let kind = classify::classify_source(source);
        Self::with_kind(id, source, kind)
    }

    /// Build a fragment of a known kind.
    #[must_use]
    pub fn with_kind(id: u64, source: &str, kind: FragmentKind) -> Self {
        let source = source.trim().trim_end_matches(';').trim_end().to_string();
        let bindings = classify::bindings(&source, kind);
        let introduced = bindings.iter().flat_map(|b| b.names.clone()).collect();
        Self {
            id,
            source,
            kind,
            bindings,
            introduced,
        }
    }

    /// A new fragment with the same id and different source or kind.
    #[must_use]
    pub fn rewritten(&self, source: &str, kind: FragmentKind) -> Self {
        Self::with_kind(self.id, source, kind)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Identifiers this fragment binds.
    #[must_use]
    pub fn introduced(&self) -> &[String] {
        &self.introduced
    }

    /// The same identifiers grouped by the statement binding them.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Whether this fragment lives at file level rather than inside `main`.
    #[must_use]
    pub fn is_file_level(&self) -> bool {
        self.kind == FragmentKind::Declaration
            && matches!(self.source.split_whitespace().next(), Some("func" | "type"))
    }

    /// Import paths named by an import fragment.
    #[must_use]
    pub fn import_paths(&self) -> Vec<String> {
        if self.kind == FragmentKind::Import {
            classify::import_paths(&self.source)
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_classifies_and_binds() {
        let frag = Fragment::new(3, "  a := 1;  ");
        assert_eq!(frag.id(), 3);
        assert_eq!(frag.source(), "a := 1");
        assert_eq!(frag.kind(), FragmentKind::Statement);
        assert_eq!(frag.introduced(), ["a"]);
    }

    #[test]
    fn rewritten_keeps_id() {
        let frag = Fragment::new(7, r#"log.SetPrefix("")"#);
        let demoted = frag.rewritten(frag.source(), FragmentKind::Statement);
        assert_eq!(demoted.id(), 7);
        assert_eq!(demoted.kind(), FragmentKind::Statement);
        assert_eq!(frag.kind(), FragmentKind::Expression);
    }

    #[test]
    fn file_level_declarations() {
        assert!(Fragment::new(0, "func f() {}").is_file_level());
        assert!(Fragment::new(0, "type T int").is_file_level());
        assert!(!Fragment::new(0, "var x = 1").is_file_level());
        assert!(!Fragment::new(0, "func() {}").is_file_level());
    }

    #[test]
    fn import_fragment() {
        let frag = Fragment::new(0, r#"import "os""#);
        assert_eq!(frag.kind(), FragmentKind::Import);
        assert_eq!(frag.import_paths(), ["os"]);
    }
}
