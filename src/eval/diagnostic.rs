//! Structured diagnostics parsed from `go build` output.
//!
//! The compiler has no stable machine-readable error format, so each
//! diagnostic is reduced to a [`Category`] plus the subject it names
//! (identifier, expression or package path). Rules downstream match on that
//! schema only. The message patterns below are the compatibility shim: each
//! category lists the wording of current Go releases first and the wording
//! of older releases after it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A source position reported by the compiler (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: Option<usize>,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// An expression was evaluated and its result discarded.
    UnusedValue { expr: String },
    /// A variable was declared and never referenced.
    UnusedVariable { ident: String },
    /// A call without results was used where a value is required.
    NoValue { expr: String },
    /// An identifier is not defined.
    Undefined { ident: String },
    /// A package was imported and never referenced.
    UnusedImport { path: String },
    /// A parse error.
    Syntax,
    /// Any other positioned compiler error.
    Other,
    /// `# package` header line printed by `go build`.
    Header,
    /// A line the parser does not recognize; passed through verbatim.
    Unstructured,
}

impl Category {
    /// Whether this category describes an actual error, as opposed to
    /// framing emitted around errors.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Header)
    }
}

/// One compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub category: Category,
    pub position: Option<Position>,
    /// Indented continuation lines (`have ...` / `want ...`).
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// A diagnostic with no position, carrying `line` verbatim.
    #[must_use]
    pub fn unstructured(line: &str) -> Self {
        Self {
            message: line.to_string(),
            category: Category::Unstructured,
            position: None,
            notes: Vec::new(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\./)?(?P<file>[^\s:]+\.go):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<msg>.+)$")
        .expect("valid regex")
});

type Classifier = fn(&regex::Captures<'_>) -> Category;

static PATTERNS: LazyLock<Vec<(Regex, Classifier)>> = LazyLock::new(|| {
    let table: [(&str, Classifier); 11] = [
        (r"^declared and not used: (?P<x>\S+)$", |c| Category::UnusedVariable {
            ident: c["x"].to_string(),
        }),
        (r"^(?P<x>\S+) declared (?:and|but) not used$", |c| Category::UnusedVariable {
            ident: c["x"].to_string(),
        }),
        (r"^(?P<x>.+) \(no value\) used as value$", |c| Category::NoValue {
            expr: c["x"].to_string(),
        }),
        (r"^(?P<x>.+) used as value$", |c| Category::NoValue {
            expr: c["x"].to_string(),
        }),
        (r"^(?P<x>.+?)(?: \([^()]*\))? is not used$", |c| Category::UnusedValue {
            expr: c["x"].to_string(),
        }),
        (r"^(?P<x>.+) evaluated but not used$", |c| Category::UnusedValue {
            expr: c["x"].to_string(),
        }),
        (r"^undefined: (?P<x>\S+)$", |c| Category::Undefined {
            ident: c["x"].to_string(),
        }),
        (r#"^"(?P<x>[^"]+)" imported(?: as \S+)? and not used$"#, |c| {
            Category::UnusedImport {
                path: c["x"].to_string(),
            }
        }),
        (r#"^imported and not used: "(?P<x>[^"]+)"$"#, |c| Category::UnusedImport {
            path: c["x"].to_string(),
        }),
        (r"^syntax error", |_| Category::Syntax),
        (r"^(?:non-declaration statement|unexpected )", |_| Category::Syntax),
    ];
    table
        .into_iter()
        .map(|(pat, classify)| (Regex::new(pat).expect("valid regex"), classify))
        .collect()
});

/// Categorize a diagnostic message (the text after `file:line:col: `).
#[must_use]
pub fn categorize(message: &str) -> Category {
    PATTERNS
        .iter()
        .find_map(|(re, classify)| re.captures(message).map(|c| classify(&c)))
        .unwrap_or(Category::Other)
}

/// Parse the toolchain's error stream.
///
/// Every non-empty line yields exactly one diagnostic, except indented
/// continuation lines which become notes on the preceding one.
#[must_use]
pub fn parse(stderr: &str) -> Vec<Diagnostic> {
    let mut out: Vec<Diagnostic> = Vec::new();

    for raw in stderr.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if raw.starts_with('\t') || raw.starts_with("    ") {
            if let Some(prev) = out.last_mut().filter(|d| d.position.is_some()) {
                prev.notes.push(line.trim().to_string());
                continue;
            }
        }

        if line.starts_with("# ") {
            out.push(Diagnostic {
                message: line.to_string(),
                category: Category::Header,
                position: None,
                notes: Vec::new(),
            });
            continue;
        }

        if let Some(caps) = LOCATED.captures(line) {
            let message = caps["msg"].to_string();
            let position = Position {
                line: caps["line"].parse().unwrap_or(0),
                column: caps.name("col").and_then(|c| c.as_str().parse().ok()),
            };
            out.push(Diagnostic {
                category: categorize(&message),
                message,
                position: Some(position),
                notes: Vec::new(),
            });
            continue;
        }

        out.push(Diagnostic::unstructured(line));
    }

    out
}

/// The diagnostic to show the user: the first positioned error, else the
/// first unrecognized line.
#[must_use]
pub fn primary(diagnostics: &[Diagnostic]) -> Option<&Diagnostic> {
    diagnostics
        .iter()
        .find(|d| d.position.is_some())
        .or_else(|| diagnostics.iter().find(|d| d.category.is_error()))
}
