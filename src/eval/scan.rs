//! A small Go token scanner.
//!
//! Only as much lexing as the session needs: identifiers, literals,
//! operators and bracket depth, with byte offsets back into the source.
//! Comments are dropped. Unterminated literals run to end of line, raw
//! strings and block comments to end of input.

use logos::{Lexer, Logos};

/// Coarse token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Rune,
    Punct,
    Open,
    Close,
    Newline,
}

/// One token with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    /// Bracket depth *before* this token.
    pub depth: usize,
}

impl Token<'_> {
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    #[must_use]
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    #[must_use]
    pub fn is_punct(&self, text: &str) -> bool {
        self.is(TokenKind::Punct, text)
    }

    /// Statement separator at the current level: `;` or a newline.
    #[must_use]
    pub fn is_separator(&self) -> bool {
        self.kind == TokenKind::Newline || self.is_punct(";")
    }
}

/// Go assignment operators, including `:=`.
pub const ASSIGN_OPS: &[&str] = &[
    ":=", "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=",
];

// ---------------------------------------------------------------------------
// Literal and comment callbacks
// ---------------------------------------------------------------------------

/// Consume the rest of a `"` or `'` literal. Literals cannot span lines, so
/// an unterminated one stops at the newline.
fn close_quoted(lex: &mut Lexer<'_, Lexeme>, quote: u8) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            c if c == quote => {
                lex.bump(i + 1);
                return true;
            }
            _ => i += 1,
        }
    }
    lex.bump(i.min(bytes.len()));
    lex.extras = true;
    true
}

fn interpreted_string(lex: &mut Lexer<'_, Lexeme>) -> bool {
    close_quoted(lex, b'"')
}

fn rune_literal(lex: &mut Lexer<'_, Lexeme>) -> bool {
    close_quoted(lex, b'\'')
}

fn raw_string(lex: &mut Lexer<'_, Lexeme>) -> bool {
    match lex.remainder().find('`') {
        Some(end) => lex.bump(end + 1),
        None => {
            lex.bump(lex.remainder().len());
            lex.extras = true;
        }
    }
    true
}

fn line_comment(_lex: &mut Lexer<'_, Lexeme>) -> logos::Skip {
    logos::Skip
}

fn block_comment(lex: &mut Lexer<'_, Lexeme>) -> logos::Skip {
    match lex.remainder().find("*/") {
        Some(end) => lex.bump(end + 2),
        None => {
            lex.bump(lex.remainder().len());
            lex.extras = true;
        }
    }
    logos::Skip
}

/// Raw lexemes. `extras` records that input ended inside a literal or
/// block comment.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(extras = bool)]
enum Lexeme {
    #[token("\n")]
    Newline,

    #[regex(r"[\p{L}_][\p{L}\p{Nd}_]*")]
    Ident,

    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    #[regex(r"\.[0-9][0-9a-zA-Z_.]*")]
    Number,

    #[token("\"", interpreted_string)]
    #[token("`", raw_string)]
    Str,

    #[token("'", rune_literal)]
    Rune,

    #[token("(")]
    #[token("[")]
    #[token("{")]
    Open,

    #[token(")")]
    #[token("]")]
    #[token("}")]
    Close,

    #[token("<<=")]
    #[token(">>=")]
    #[token("&^=")]
    #[token("...")]
    #[token(":=")]
    #[token("<-")]
    #[token("++")]
    #[token("--")]
    #[token("&&")]
    #[token("||")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("<<")]
    #[token(">>")]
    #[token("&^")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("<")]
    #[token(">")]
    #[token("=")]
    #[token("!")]
    #[token(":")]
    #[token(".")]
    #[token(",")]
    #[token(";")]
    #[token("~")]
    Punct,

    #[regex(r"//[^\n]*", line_comment)]
    _LineComment,

    #[token("/*", block_comment)]
    _BlockComment,
}

/// Result of scanning a source string.
#[derive(Debug, Clone, Default)]
pub struct Scan<'a> {
    pub tokens: Vec<Token<'a>>,
    /// Bracket depth left open at end of input.
    pub open_depth: usize,
    /// Input ended inside a string, rune, raw string or block comment.
    pub unterminated: bool,
}

/// Tokenize `src`.
///
/// Bytes the lexer does not recognize become single [`TokenKind::Punct`]
/// tokens.
#[must_use]
pub fn scan(src: &str) -> Scan<'_> {
    let mut lex = Lexeme::lexer(src);
    let mut out = Scan::default();
    let mut depth = 0usize;

    while let Some(result) = lex.next() {
        let span = lex.span();
        let kind = match result {
            Ok(Lexeme::Newline) => TokenKind::Newline,
            Ok(Lexeme::Ident) => TokenKind::Ident,
            Ok(Lexeme::Number) => TokenKind::Number,
            Ok(Lexeme::Str) => TokenKind::Str,
            Ok(Lexeme::Rune) => TokenKind::Rune,
            Ok(Lexeme::Open) => TokenKind::Open,
            Ok(Lexeme::Close) => TokenKind::Close,
            Ok(Lexeme::Punct | Lexeme::_LineComment | Lexeme::_BlockComment) | Err(()) => {
                TokenKind::Punct
            }
        };

        if kind == TokenKind::Close {
            depth = depth.saturating_sub(1);
        }
        out.tokens.push(Token {
            kind,
            text: &src[span.clone()],
            start: span.start,
            depth,
        });
        if kind == TokenKind::Open {
            depth += 1;
        }
    }

    out.open_depth = depth;
    out.unterminated = lex.extras;
    out
}

/// Index of the token closing the bracket opened at `open`, if any.
#[must_use]
pub fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let depth = tokens.get(open)?.depth;
    tokens[open + 1..]
        .iter()
        .position(|t| t.kind == TokenKind::Close && t.depth == depth)
        .map(|p| open + 1 + p)
}

/// Split top-level tokens into statements at `;` and newlines.
///
/// Tokens inside brackets never split. Empty statements are dropped.
#[must_use]
pub fn statements<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let base = tokens.first().map_or(0, |t| t.depth);
    let mut out = Vec::new();
    let mut begin = 0;
    for (idx, tok) in tokens.iter().enumerate() {
        if tok.depth == base && tok.is_separator() {
            if idx > begin {
                out.push(&tokens[begin..idx]);
            }
            begin = idx + 1;
        }
    }
    if begin < tokens.len() {
        out.push(&tokens[begin..]);
    }
    out
}

/// Whether `ident` appears as a package-qualifier (`ident.`) anywhere in `src`.
#[must_use]
pub fn references_qualifier(src: &str, ident: &str) -> bool {
    let tokens = scan(src).tokens;
    tokens.windows(2).any(|pair| {
        pair[0].is(TokenKind::Ident, ident)
            && pair[1].is_punct(".")
            && !pair_preceded_by_dot(&tokens, pair[0].start)
    })
}

fn pair_preceded_by_dot(tokens: &[Token<'_>], start: usize) -> bool {
    tokens
        .iter()
        .take_while(|t| t.start < start)
        .last()
        .is_some_and(|t| t.is_punct("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<&str> {
        scan(src).tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn operators_and_idents() {
        assert_eq!(texts("a, b := f(x)"), ["a", ",", "b", ":=", "f", "(", "x", ")"]);
        assert_eq!(texts("x <<= 2"), ["x", "<<=", "2"]);
        assert_eq!(texts("ch <- v"), ["ch", "<-", "v"]);
        assert_eq!(texts("héllo @ 1.5"), ["héllo", "@", "1.5"]);
    }

    #[test]
    fn strings_and_comments() {
        assert_eq!(texts(r#"s := "a{b" // c {"#), ["s", ":=", r#""a{b""#]);
        assert_eq!(texts("`raw\n{` /* x */ y"), ["`raw\n{`", "y"]);
        assert_eq!(texts(r"'\''"), [r"'\''"]);
    }

    #[test]
    fn depth_tracking() {
        let s = scan("f(a[1], {)");
        assert_eq!(s.open_depth, 1);
        let close = s.tokens.iter().find(|t| t.text == ")").unwrap();
        assert_eq!(close.depth, 1);
        assert!(scan("f(x)").open_depth == 0);
    }

    #[test]
    fn unterminated_literals() {
        assert!(scan("x := `abc").unterminated);
        assert!(scan("/* open").unterminated);
        assert!(!scan(r#""ok""#).unterminated);
    }

    #[test]
    fn statement_split() {
        let s = scan("a := 1; if a > 0 {\n b()\n}\nc");
        let stmts = statements(&s.tokens);
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[1][0].text, "if");
        assert_eq!(stmts[2][0].text, "c");
    }

    #[test]
    fn matching_brackets() {
        let s = scan("f(g(1), 2) + 3");
        assert_eq!(matching_close(&s.tokens, 1), Some(8));
    }

    #[test]
    fn qualifier_references() {
        assert!(references_qualifier("b, err := json.Marshal(nil)", "json"));
        assert!(!references_qualifier("x.json.Foo", "json"));
        assert!(!references_qualifier(r#"s := "json.Marshal""#, "json"));
        assert!(!references_qualifier("json := 1", "json"));
    }
}
