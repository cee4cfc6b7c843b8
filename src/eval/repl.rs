//! Main loop — interactive read-eval-print for Go.

use std::io::Write;

use super::classify::{self, InputKind, ReplCommand};
use super::session::Session;
use crate::config::SessionConfig;
use crate::error::EvalError;

/// Run the interactive session.
///
/// # Errors
///
/// Returns an error if the session cannot be created or readline fails
/// fatally. Evaluation errors are printed and the loop continues.
pub fn run_interactive(config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = rustyline::DefaultEditor::new()?;
    let mut session = Session::new(config)?;

    println!("goeval v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for help, :quit to exit.\n");

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();

    loop {
        let line = match rl.readline("go> ") {
            Ok(line) => line,
            Err(
                rustyline::error::ReadlineError::Interrupted | rustyline::error::ReadlineError::Eof,
            ) => {
                println!();
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let mut input = line;

        // Multi-line: keep reading if delimiters are unclosed.
        while classify::has_unclosed_delimiters(&input) {
            match rl.readline("... ") {
                Ok(cont) => {
                    input.push('\n');
                    input.push_str(&cont);
                }
                Err(_) => break,
            }
        }

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(&input);

        if let InputKind::Command(ReplCommand::Quit) = classify::classify(trimmed) {
            break;
        }

        // The error line has already been written to stderr.
        let _ = session.eval(trimmed, &mut stdout.lock(), &mut stderr.lock());
    }

    Ok(())
}

/// Evaluate a single input non-interactively.
///
/// # Errors
///
/// Returns the evaluation error, if any.
pub fn eval_one(config: SessionConfig, input: &str) -> Result<String, EvalError> {
    let mut session = Session::new(config)?;
    session.evaluate(input)
}

/// Evaluate a file fragment by fragment, printing output as it is produced.
///
/// A fragment ends at a line where every delimiter is closed. Blank lines
/// and `//` comments between fragments are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a fragment fails.
pub fn eval_file(config: SessionConfig, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("cannot read '{path}': {e}"))?;
    let mut session = Session::new(config)?;
    let mut out = std::io::stdout().lock();
    let mut err = std::io::stderr().lock();

    for fragment in split_fragments(&source) {
        if session.eval(&fragment, &mut out, &mut err).is_err() {
            return Err(format!("error in file {path}").into());
        }
    }
    out.flush()?;
    Ok(())
}

/// Split a file into fragments the way the interactive loop would read them.
fn split_fragments(source: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut buffer = String::new();

    for line in source.lines() {
        let trimmed = line.trim();
        if (trimmed.is_empty() || trimmed.starts_with("//")) && buffer.is_empty() {
            continue;
        }

        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);

        // Keep accumulating if delimiters are unclosed.
        if classify::has_unclosed_delimiters(&buffer) {
            continue;
        }

        let input = buffer.trim();
        if !input.is_empty() {
            fragments.push(input.to_string());
        }
        buffer.clear();
    }

    let rest = buffer.trim();
    if !rest.is_empty() {
        fragments.push(rest.to_string());
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_follow_delimiters() {
        let src = "\
// leading comment
import \"strings\"

func add(a, b int) int {
    return a + b
}

add(1, 2)
x := []int{
    1,
    2,
}
";
        assert_eq!(
            split_fragments(src),
            [
                "import \"strings\"",
                "func add(a, b int) int {\n    return a + b\n}",
                "add(1, 2)",
                "x := []int{\n    1,\n    2,\n}",
            ]
        );
    }

    #[test]
    fn unterminated_tail_is_kept() {
        assert_eq!(split_fragments("f(\n1"), ["f(\n1"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = eval_file(SessionConfig::default(), "/nonexistent/goeval/input.go").unwrap_err();
        assert!(err.to_string().starts_with("cannot read"));
    }
}
