//! Error types surfaced by the evaluation session.

use std::path::PathBuf;
use std::time::Duration;

use crate::eval::diagnostic::Diagnostic;

/// Failure to launch or supervise the external toolchain.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// The toolchain binary could not be started.
    #[error("cannot invoke {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A build or run phase exceeded the configured timeout.
    #[error("{phase} timed out after {}s", timeout.as_secs_f64())]
    Timeout { phase: &'static str, timeout: Duration },
    /// Reading or writing the session workspace failed.
    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single `eval` call failed.
///
/// The `Display` form of every variant is exactly one line; it is what the
/// session writes to the error stream.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The compiler rejected the candidate with a diagnostic no rule handles.
    #[error("{0}")]
    Compile(Diagnostic),
    /// Quick fixes were applied but the candidate still fails.
    #[error("{0}")]
    QuickFixExhausted(Diagnostic),
    /// An identifier is undefined and no import was added for it.
    #[error("undefined: {ident}{}", suggestion.as_ref().map(|p| format!(" (use :import {p})")).unwrap_or_default())]
    Unresolved {
        ident: String,
        suggestion: Option<String>,
    },
    /// The program compiled but failed while running.
    #[error("{message}")]
    Runtime { message: String, trace: String },
    /// The toolchain could not be run at all.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    /// A meta-command was malformed or unknown.
    #[error("{0}")]
    Command(String),
    /// Reading an included module, writing the program, or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// True when the failure came from the program's execution rather than
    /// from compilation or the toolchain.
    #[must_use]
    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }
}

/// Errors loading a session configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
