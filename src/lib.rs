//! goeval — an interactive evaluation session for Go.
//!
//! Re-exports the session and its supporting types for integration testing
//! and embedding.

pub mod config;
pub mod error;
pub mod eval;

pub use config::SessionConfig;
pub use error::{ConfigError, EvalError, ToolchainError};
pub use eval::diagnostic::{Category, Diagnostic};
pub use eval::fragment::{Fragment, FragmentKind};
pub use eval::runner::{GoToolchain, Toolchain};
pub use eval::Session;
