//! Interactive evaluation for Go.
//!
//! Users type Go expressions, statements and declarations one at a time and
//! see results immediately, as if each fragment were appended to a single
//! growing program.
//!
//! # Architecture
//!
//! Each evaluation synthesizes a complete `main.go` from the committed
//! fragments plus the new input, builds and runs it with the `go` command,
//! and reports the output printed after the candidate's marker. When the
//! build fails, missing standard-library imports are added and a small set
//! of quick fixes rewrites the input so that values the compiler would
//! reject as unused are printed instead. Nothing is committed unless the
//! program builds and runs.

pub mod classify;
pub mod diagnostic;
pub mod fragment;
pub mod imports;
pub mod printer;
pub mod quickfix;
pub mod repl;
pub mod runner;
mod scan;
pub mod session;
pub mod state;
pub mod synth;

pub use repl::{eval_file, eval_one, run_interactive};
pub use session::Session;
