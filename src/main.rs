//! `goeval` — interactive evaluation for Go.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use goeval::eval::{eval_file, eval_one, run_interactive};
use goeval::SessionConfig;

/// goeval: evaluate Go expressions, statements and declarations interactively
#[derive(Debug, Parser)]
#[command(name = "goeval", version, about)]
struct Cli {
    /// Evaluate a file fragment by fragment
    #[arg(short = 'f', long = "file", value_name = "FILE", conflicts_with = "expr")]
    file: Option<String>,

    /// Evaluate this input once and exit
    #[arg(value_name = "EXPR")]
    expr: Vec<String>,

    /// Import standard-library packages automatically when referenced
    #[arg(long)]
    auto_import: bool,

    /// Path of the go binary
    #[arg(long = "go", value_name = "PATH")]
    go: Option<PathBuf>,

    /// Build and run timeout, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Load settings from a TOML file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Settings from the config file, with command-line flags on top.
    fn session_config(&self) -> Result<SessionConfig, goeval::ConfigError> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if self.auto_import {
            config = config.with_auto_import(true);
        }
        if let Some(go) = &self.go {
            config = config.with_toolchain(go);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("GOEVAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match cli.session_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "session configuration");

    if let Some(path) = &cli.file {
        if let Err(e) = eval_file(config, path) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    if cli.expr.is_empty() {
        if let Err(e) = run_interactive(config) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let input = cli.expr.join(" ");
    match eval_one(config, &input) {
        Ok(output) => {
            if !output.is_empty() {
                print!("{output}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
