//! Session configuration (`goeval.toml`).
//!
//! Configuration is an explicit value handed to [`crate::Session::new`];
//! nothing here is process-global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default per-phase timeout for building and running a candidate program.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on quick-fix rewrite rounds per evaluation.
pub const DEFAULT_MAX_QUICKFIX_ROUNDS: usize = 2;

/// Default cap on auto-import retries per evaluation.
pub const DEFAULT_MAX_IMPORT_ROUNDS: usize = 4;

/// Immutable settings for one evaluation session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Add missing standard-library imports automatically.
    pub auto_import: bool,
    /// Path (or name on `PATH`) of the `go` binary.
    pub toolchain: PathBuf,
    /// Timeout applied separately to the build and the run phase.
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Maximum quick-fix rewrite rounds for a single evaluation.
    pub max_quickfix_rounds: usize,
    /// Maximum auto-import retries for a single evaluation.
    pub max_import_rounds: usize,
    /// Extra flags passed to `go build`.
    pub build_flags: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_import: false,
            toolchain: PathBuf::from("go"),
            timeout: DEFAULT_TIMEOUT,
            max_quickfix_rounds: DEFAULT_MAX_QUICKFIX_ROUNDS,
            max_import_rounds: DEFAULT_MAX_IMPORT_ROUNDS,
            build_flags: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML deserialization error.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    #[must_use]
    pub fn with_auto_import(mut self, enabled: bool) -> Self {
        self.auto_import = enabled;
        self
    }

    #[must_use]
    pub fn with_toolchain(mut self, toolchain: impl Into<PathBuf>) -> Self {
        self.toolchain = toolchain.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
