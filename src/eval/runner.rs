//! Build and execute candidate programs with the `go` toolchain.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::ToolchainError;

use super::state::AuxiliaryFile;

/// Which phase produced a [`RunOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `go build`; a failure here carries compiler diagnostics.
    Build,
    /// The built binary; a failure here is a runtime panic or exit.
    Execute,
}

/// Captured result of a build or run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stage: Stage,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl RunOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Everything the toolchain needs to build one program.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Contents of `main.go`.
    pub program: &'a str,
    /// Auxiliary files compiled into the same package.
    pub auxiliary: &'a [AuxiliaryFile],
    /// Session workspace; the toolchain may write anything here.
    pub workspace: &'a Path,
    /// Per-phase timeout.
    pub timeout: Duration,
}

/// Something that can build and run a Go program.
pub trait Toolchain {
    /// Build the program and, if that succeeds, run it.
    ///
    /// A failed build is `Ok` with [`Stage::Build`] and a non-zero exit;
    /// only launching or supervising the toolchain itself is an `Err`.
    ///
    /// # Errors
    ///
    /// [`ToolchainError::Spawn`] if a process cannot be started,
    /// [`ToolchainError::Timeout`] if a phase exceeds the timeout, and
    /// [`ToolchainError::Io`] if the workspace cannot be written.
    fn run(&self, request: &BuildRequest<'_>) -> Result<RunOutput, ToolchainError>;
}

/// The `go` command line toolchain.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: PathBuf,
    build_flags: Vec<String>,
}

impl GoToolchain {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, build_flags: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            build_flags,
        }
    }

    /// Whether the binary can be started at all.
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
}

const MAIN_FILE: &str = "main.go";

impl Toolchain for GoToolchain {
    fn run(&self, request: &BuildRequest<'_>) -> Result<RunOutput, ToolchainError> {
        let dir = request.workspace;

        // Stale auxiliary files from an earlier attempt must not be compiled.
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "go") {
                std::fs::remove_file(&path)?;
            }
        }
        std::fs::write(dir.join(MAIN_FILE), request.program)?;
        let mut files = vec![MAIN_FILE.to_string()];
        for aux in request.auxiliary {
            std::fs::write(dir.join(&aux.name), &aux.source)?;
            files.push(aux.name.clone());
        }

        let bin_name = if cfg!(target_os = "windows") {
            "goeval_bin.exe"
        } else {
            "goeval_bin"
        };
        let bin_path = dir.join(bin_name);

        let mut build = Command::new(&self.binary);
        build
            .current_dir(dir)
            .arg("build")
            .args(&self.build_flags)
            .arg("-o")
            .arg(&bin_path)
            .args(&files);
        let built = run_with_timeout(&mut build, &self.binary, request.timeout, "build")?;
        if !built.success() {
            return Ok(RunOutput {
                stage: Stage::Build,
                ..built
            });
        }

        let mut exec = Command::new(&bin_path);
        exec.current_dir(dir);
        let ran = run_with_timeout(&mut exec, &bin_path, request.timeout, "execution")?;
        Ok(RunOutput {
            stage: Stage::Execute,
            ..ran
        })
    }
}

/// Run a command with captured output, killing it after `timeout`.
///
/// Both pipes are drained on helper threads while the child runs, so a
/// program that writes more than a pipe buffer does not stall.
fn run_with_timeout(
    command: &mut Command,
    binary: &Path,
    timeout: Duration,
    phase: &'static str,
) -> Result<RunOutput, ToolchainError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolchainError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    // Wait with timeout.
    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > timeout {
            kill(&mut child);
            tracing::warn!(phase, "timed out after {}s", timeout.as_secs_f64());
            return Err(ToolchainError::Timeout { phase, timeout });
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    Ok(RunOutput {
        stage: Stage::Build,
        stdout: collect(stdout),
        stderr: collect(stderr),
        exit_code: status.code(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
