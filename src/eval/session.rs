//! Evaluation session: drives one fragment from input to committed state.
//!
//! Each call synthesizes a program from the committed history plus the new
//! fragment, builds and runs it, and on a build failure either adds missing
//! imports or applies quick fixes before trying again. The session state is
//! touched only once a candidate has built and run cleanly.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::SessionConfig;
use crate::error::{EvalError, ToolchainError};

use super::classify::{self, InputKind, ReplCommand};
use super::diagnostic::{self, Category, Diagnostic};
use super::fragment::{Fragment, FragmentKind};
use super::imports::{self, Resolution};
use super::printer;
use super::quickfix;
use super::runner::{BuildRequest, GoToolchain, RunOutput, Stage, Toolchain};
use super::state::{AuxiliaryFile, AuxiliaryModule, Snapshot, SessionState};
use super::synth;

static PACKAGE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^package\s+\w+").expect("valid regex"));

/// An interactive Go evaluation session.
pub struct Session {
    config: SessionConfig,
    toolchain: Box<dyn Toolchain>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session that builds with the `go` binary named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session workspace cannot be created.
    pub fn new(config: SessionConfig) -> std::io::Result<Self> {
        let toolchain = GoToolchain::new(config.toolchain.clone(), config.build_flags.clone());
        Self::with_toolchain(config, Box::new(toolchain))
    }

    /// Create a session with a custom toolchain.
    ///
    /// # Errors
    ///
    /// Returns an error if the session workspace cannot be created.
    pub fn with_toolchain(
        config: SessionConfig,
        toolchain: Box<dyn Toolchain>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            config,
            toolchain,
            state: SessionState::new()?,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Copy of the committed history and imports.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Evaluate input, writing its output to `out`.
    ///
    /// On failure exactly one line is written to `err` and nothing to `out`.
    ///
    /// # Errors
    ///
    /// Returns the failure that was reported on `err`.
    pub fn eval(
        &mut self,
        input: &str,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> Result<(), EvalError> {
        match self.evaluate(input) {
            Ok(output) => {
                out.write_all(output.as_bytes())?;
                out.flush()?;
                Ok(())
            }
            Err(e) => {
                let _ = writeln!(err, "{e}");
                Err(e)
            }
        }
    }

    /// Evaluate input, returning the output it produced.
    ///
    /// Meta-commands (`:import`, `:include`, ...) are dispatched here too.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not compile after import
    /// resolution and quick fixes, fails at run time, or the toolchain
    /// cannot be run. The session state is unchanged in every error case.
    pub fn evaluate(&mut self, input: &str) -> Result<String, EvalError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        match classify::classify(trimmed) {
            InputKind::Command(cmd) => self.handle_command(cmd),
            InputKind::Fragment(kind) => {
                if kind == FragmentKind::Import {
                    if let Some(alias) = classify::import_aliases(trimmed).first() {
                        return Err(EvalError::Command(format!(
                            "import alias '{alias}' is not supported; import the path and use its package name"
                        )));
                    }
                }
                if kind == FragmentKind::Statement && classify::defers_in_main(trimmed) {
                    return Err(EvalError::Command(
                        "defer outside a function would run after every later evaluation; \
                         wrap it in a function literal"
                            .to_string(),
                    ));
                }
                let id = self.state.next_fragment_id();
                self.run_candidate(Fragment::with_kind(id, trimmed, kind))
            }
        }
    }

    /// Add import paths, each validated by building the program with it.
    ///
    /// Paths already imported are skipped. Either every new path is added
    /// or none is.
    ///
    /// # Errors
    ///
    /// Returns the first build diagnostic if any path cannot be imported.
    pub fn import_packages(&mut self, paths: &[String]) -> Result<(), EvalError> {
        let pending: BTreeSet<String> = paths
            .iter()
            .filter(|p| !self.state.imports().contains(p.as_str()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let program = synth::synthesize(&self.state, None, &pending);
        let aux = self.auxiliary_files(None);
        let output = self.run(&program.source, &aux)?;
        check_success(&output)?;

        for path in &pending {
            tracing::debug!(path = %path, "import added");
            self.state.add_import(path);
        }
        Ok(())
    }

    /// Load a Go file, or every Go file in a directory, into the session.
    ///
    /// The files are compiled into the session program with their package
    /// clause rewritten to `package main`, so their declarations can be used
    /// from later fragments. They are not part of the fragment history.
    /// Loading the same path again replaces the earlier copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be read, contains no Go files, or
    /// the program does not build with the module included.
    pub fn include_auxiliary_module(&mut self, path: &Path) -> Result<(), EvalError> {
        let key = path
            .canonicalize()
            .map_err(|e| EvalError::Command(format!("cannot read '{}': {e}", path.display())))?;
        let prefix = format!("goeval_aux{}_", self.state.next_fragment_id());
        let files = load_module(&key, &prefix)?;
        if files.is_empty() {
            return Err(EvalError::Command(format!(
                "no Go files in '{}'",
                path.display()
            )));
        }
        let module = AuxiliaryModule { path: key, files };

        let program = synth::synthesize(&self.state, None, &BTreeSet::new());
        let mut aux = self.auxiliary_files(Some(&module.path));
        aux.extend(module.files.iter().cloned());
        let output = self.run(&program.source, &aux)?;
        check_success(&output)?;

        tracing::debug!(
            module = %module.path.display(),
            files = module.files.len(),
            "auxiliary module registered"
        );
        self.state.register_auxiliary(module);
        Ok(())
    }

    /// The program as it stands, without any candidate.
    #[must_use]
    pub fn program_source(&self) -> String {
        synth::synthesize(&self.state, None, &BTreeSet::new()).source
    }

    /// Reset all accumulated state and start over in a fresh workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the new workspace cannot be created.
    pub fn clear(&mut self) -> Result<(), EvalError> {
        let fresh = SessionState::new()?;
        let mut old = std::mem::replace(&mut self.state, fresh);
        old.clear();
        Ok(())
    }

    fn handle_command(&mut self, cmd: ReplCommand) -> Result<String, EvalError> {
        match cmd {
            ReplCommand::Help => Ok(help_text().to_string()),
            ReplCommand::Quit => Ok(String::new()),
            ReplCommand::Clear => {
                self.clear()?;
                Ok("Session cleared.\n".to_string())
            }
            ReplCommand::Import(paths) => {
                if paths.is_empty() {
                    return Err(EvalError::Command("Usage: :import <path>...".to_string()));
                }
                self.import_packages(&paths)?;
                Ok(String::new())
            }
            ReplCommand::Include(path) => {
                if path.is_empty() {
                    return Err(EvalError::Command("Usage: :include <file-or-dir>".to_string()));
                }
                self.include_auxiliary_module(Path::new(&path))?;
                Ok(String::new())
            }
            ReplCommand::Print => Ok(self.program_source()),
            ReplCommand::Write(path) => {
                if path.is_empty() {
                    return Err(EvalError::Command("Usage: :write <file>".to_string()));
                }
                std::fs::write(&path, self.program_source())
                    .map_err(|e| EvalError::Command(format!("cannot write '{path}': {e}")))?;
                Ok(format!("Wrote {path}\n"))
            }
            ReplCommand::Unknown(name) => Err(EvalError::Command(format!(
                "Unknown command: :{name}. Type :help for help."
            ))),
        }
    }

    /// Build and run `fragment`, fixing it up until it succeeds or no
    /// further fix applies, and commit it on success.
    fn run_candidate(&mut self, fragment: Fragment) -> Result<String, EvalError> {
        let auto_import = self.config.auto_import;
        let aux = self.auxiliary_files(None);
        let mut candidate = fragment;
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut import_rounds = 0;
        let mut fix_rounds = 0;

        loop {
            let program = synth::synthesize(&self.state, Some(&candidate), &pending);
            tracing::debug!(
                id = candidate.id(),
                kind = %candidate.kind(),
                import_rounds,
                fix_rounds,
                "compiling candidate"
            );
            let output = self.run(&program.source, &aux)?;

            match output.stage {
                Stage::Execute if output.success() => {
                    let text = printer::candidate_output(&output.stdout).to_string();
                    for path in &pending {
                        self.state.add_import(path);
                    }
                    self.state.commit(candidate);
                    return Ok(text);
                }
                Stage::Execute => return Err(runtime_error(&output)),
                Stage::Build => {}
            }

            let diagnostics = diagnostic::parse(&output.stderr);

            let mut added = false;
            let mut suggestion = None;
            for diag in &diagnostics {
                match imports::resolve(diag, auto_import, self.state.imports(), &mut pending) {
                    Resolution::Added(_) => added = true,
                    Resolution::Suggest { ident, path } => {
                        suggestion.get_or_insert((ident, path));
                    }
                    Resolution::Unknown => {}
                }
            }
            if added && import_rounds < self.config.max_import_rounds {
                import_rounds += 1;
                continue;
            }
            if let Some((ident, path)) = suggestion {
                return Err(EvalError::Unresolved {
                    ident,
                    suggestion: Some(path),
                });
            }

            if fix_rounds < self.config.max_quickfix_rounds {
                if let Some(fixed) = quickfix::apply(&candidate, &diagnostics, &program) {
                    fix_rounds += 1;
                    candidate = fixed;
                    continue;
                }
            }

            return Err(build_failure(&diagnostics, &output, fix_rounds > 0));
        }
    }

    /// Files of every registered module, except the one loaded from `skip`.
    fn auxiliary_files(&self, skip: Option<&Path>) -> Vec<AuxiliaryFile> {
        self.state
            .auxiliary_modules()
            .filter(|m| Some(m.path.as_path()) != skip)
            .flat_map(|m| m.files.iter().cloned())
            .collect()
    }

    fn run(&self, program: &str, auxiliary: &[AuxiliaryFile]) -> Result<RunOutput, EvalError> {
        let workspace = self.state.workspace().ok_or_else(|| {
            ToolchainError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "session workspace was removed",
            ))
        })?;
        let output = self.toolchain.run(&BuildRequest {
            program,
            auxiliary,
            workspace,
            timeout: self.config.timeout,
        })?;
        Ok(output)
    }
}

/// Turn a failed build or run into the error reported to the user.
fn check_success(output: &RunOutput) -> Result<(), EvalError> {
    match output.stage {
        Stage::Execute if output.success() => Ok(()),
        Stage::Execute => Err(runtime_error(output)),
        Stage::Build => Err(build_failure(
            &diagnostic::parse(&output.stderr),
            output,
            false,
        )),
    }
}

fn build_failure(diagnostics: &[Diagnostic], output: &RunOutput, fixed: bool) -> EvalError {
    for line in hidden_output(diagnostics) {
        tracing::debug!(line = %line, "build output not reported");
    }
    let Some(primary) = diagnostic::primary(diagnostics).cloned() else {
        let status = output
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        return EvalError::Compile(Diagnostic::unstructured(&format!(
            "build failed (exit status {status})"
        )));
    };
    match primary.category {
        Category::Undefined { ident } => EvalError::Unresolved {
            ident,
            suggestion: None,
        },
        _ if fixed => EvalError::QuickFixExhausted(primary),
        _ => EvalError::Compile(primary),
    }
}

/// Unpositioned build output that a positioned diagnostic takes precedence
/// over when the error is reported.
fn hidden_output(diagnostics: &[Diagnostic]) -> impl Iterator<Item = &Diagnostic> {
    let positioned = diagnostics.iter().any(|d| d.position.is_some());
    diagnostics
        .iter()
        .filter(move |d| positioned && d.position.is_none() && d.category.is_error())
}

fn runtime_error(output: &RunOutput) -> EvalError {
    let trace = output.stderr.trim_end().to_string();
    let message = trace
        .lines()
        .find(|l| !l.trim().is_empty())
        .map_or_else(
            || match output.exit_code {
                Some(code) => format!("exit status {code}"),
                None => "program terminated by signal".to_string(),
            },
            str::to_string,
        );
    EvalError::Runtime { message, trace }
}

/// Read the Go files of an auxiliary module, rewriting their package clause.
fn load_module(path: &Path, prefix: &str) -> Result<Vec<AuxiliaryFile>, EvalError> {
    let read_err = |p: &Path, e: std::io::Error| {
        EvalError::Command(format!("cannot read '{}': {e}", p.display()))
    };

    let mut sources = Vec::new();
    if path.is_dir() {
        for entry in std::fs::read_dir(path).map_err(|e| read_err(path, e))? {
            let file = entry.map_err(|e| read_err(path, e))?.path();
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.ends_with(".go") && !name.ends_with("_test.go") {
                sources.push(file);
            }
        }
        sources.sort();
    } else {
        sources.push(path.to_path_buf());
    }

    let mut files = Vec::with_capacity(sources.len());
    for file in sources {
        let source = std::fs::read_to_string(&file).map_err(|e| read_err(&file, e))?;
        if !PACKAGE_CLAUSE.is_match(&source) {
            return Err(EvalError::Command(format!(
                "'{}' has no package clause",
                file.display()
            )));
        }
        let source = PACKAGE_CLAUSE.replace(&source, "package main").into_owned();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(AuxiliaryFile {
            name: format!("{prefix}{name}"),
            source,
        });
    }
    Ok(files)
}

fn help_text() -> &'static str {
    "\
Commands:
  :help, :h             Show this help message
  :quit, :q             Exit the session
  :clear                Reset session (forget all fragments and imports)
  :import <path>...     Add packages to the import set
  :include <path>       Compile a Go file or directory into the session
  :print, :p            Show the program built so far
  :write, :w <file>     Save the program built so far

Input types:
  func, type, ...       Declarations are remembered across evaluations
  a := ...              Statements and their bindings persist in the session
  <expression>          Bare expressions are evaluated and printed
"
}
