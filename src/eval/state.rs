//! Session state: committed fragments, imports and the build workspace.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::fragment::{Fragment, FragmentKind};

/// An auxiliary Go file compiled alongside the session program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryFile {
    /// File name inside the workspace.
    pub name: String,
    /// Source with its package clause rewritten to `package main`.
    pub source: String,
}

/// An auxiliary module loaded with `:include`, keyed by the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryModule {
    pub path: PathBuf,
    pub files: Vec<AuxiliaryFile>,
}

/// Comparable copy of everything a commit can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fragments: Vec<Fragment>,
    pub imports: BTreeSet<String>,
    pub auxiliary: Vec<PathBuf>,
}

/// Persistent state for an evaluation session.
///
/// Only [`SessionState::commit`], [`SessionState::add_import`] and
/// [`SessionState::register_auxiliary`] mutate it, and the session calls
/// them only after a candidate program built and ran successfully.
#[derive(Debug)]
pub struct SessionState {
    fragments: Vec<Fragment>,
    imports: BTreeSet<String>,
    auxiliary: BTreeMap<PathBuf, AuxiliaryModule>,
    next_id: u64,
    workspace: Option<TempDir>,
}

impl SessionState {
    /// Create an empty state with a fresh workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let workspace = tempfile::Builder::new().prefix("goeval_").tempdir()?;
        tracing::debug!(workspace = %workspace.path().display(), "session workspace created");
        Ok(Self {
            fragments: Vec::new(),
            imports: BTreeSet::new(),
            auxiliary: BTreeMap::new(),
            next_id: 0,
            workspace: Some(workspace),
        })
    }

    /// The workspace directory, or `None` after [`SessionState::clear`].
    #[must_use]
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }

    /// Hand out the next fragment id.
    pub fn next_fragment_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Committed fragments in evaluation order.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Active import paths, sorted.
    #[must_use]
    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }

    /// Loaded auxiliary modules, sorted by path.
    pub fn auxiliary_modules(&self) -> impl Iterator<Item = &AuxiliaryModule> {
        self.auxiliary.values()
    }

    /// Record a fragment whose program built and ran.
    pub fn commit(&mut self, fragment: Fragment) {
        tracing::debug!(id = fragment.id(), kind = %fragment.kind(), "fragment committed");
        if fragment.kind() == FragmentKind::Import {
            for path in fragment.import_paths() {
                self.add_import(&path);
            }
        }
        self.fragments.push(fragment);
    }

    /// Add an import path. Returns `false` if it was already present.
    pub fn add_import(&mut self, path: &str) -> bool {
        self.imports.insert(path.to_string())
    }

    /// Register an auxiliary module, replacing one loaded from the same path.
    pub fn register_auxiliary(&mut self, module: AuxiliaryModule) {
        self.auxiliary.insert(module.path.clone(), module);
    }

    /// Drop all history and delete the workspace.
    ///
    /// The state is unusable for building afterwards; dropping it has the
    /// same effect.
    pub fn clear(&mut self) {
        self.fragments.clear();
        self.imports.clear();
        self.auxiliary.clear();
        if let Some(dir) = self.workspace.take() {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                tracing::warn!(workspace = %path, "cannot remove workspace: {e}");
            }
        }
    }

    /// Copy of the mutable parts, for atomicity checks.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            fragments: self.fragments.clone(),
            imports: self.imports.clone(),
            auxiliary: self.auxiliary.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let mut state = SessionState::new().unwrap();
        assert_eq!(state.next_fragment_id(), 0);
        assert_eq!(state.next_fragment_id(), 1);
    }

    #[test]
    fn import_is_idempotent() {
        let mut state = SessionState::new().unwrap();
        assert!(state.add_import("encoding/json"));
        assert!(!state.add_import("encoding/json"));
        assert_eq!(state.imports().len(), 1);
    }

    #[test]
    fn commit_appends_in_order() {
        let mut state = SessionState::new().unwrap();
        state.commit(Fragment::new(0, "a := 1"));
        state.commit(Fragment::new(1, "b := a"));
        let ids: Vec<u64> = state.fragments().iter().map(Fragment::id).collect();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn committing_import_fragment_extends_imports() {
        let mut state = SessionState::new().unwrap();
        state.commit(Fragment::new(0, "import (\n\"os\"\n\"strings\"\n)"));
        assert!(state.imports().contains("os"));
        assert!(state.imports().contains("strings"));
    }

    #[test]
    fn clear_removes_workspace() {
        let mut state = SessionState::new().unwrap();
        let dir = state.workspace().unwrap().to_path_buf();
        assert!(dir.exists());
        state.commit(Fragment::new(0, "a := 1"));
        state.clear();
        assert!(!dir.exists());
        assert!(state.fragments().is_empty());
        assert!(state.workspace().is_none());
    }

    #[test]
    fn drop_removes_workspace() {
        let state = SessionState::new().unwrap();
        let dir = state.workspace().unwrap().to_path_buf();
        drop(state);
        assert!(!dir.exists());
    }
}
