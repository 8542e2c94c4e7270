//! Environment shared by every step of a run
//!
//! Credentials and `TF_DATA_DIR` are recorded here instead of being written to
//! the process environment, and applied to each spawned command.

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Working directory and variables inherited by every step
pub struct EnvironmentContext {
    working_dir: PathBuf,
    vars: BTreeMap<String, SecretString>,
}

impl EnvironmentContext {
    /// Create a context rooted at `working_dir`
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            vars: BTreeMap::new(),
        }
    }

    /// Resolve the base directory from the current directory and an optional
    /// root subdirectory
    pub fn resolve<P: AsRef<Path>>(current_dir: P, root_dir: Option<&Path>) -> Self {
        let working_dir = match root_dir {
            Some(root) => current_dir.as_ref().join(root),
            None => current_dir.as_ref().to_path_buf(),
        };
        Self::new(working_dir)
    }

    /// Directory steps run in unless they name their own
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Record a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value: String = value.into();
        self.vars
            .insert(key.into(), SecretString::new(value.into_boxed_str()));
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.expose_secret())
    }

    /// Variables in key order, values exposed for handing to a child process
    pub fn exposed_vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose_secret()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for EnvironmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentContext")
            .field("working_dir", &self.working_dir)
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}
