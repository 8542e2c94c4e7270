//! Run configuration
//!
//! `ExecutionConfig` is built once by the binary from flags and environment
//! variables and is read-only for the rest of the run.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Default prefix for exported variable names
pub const DEFAULT_ENV_PREFIX: &str = "TF_OUTPUT_";

/// Default env-file name
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Data directory terraform uses when `TF_DATA_DIR` is unset
pub const DEFAULT_DATA_DIR: &str = ".terraform";

/// Options for the `terraform init` command
///
/// Mirrors the JSON document accepted through `PLUGIN_INIT_OPTIONS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitOptions {
    /// Entries passed as `-backend-config=<entry>`, usually `key=value`
    #[serde(rename = "backend-config", default)]
    pub backend_config: Vec<String>,

    /// Terraform defaults to locking when unset
    #[serde(default)]
    pub lock: Option<bool>,

    /// Terraform defaults to `0s` when unset
    #[serde(rename = "lock-timeout", default)]
    pub lock_timeout: Option<String>,
}

impl InitOptions {
    /// Parse the init options document
    ///
    /// A malformed document is not fatal: it is logged and the defaults are
    /// used, so terraform falls back to its own init behaviour.
    pub fn from_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<InitOptions>(raw) {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "ignoring malformed init options");
                Self::default()
            }
        }
    }

    /// Lock timeout, with an empty string counted as unset
    pub fn lock_timeout(&self) -> Option<&str> {
        self.lock_timeout.as_deref().filter(|t| !t.is_empty())
    }
}

/// Credentials written to `~/.netrc` for private module sources
#[derive(Debug)]
pub struct NetrcCredentials {
    pub machine: String,
    pub login: String,
    pub password: SecretString,
}

/// Configuration for one run of the plugin
#[derive(Debug)]
pub struct ExecutionConfig {
    /// Subdirectory of the current directory holding the terraform files
    pub root_dir: Option<PathBuf>,

    /// Suppress the `$ command` echo before each step
    pub sensitive: bool,

    /// Override for terraform's per-directory data directory
    pub data_dir: Option<PathBuf>,

    /// Role to assume before any terraform command runs
    pub role_arn: Option<String>,

    /// Path of the env-file to write
    pub env_file: PathBuf,

    /// Prefix prepended to every output name
    pub env_prefix: String,

    /// Prefix every line with `export `
    pub export_envs: bool,

    pub init_options: InitOptions,

    /// PEM blob added to the system trust store
    pub ca_cert: Option<String>,

    /// Terraform version to install before running
    pub tool_version: Option<String>,

    pub netrc: Option<NetrcCredentials>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            sensitive: false,
            data_dir: None,
            role_arn: None,
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            export_envs: false,
            init_options: InitOptions::default(),
            ca_cert: None,
            tool_version: None,
            netrc: None,
        }
    }
}

impl ExecutionConfig {
    /// Data directory removed before `terraform init`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}

/// Treat an empty or whitespace-only setting as unset
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
