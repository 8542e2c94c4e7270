//! Error handling for the output-to-env pipeline
//!
//! Every fatal condition of a run maps onto one `PluginError` variant. The
//! only failure that is recovered locally (an unparseable output document)
//! never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

use crate::execution::runner::CommandError;

/// Main error type for a plugin run
#[derive(Error, Debug)]
pub enum PluginError {
    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Installation errors
    #[error("failed to install terraform {version}: {message}")]
    InstallFailed { version: String, message: String },

    // Credential errors
    #[error("failed to assume role {role}: {message}")]
    CredentialExchange { role: String, message: String },

    // Step errors
    #[error("step `{step}` failed: {reason}")]
    StepFailed { step: String, reason: String },

    // Output errors
    #[error("failed to capture terraform outputs: {0}")]
    OutputCapture(#[source] CommandError),

    #[error("failed to print outputs report: {0}")]
    Report(#[source] std::io::Error),

    // Persistence errors
    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    /// Wrap an I/O failure on `path`
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidConfig(_) => vec!["Check the plugin settings passed to the step"],
            Self::InstallFailed { .. } => vec![
                "Check that the requested terraform version exists",
                "Check network access to releases.hashicorp.com",
            ],
            Self::CredentialExchange { .. } => vec![
                "Check that the role ARN is correct",
                "Check that the base credentials are allowed to assume the role",
            ],
            Self::StepFailed { .. } => vec![
                "Read the command output above",
                "Remote state may already be partially modified; inspect before re-running",
            ],
            Self::OutputCapture(_) => vec![
                "Check that `terraform init` succeeded for this directory",
                "Check the root_dir setting",
            ],
            Self::Report(_) => vec!["Check that standard output is still open"],
            Self::Persist { .. } => vec!["Check that the target directory exists and is writable"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InstallFailed { .. } => "INSTALL_FAILED",
            Self::CredentialExchange { .. } => "CREDENTIAL_EXCHANGE_FAILED",
            Self::StepFailed { .. } => "STEP_FAILED",
            Self::OutputCapture(_) => "OUTPUT_CAPTURE_FAILED",
            Self::Report(_) => "REPORT_FAILED",
            Self::Persist { .. } => "PERSIST_FAILED",
        }
    }
}
