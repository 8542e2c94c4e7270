//! CommandSequencer: builds the fixed terraform lifecycle and runs it in order
//!
//! Steps run one after another against a shared `EnvironmentContext`. The
//! first failed step aborts the sequence; nothing is retried or rolled back,
//! since terraform may already have modified remote state.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use super::runner::CommandRunner;
use super::step::{CommandStep, FileWrite, Step, StepOutcome};
use crate::core::config::{ExecutionConfig, InitOptions};
use crate::core::environment::EnvironmentContext;
use crate::core::error::PluginError;

/// Terraform binary invoked by every lifecycle step
pub const TERRAFORM: &str = "terraform";

/// Location the CA blob is written to before refreshing the trust store
pub const CA_CERT_PATH: &str = "/usr/local/share/ca-certificates/ca_cert.crt";

const CA_CERT_MODE: u32 = 0o644;

/// Arguments for `terraform init`
///
/// Lock and lock-timeout flags are only emitted when configured so terraform
/// keeps its own defaults. `-input=false` is always present so init fails
/// instead of waiting on a prompt.
pub fn init_args(options: &InitOptions) -> Vec<String> {
    let mut args = vec!["init".to_string()];

    for entry in &options.backend_config {
        args.push(format!("-backend-config={}", entry));
    }

    if let Some(lock) = options.lock {
        args.push(format!("-lock={}", lock));
    }

    if let Some(timeout) = options.lock_timeout() {
        args.push(format!("-lock-timeout={}", timeout));
    }

    args.push("-input=false".to_string());
    args
}

/// Steps that add `ca_cert` to the system trust store
pub fn ca_cert_steps(ca_cert: &str) -> Vec<Step> {
    vec![
        Step::WriteFile(FileWrite {
            path: PathBuf::from(CA_CERT_PATH),
            contents: ca_cert.as_bytes().to_vec(),
            mode: CA_CERT_MODE,
        }),
        CommandStep::new("update-ca-certificates").into(),
    ]
}

/// The canonical lifecycle: version, CA install, cache reset, init, get
pub fn lifecycle_steps(config: &ExecutionConfig) -> Vec<Step> {
    let mut steps: Vec<Step> = vec![CommandStep::new(TERRAFORM).arg("version").into()];

    if let Some(ca_cert) = &config.ca_cert {
        steps.extend(ca_cert_steps(ca_cert));
    }

    steps.push(Step::RemoveDir(config.data_dir()));
    steps.push(
        CommandStep::new(TERRAFORM)
            .args(init_args(&config.init_options))
            .into(),
    );
    steps.push(CommandStep::new(TERRAFORM).arg("get").into());

    steps
}

/// Executes steps strictly in order, stopping at the first failure
pub struct CommandSequencer {
    runner: Arc<dyn CommandRunner>,
    sensitive: bool,
}

impl CommandSequencer {
    /// Create a sequencer; `sensitive` suppresses the command echo
    pub fn new(runner: Arc<dyn CommandRunner>, sensitive: bool) -> Self {
        Self { runner, sensitive }
    }

    /// Line echoed before `step` runs, if any
    pub fn trace_line(&self, step: &Step) -> Option<String> {
        if self.sensitive || !step.is_traced() {
            return None;
        }
        Some(format!("$ {}", step.describe()))
    }

    /// Run every step; returns the number of completed steps
    pub async fn execute(
        &self,
        steps: &[Step],
        ctx: &EnvironmentContext,
    ) -> Result<usize, PluginError> {
        for (index, step) in steps.iter().enumerate() {
            if let Some(line) = self.trace_line(step) {
                println!("{}", line);
            }

            match self.runner.run(step, ctx).await {
                StepOutcome::Completed => {
                    debug!(step = index + 1, total = steps.len(), "command completed successfully");
                }
                StepOutcome::Failed(reason) => {
                    // The echo may be suppressed, so name the step by program only.
                    let step_name = self.step_name(step);
                    error!(step = %step_name, %reason, "failed to execute a command");
                    return Err(PluginError::StepFailed {
                        step: step_name,
                        reason,
                    });
                }
            }
        }

        Ok(steps.len())
    }

    fn step_name(&self, step: &Step) -> String {
        match step {
            Step::Program(cmd) if self.sensitive => cmd.program.clone(),
            _ => step.describe(),
        }
    }
}
