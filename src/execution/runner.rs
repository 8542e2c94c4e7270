//! CommandRunner: the seam through which every step is executed
//!
//! `ProcessRunner` spawns real processes with `tokio::process::Command`.
//! Arguments are passed as a vector and never interpolated into a shell
//! string, so values from the configuration cannot inject commands.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use super::step::{CommandStep, OutputMode, Step, StepOutcome};
use crate::core::environment::EnvironmentContext;
use crate::core::fs::{remove_dir_if_exists, write_with_mode};

/// Errors that can occur while running a program
#[derive(Error, Debug)]
pub enum CommandError {
    /// Binary not found, permission denied, ...
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and reported failure
    #[error("`{command}` exited with {}", exit_description(.code))]
    NonZeroExit { command: String, code: Option<i32> },

    /// A filesystem step failed
    #[error("{operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Executes steps on behalf of the sequencer and the extractor
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute a step to completion
    async fn run(&self, step: &Step, ctx: &EnvironmentContext) -> StepOutcome;

    /// Run a program according to its output mode
    ///
    /// A captured step returns its buffered standard output. A streamed step
    /// writes straight to the plugin's stdout and returns nothing.
    async fn invoke(
        &self,
        step: &CommandStep,
        ctx: &EnvironmentContext,
    ) -> Result<Vec<u8>, CommandError>;
}

/// Runner that spawns real processes and touches the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(step: &CommandStep, ctx: &EnvironmentContext) -> Command {
        let mut command = Command::new(&step.program);
        command
            .args(&step.args)
            .current_dir(step.resolve_dir(ctx.working_dir()))
            .envs(ctx.exposed_vars())
            .stdin(Stdio::null());
        command
    }

    fn resolve(path: &Path, ctx: &EnvironmentContext) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            ctx.working_dir().join(path)
        }
    }

    async fn execute(&self, step: &Step, ctx: &EnvironmentContext) -> Result<(), CommandError> {
        match step {
            Step::Program(cmd) => self.invoke(cmd, ctx).await.map(drop),
            Step::RemoveDir(path) => {
                let path = Self::resolve(path, ctx);
                remove_dir_if_exists(&path)
                    .await
                    .map_err(|source| CommandError::Io {
                        operation: "remove",
                        path,
                        source,
                    })
            }
            Step::WriteFile(write) => {
                let path = Self::resolve(&write.path, ctx);
                write_with_mode(&path, &write.contents, write.mode)
                    .await
                    .map_err(|source| CommandError::Io {
                        operation: "write",
                        path,
                        source,
                    })
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, step: &Step, ctx: &EnvironmentContext) -> StepOutcome {
        match self.execute(step, ctx).await {
            Ok(()) => StepOutcome::Completed,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    async fn invoke(
        &self,
        step: &CommandStep,
        ctx: &EnvironmentContext,
    ) -> Result<Vec<u8>, CommandError> {
        let spawn_failed = |source: std::io::Error| CommandError::Spawn {
            command: step.program.clone(),
            source,
        };
        let mut command = Self::command(step, ctx);
        command.stderr(Stdio::inherit());

        let (status, stdout) = match step.output {
            OutputMode::Streamed => {
                let status = command
                    .stdout(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_failed)?;
                (status, Vec::new())
            }
            OutputMode::Captured => {
                let output = command
                    .stdout(Stdio::piped())
                    .output()
                    .await
                    .map_err(spawn_failed)?;
                (output.status, output.stdout)
            }
        };

        if !status.success() {
            return Err(CommandError::NonZeroExit {
                command: step.program.clone(),
                code: status.code(),
            });
        }

        Ok(stdout)
    }
}
