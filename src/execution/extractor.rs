//! OutputExtractor: captures `terraform output -json`

use std::sync::Arc;
use tracing::debug;

use super::runner::CommandRunner;
use super::sequencer::TERRAFORM;
use super::step::CommandStep;
use crate::core::environment::EnvironmentContext;
use crate::core::error::PluginError;

/// Runs the output query and buffers its stdout for parsing
pub struct OutputExtractor {
    runner: Arc<dyn CommandRunner>,
}

impl OutputExtractor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// The query step: machine-readable, no colour codes
    pub fn query_step() -> CommandStep {
        CommandStep::new(TERRAFORM)
            .args(["output", "-json", "-no-color"])
            .captured()
    }

    /// Capture the raw output document
    pub async fn extract(&self, ctx: &EnvironmentContext) -> Result<Vec<u8>, PluginError> {
        let raw = self
            .runner
            .invoke(&Self::query_step(), ctx)
            .await
            .map_err(PluginError::OutputCapture)?;

        debug!(bytes = raw.len(), "captured terraform outputs");
        Ok(raw)
    }
}
