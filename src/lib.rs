pub mod core;
pub mod execution;
pub mod orchestration;
pub mod output;
pub mod security;

pub use crate::core::*;
pub use execution::{CommandRunner, CommandSequencer, OutputExtractor, ProcessRunner};
pub use orchestration::{Orchestrator, RunStage, RunSummary};
pub use output::{OutputTransformer, REDACTION_TOKEN};
pub use security::{CredentialProvisioner, RoleAssumer, StsRoleAssumer};
