//! Orchestrator: runs the plugin lifecycle end to end
//!
//! Stages run strictly in order:
//! - install a pinned terraform version
//! - assume the configured role
//! - write `~/.netrc`
//! - version / CA install / cache reset / init / get
//! - capture `terraform output -json`
//! - write the env-file and print the report
//!
//! The first failing stage ends the run with its error.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use super::installer::ToolInstaller;
use super::stage::{RunStage, StageTracker};
use crate::core::config::ExecutionConfig;
use crate::core::environment::EnvironmentContext;
use crate::core::error::PluginError;
use crate::execution::extractor::OutputExtractor;
use crate::execution::runner::CommandRunner;
use crate::execution::sequencer::{CommandSequencer, lifecycle_steps};
use crate::output::transformer::{OutputTransformer, TransformReport};
use crate::security::credentials::{CredentialProvisioner, RoleAssumer, StsRoleAssumer};
use crate::security::netrc::{home_dir, write_netrc};

/// Variable terraform reads its data directory from
pub const DATA_DIR_VAR: &str = "TF_DATA_DIR";

/// Result of a successful run
#[derive(Debug)]
pub struct RunSummary {
    pub stages: Vec<RunStage>,
    pub assumed_role: bool,
    pub netrc: Option<PathBuf>,
    pub steps_completed: usize,
    pub report: TransformReport,
}

/// Composes the pipeline components for one run
pub struct Orchestrator {
    config: ExecutionConfig,
    runner: Arc<dyn CommandRunner>,
    role_assumer: Arc<dyn RoleAssumer>,
    current_dir: PathBuf,
    home_dir: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator rooted at the process's current directory
    pub fn new(config: ExecutionConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            config,
            runner,
            role_assumer: Arc::new(StsRoleAssumer),
            current_dir,
            home_dir: home_dir(),
        }
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = dir.into();
        self
    }

    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = dir.into();
        self
    }

    pub fn with_role_assumer(mut self, assumer: Arc<dyn RoleAssumer>) -> Self {
        self.role_assumer = assumer;
        self
    }

    /// Base environment for every step
    pub fn environment(&self) -> EnvironmentContext {
        let mut ctx = EnvironmentContext::resolve(&self.current_dir, self.config.root_dir.as_deref());
        if let Some(data_dir) = &self.config.data_dir {
            ctx.set(DATA_DIR_VAR, data_dir.display().to_string());
        }
        ctx
    }

    /// Run the lifecycle, printing the outputs report to `report`
    pub async fn run<W: Write>(&self, report: &mut W) -> Result<RunSummary, PluginError> {
        let mut tracker = StageTracker::new();

        match self.run_stages(&mut tracker, report).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(
                    stage = %tracker.current(),
                    code = e.code(),
                    elapsed_ms = tracker.elapsed_ms(),
                    error = %e,
                    "run failed"
                );
                tracker.fail();
                debug!(history = %tracker.history(), "stages");
                Err(e)
            }
        }
    }

    async fn run_stages<W: Write>(
        &self,
        tracker: &mut StageTracker,
        report: &mut W,
    ) -> Result<RunSummary, PluginError> {
        let mut ctx = self.environment();

        if let Some(version) = &self.config.tool_version {
            tracker.advance(RunStage::Install);
            ToolInstaller::new(self.runner.clone())
                .install(version, &ctx)
                .await?;
        }

        let mut assumed_role = false;
        if self.config.role_arn.is_some() {
            tracker.advance(RunStage::Credentials);
            assumed_role = CredentialProvisioner::new(self.role_assumer.clone())
                .provision(self.config.role_arn.as_deref(), &mut ctx)
                .await?;
        }

        let mut netrc = None;
        if self.config.netrc.is_some() {
            tracker.advance(RunStage::Netrc);
            netrc = write_netrc(&self.home_dir, self.config.netrc.as_ref()).await?;
        }

        tracker.advance(RunStage::Sequence);
        let sequencer = CommandSequencer::new(self.runner.clone(), self.config.sensitive);
        let steps_completed = sequencer
            .execute(&lifecycle_steps(&self.config), &ctx)
            .await?;

        tracker.advance(RunStage::Extract);
        let raw = OutputExtractor::new(self.runner.clone())
            .extract(&ctx)
            .await?;

        tracker.advance(RunStage::Transform);
        let transformer = OutputTransformer::from_config(&self.config);
        let transform_report = transformer.transform(&raw, report).await?;

        tracker.advance(RunStage::Done);

        Ok(RunSummary {
            stages: tracker.path(),
            assumed_role,
            netrc,
            steps_completed,
            report: transform_report,
        })
    }

    /// Working directory steps inherit
    pub fn working_dir(&self) -> PathBuf {
        self.environment().working_dir().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{InitOptions, NetrcCredentials};
    use crate::execution::runner::testing::RecordingRunner;
    use crate::security::credentials::testing::StaticRoleAssumer;
    use secrecy::SecretString;
    use tempfile::TempDir;

    const QUERY: &str = "terraform output -json -no-color";
    const ROLE: &str = "arn:aws:iam::123456789012:role/deploy";
    const OUTPUTS: &[u8] = br#"{
        "bucket": {"sensitive": false, "type": "string", "value": "my-bucket"},
        "db_password": {"sensitive": true, "type": "string", "value": "hunter2"}
    }"#;

    fn config(temp_dir: &TempDir) -> ExecutionConfig {
        ExecutionConfig {
            env_file: temp_dir.path().join(".env"),
            ..Default::default()
        }
    }

    fn orchestrator(config: ExecutionConfig, runner: Arc<RecordingRunner>, temp_dir: &TempDir) -> Orchestrator {
        Orchestrator::new(config, runner)
            .with_current_dir(temp_dir.path())
            .with_home_dir(temp_dir.path())
    }

    #[tokio::test]
    async fn test_full_run() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().respond(QUERY, OUTPUTS));
        let orchestrator = orchestrator(config(&temp_dir), runner.clone(), &temp_dir);
        let mut report = Vec::new();

        let summary = orchestrator.run(&mut report).await.unwrap();

        assert_eq!(
            runner.executed(),
            vec![
                "terraform version",
                "rm -rf .terraform",
                "terraform init -input=false",
                "terraform get",
            ]
        );
        assert_eq!(runner.captured(), vec![QUERY]);
        assert_eq!(summary.steps_completed, 4);
        assert!(!summary.assumed_role);
        assert_eq!(
            summary.stages,
            vec![
                RunStage::Start,
                RunStage::Sequence,
                RunStage::Extract,
                RunStage::Transform,
                RunStage::Done,
            ]
        );

        let env_file = std::fs::read_to_string(temp_dir.path().join(".env")).unwrap();
        assert_eq!(env_file, "TF_OUTPUT_bucket=my-bucket\nTF_OUTPUT_db_password=XXXXXXX\n");
        let report = String::from_utf8(report).unwrap();
        assert!(!report.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_failed_step_skips_rest_and_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(
            RecordingRunner::new()
                .fail_on("terraform init")
                .respond(QUERY, OUTPUTS),
        );
        let orchestrator = orchestrator(config(&temp_dir), runner.clone(), &temp_dir);

        let result = orchestrator.run(&mut std::io::sink()).await;

        assert!(matches!(result, Err(PluginError::StepFailed { .. })));
        assert!(!runner.executed().contains(&"terraform get".to_string()));
        assert!(runner.captured().is_empty());
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[tokio::test]
    async fn test_failed_version_step_runs_nothing_else() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().fail_on("terraform version"));
        let orchestrator = orchestrator(config(&temp_dir), runner.clone(), &temp_dir);

        assert!(orchestrator.run(&mut std::io::sink()).await.is_err());
        assert_eq!(runner.executed(), vec!["terraform version"]);
        assert!(runner.captured().is_empty());
    }

    #[tokio::test]
    async fn test_failed_extraction_writes_no_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().respond_exit(QUERY, 1));
        let orchestrator = orchestrator(config(&temp_dir), runner, &temp_dir);

        let result = orchestrator.run(&mut std::io::sink()).await;

        assert!(matches!(result, Err(PluginError::OutputCapture(_))));
        assert!(!temp_dir.path().join(".env").exists());
    }

    #[tokio::test]
    async fn test_assumed_role_credentials_reach_every_step() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().respond(QUERY, OUTPUTS));
        let assumer = Arc::new(StaticRoleAssumer::granting(
            "ASIAEXAMPLE",
            "secret-key",
            "session-token",
        ));
        let config = ExecutionConfig {
            role_arn: Some(ROLE.to_string()),
            ..config(&temp_dir)
        };
        let orchestrator =
            orchestrator(config, runner.clone(), &temp_dir).with_role_assumer(assumer.clone());

        let summary = orchestrator.run(&mut std::io::sink()).await.unwrap();

        assert!(summary.assumed_role);
        assert_eq!(assumer.requested(), vec![ROLE]);
        let env_seen = runner.env_seen();
        assert_eq!(env_seen.len(), 5);
        for env in &env_seen {
            assert!(env.contains(&("AWS_SESSION_TOKEN".to_string(), "session-token".to_string())));
            assert!(env.contains(&("AWS_ACCESS_KEY_ID".to_string(), "ASIAEXAMPLE".to_string())));
        }
    }

    #[tokio::test]
    async fn test_failed_credentials_run_no_step() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let config = ExecutionConfig {
            role_arn: Some(ROLE.to_string()),
            ..config(&temp_dir)
        };
        let orchestrator = orchestrator(config, runner.clone(), &temp_dir)
            .with_role_assumer(Arc::new(StaticRoleAssumer::denying()));

        let result = orchestrator.run(&mut std::io::sink()).await;

        assert!(matches!(result, Err(PluginError::CredentialExchange { .. })));
        assert!(runner.executed().is_empty());
        assert!(runner.captured().is_empty());
    }

    #[tokio::test]
    async fn test_data_dir_and_root_dir() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let config = ExecutionConfig {
            root_dir: Some(PathBuf::from("infra")),
            data_dir: Some(PathBuf::from("/cache/tf")),
            init_options: InitOptions {
                backend_config: vec!["key=prod.tfstate".to_string()],
                lock: Some(true),
                lock_timeout: Some("1m".to_string()),
            },
            ..config(&temp_dir)
        };
        let orchestrator = orchestrator(config, runner.clone(), &temp_dir);

        assert_eq!(orchestrator.working_dir(), temp_dir.path().join("infra"));
        orchestrator.run(&mut std::io::sink()).await.unwrap();

        assert_eq!(
            runner.executed(),
            vec![
                "terraform version",
                "rm -rf /cache/tf",
                "terraform init -backend-config=key=prod.tfstate -lock=true -lock-timeout=1m -input=false",
                "terraform get",
            ]
        );
        for env in runner.env_seen() {
            assert_eq!(env, vec![("TF_DATA_DIR".to_string(), "/cache/tf".to_string())]);
        }
    }

    #[tokio::test]
    async fn test_netrc_written_before_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let config = ExecutionConfig {
            netrc: Some(NetrcCredentials {
                machine: "github.com".to_string(),
                login: "octocat".to_string(),
                password: SecretString::new("ghp_token".into()),
            }),
            ..config(&temp_dir)
        };
        let orchestrator = orchestrator(config, runner, &temp_dir);

        let summary = orchestrator.run(&mut std::io::sink()).await.unwrap();

        assert_eq!(summary.netrc, Some(temp_dir.path().join(".netrc")));
        assert!(summary.stages.contains(&RunStage::Netrc));
    }

    #[tokio::test]
    async fn test_empty_outputs_write_empty_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new().respond(QUERY, b"not json"));
        let orchestrator = orchestrator(config(&temp_dir), runner, &temp_dir);

        let summary = orchestrator.run(&mut std::io::sink()).await.unwrap();

        assert!(summary.report.assignments.is_empty());
        assert_eq!(std::fs::read_to_string(temp_dir.path().join(".env")).unwrap(), "");
    }
}
