//! tf-output-env CLI
//!
//! Runs terraform init for a configuration and publishes its outputs as an
//! env-file. Every flag can also be set through the environment variable
//! named next to it, which is how CI step settings reach the plugin.

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use terraform_output_env::{
    DEFAULT_ENV_FILE, DEFAULT_ENV_PREFIX, ExecutionConfig, InitOptions, NetrcCredentials,
    Orchestrator, PluginError, ProcessRunner, non_empty,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Publish terraform outputs as environment variables
#[derive(Parser, Debug)]
#[command(name = "tf-output-env")]
#[command(version)]
#[command(about = "Publish terraform outputs as environment variables", long_about = None)]
struct Cli {
    /// CA cert to add to the trust store so terraform can reach internal resources
    #[arg(long, env = "PLUGIN_CA_CERT")]
    ca_cert: Option<String>,

    /// Options for the init command, as JSON
    #[arg(long, env = "PLUGIN_INIT_OPTIONS")]
    init_options: Option<String>,

    /// netrc machine
    #[arg(long, env = "DRONE_NETRC_MACHINE")]
    netrc_machine: Option<String>,

    /// netrc username
    #[arg(long, env = "DRONE_NETRC_USERNAME")]
    netrc_username: Option<String>,

    /// netrc password
    #[arg(long, env = "DRONE_NETRC_PASSWORD", hide_env_values = true)]
    netrc_password: Option<String>,

    /// Role to assume before running the terraform commands
    #[arg(long, env = "PLUGIN_ROLE_ARN_TO_ASSUME")]
    role_arn_to_assume: Option<String>,

    /// Directory holding the terraform files, relative to the current directory
    #[arg(long, env = "PLUGIN_ROOT_DIR")]
    root_dir: Option<String>,

    /// Do not echo terraform commands to stdout
    #[arg(long, env = "PLUGIN_SENSITIVE")]
    sensitive: bool,

    /// Terraform version to install
    #[arg(long, env = "PLUGIN_TF_VERSION")]
    tf_version: Option<String>,

    /// Where terraform keeps its per-working-directory data
    #[arg(long, env = "PLUGIN_TF_DATA_DIR")]
    tf_data_dir: Option<String>,

    /// Environment variable prefix
    #[arg(long, env = "PLUGIN_ENV_PREFIX", default_value = DEFAULT_ENV_PREFIX)]
    env_prefix: String,

    /// Prefix every line of the env file with `export`
    #[arg(long, env = "PLUGIN_EXPORT_ENVS")]
    export_envs: bool,

    /// Env file name
    #[arg(long, env = "PLUGIN_ENVFILE", default_value = DEFAULT_ENV_FILE)]
    envfile: PathBuf,
}

impl Cli {
    fn into_config(self) -> ExecutionConfig {
        let netrc = non_empty(self.netrc_machine).map(|machine| NetrcCredentials {
            machine,
            login: self.netrc_username.unwrap_or_default(),
            password: SecretString::new(self.netrc_password.unwrap_or_default().into_boxed_str()),
        });

        ExecutionConfig {
            root_dir: non_empty(self.root_dir).map(PathBuf::from),
            sensitive: self.sensitive,
            data_dir: non_empty(self.tf_data_dir).map(PathBuf::from),
            role_arn: non_empty(self.role_arn_to_assume),
            env_file: self.envfile,
            env_prefix: self.env_prefix,
            export_envs: self.export_envs,
            init_options: self
                .init_options
                .as_deref()
                .map(InitOptions::from_json)
                .unwrap_or_default(),
            ca_cert: non_empty(self.ca_cert),
            tool_version: non_empty(self.tf_version),
            netrc,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match suggested_actions(&e) {
                Some(actions) => {
                    for action in actions {
                        eprintln!("  - {}", action);
                    }
                }
                None => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

/// Hints for a failed run
///
/// Plugin errors were already logged with their stage and code by the
/// orchestrator, so only their suggested actions are left to print.
fn suggested_actions(e: &anyhow::Error) -> Option<Vec<&'static str>> {
    e.downcast_ref::<PluginError>()
        .map(|plugin_error| plugin_error.suggested_actions())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "terraform output to env plugin");

    let config = cli.into_config();
    let orchestrator = Orchestrator::new(config, Arc::new(ProcessRunner::new()));

    let summary = orchestrator.run(&mut std::io::stdout()).await?;
    info!(
        variables = summary.report.assignments.len(),
        masked = summary.report.sensitive_count(),
        "done"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = Cli::parse_from(["tf-output-env"]).into_config();

        assert_eq!(config.env_prefix, "TF_OUTPUT_");
        assert_eq!(config.env_file, PathBuf::from(".env"));
        assert!(config.netrc.is_none());
        assert!(config.role_arn.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let config = Cli::parse_from([
            "tf-output-env",
            "--root-dir",
            "infra",
            "--role-arn-to-assume",
            "",
            "--init-options",
            r#"{"lock":false}"#,
            "--netrc-machine",
            "github.com",
            "--netrc-username",
            "octocat",
            "--export-envs",
            "--sensitive",
        ])
        .into_config();

        assert_eq!(config.root_dir, Some(PathBuf::from("infra")));
        assert!(config.role_arn.is_none());
        assert_eq!(config.init_options.lock, Some(false));
        assert_eq!(config.netrc.unwrap().login, "octocat");
        assert!(config.export_envs);
        assert!(config.sensitive);
    }

    #[test]
    fn test_plugin_errors_only_print_actions() {
        let error = anyhow::Error::new(PluginError::InvalidConfig("bad version".to_string()));
        let actions = suggested_actions(&error).unwrap();
        assert!(!actions.is_empty());

        assert!(suggested_actions(&anyhow::anyhow!("stdout closed")).is_none());
    }
}
