//! OutputTransformer: turns terraform outputs into env assignments
//!
//! Every output becomes one `[export ]<prefix><key>=<value>` line. Sensitive
//! values are replaced by [`REDACTION_TOKEN`] in the printed report and in the
//! env-file alike; the env-file is not a secret delivery mechanism.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::entry::{OutputEntry, OutputMap, parse_outputs};
use crate::core::config::ExecutionConfig;
use crate::core::error::PluginError;
use crate::core::fs::write_with_mode;

/// Placeholder written instead of a sensitive value
pub const REDACTION_TOKEN: &str = "XXXXXXX";

const ENV_FILE_MODE: u32 = 0o600;

/// One rendered env line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    /// Variable name including the prefix
    pub name: String,
    pub sensitive: bool,
    /// Full line including the trailing newline
    pub line: String,
}

/// Summary of a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    pub env_file: PathBuf,
    pub assignments: Vec<EnvAssignment>,
}

impl TransformReport {
    pub fn sensitive_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.sensitive).count()
    }
}

/// Renders outputs as env lines and persists them
#[derive(Debug, Clone)]
pub struct OutputTransformer {
    env_prefix: String,
    export_envs: bool,
    env_file: PathBuf,
}

impl OutputTransformer {
    pub fn new(env_prefix: impl Into<String>, export_envs: bool, env_file: impl Into<PathBuf>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
            export_envs,
            env_file: env_file.into(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.env_prefix.clone(),
            config.export_envs,
            config.env_file.clone(),
        )
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Parse the captured bytes, treating a malformed document as no outputs
    ///
    /// Terraform prints nothing useful when a configuration declares no
    /// outputs, which is indistinguishable here from a broken document.
    pub fn parse(&self, raw: &[u8]) -> OutputMap {
        match parse_outputs(raw) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(error = %e, bytes = raw.len(), "could not parse terraform outputs, writing no variables");
                OutputMap::new()
            }
        }
    }

    /// Render one entry, masking it when sensitive
    pub fn render_entry(&self, entry: &OutputEntry) -> EnvAssignment {
        let name = format!("{}{}", self.env_prefix, entry.key);
        let value = if entry.sensitive {
            REDACTION_TOKEN.to_string()
        } else {
            entry.value.render()
        };
        let export = if self.export_envs { "export " } else { "" };

        EnvAssignment {
            line: format!("{}{}={}\n", export, name, value),
            name,
            sensitive: entry.sensitive,
        }
    }

    /// Render every entry in key order
    pub fn render(&self, outputs: &OutputMap) -> Vec<EnvAssignment> {
        outputs.values().map(|e| self.render_entry(e)).collect()
    }

    /// Parse, print the report to `report` and persist the env-file
    pub async fn transform<W: Write>(
        &self,
        raw: &[u8],
        report: &mut W,
    ) -> Result<TransformReport, PluginError> {
        let outputs = self.parse(raw);
        let assignments = self.render(&outputs);

        let mut buffer = Vec::new();
        writeln!(report, "Outputs:").map_err(PluginError::Report)?;
        for assignment in &assignments {
            report
                .write_all(assignment.line.as_bytes())
                .map_err(PluginError::Report)?;
            buffer.extend_from_slice(assignment.line.as_bytes());
        }
        report.flush().map_err(PluginError::Report)?;

        write_with_mode(&self.env_file, &buffer, ENV_FILE_MODE)
            .await
            .map_err(|e| PluginError::persist(&self.env_file, e))?;

        info!(
            env_file = %self.env_file.display(),
            variables = assignments.len(),
            "wrote env file"
        );

        Ok(TransformReport {
            env_file: self.env_file.clone(),
            assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn run(
        raw: &[u8],
        export_envs: bool,
    ) -> (String, String, TransformReport) {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        let transformer = OutputTransformer::new("TF_OUTPUT_", export_envs, &env_file);
        let mut report = Vec::new();

        let summary = transformer.transform(raw, &mut report).await.unwrap();

        let file = std::fs::read_to_string(&env_file).unwrap();
        (file, String::from_utf8(report).unwrap(), summary)
    }

    #[tokio::test]
    async fn test_plain_string_output() {
        let (file, report, _) =
            run(br#"{"x":{"sensitive":false,"type":"string","value":"hi"}}"#, false).await;

        assert_eq!(file, "TF_OUTPUT_x=hi\n");
        assert_eq!(report, "Outputs:\nTF_OUTPUT_x=hi\n");
    }

    #[tokio::test]
    async fn test_export_mode() {
        let (file, _, _) =
            run(br#"{"x":{"sensitive":false,"type":"string","value":"hi"}}"#, true).await;

        assert_eq!(file, "export TF_OUTPUT_x=hi\n");
    }

    #[tokio::test]
    async fn test_sensitive_value_is_masked_everywhere() {
        let (file, report, summary) =
            run(br#"{"y":{"sensitive":true,"value":"secret"}}"#, false).await;

        assert_eq!(file, "TF_OUTPUT_y=XXXXXXX\n");
        assert!(!file.contains("secret"));
        assert!(!report.contains("secret"));
        assert_eq!(summary.sensitive_count(), 1);
    }

    #[tokio::test]
    async fn test_sensitive_masking_for_every_shape() {
        let raw = br#"{
            "a": {"sensitive": true, "value": "s3cr3t-string"},
            "b": {"sensitive": true, "value": 987654321},
            "c": {"sensitive": true, "value": ["s3cr3t-item"]},
            "d": {"sensitive": true, "value": {"k": "s3cr3t-map"}},
            "e": {"sensitive": true, "value": true}
        }"#;

        let (file, report, _) = run(raw, true).await;

        for output in [&file, &report] {
            assert!(!output.contains("s3cr3t"));
            assert!(!output.contains("987654321"));
            assert!(!output.contains("true"));
        }
        assert_eq!(
            file,
            "export TF_OUTPUT_a=XXXXXXX\n\
             export TF_OUTPUT_b=XXXXXXX\n\
             export TF_OUTPUT_c=XXXXXXX\n\
             export TF_OUTPUT_d=XXXXXXX\n\
             export TF_OUTPUT_e=XXXXXXX\n"
        );
    }

    #[tokio::test]
    async fn test_lines_are_in_key_order() {
        let raw = br#"{
            "zone": {"sensitive": false, "type": "string", "value": "eu-west-1a"},
            "count": {"sensitive": false, "type": "number", "value": 3},
            "ids": {"sensitive": false, "type": ["list","string"], "value": ["i-1","i-2"]}
        }"#;

        let (file, _, summary) = run(raw, false).await;

        assert_eq!(
            file,
            "TF_OUTPUT_count=3\nTF_OUTPUT_ids=[\"i-1\",\"i-2\"]\nTF_OUTPUT_zone=eu-west-1a\n"
        );
        let names: Vec<_> = summary.assignments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["TF_OUTPUT_count", "TF_OUTPUT_ids", "TF_OUTPUT_zone"]);
    }

    #[tokio::test]
    async fn test_malformed_output_writes_empty_file() {
        let (file, report, summary) = run(b"\x1b[31mError: no state\x1b[0m", false).await;

        assert_eq!(file, "");
        assert_eq!(report, "Outputs:\n");
        assert!(summary.assignments.is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_writes_empty_file() {
        let (file, _, _) = run(b"", false).await;
        assert_eq!(file, "");
    }

    #[tokio::test]
    async fn test_env_file_is_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        std::fs::write(&env_file, "STALE=1\nOTHER=2\n").unwrap();
        let transformer = OutputTransformer::new("P_", false, &env_file);

        transformer
            .transform(br#"{"k":{"value":"v"}}"#, &mut std::io::sink())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&env_file).unwrap(), "P_k=v\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        let transformer = OutputTransformer::new("TF_OUTPUT_", false, &env_file);

        transformer.transform(b"{}", &mut std::io::sink()).await.unwrap();

        let mode = std::fs::metadata(&env_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_unwritable_env_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("missing").join(".env");
        let transformer = OutputTransformer::new("TF_OUTPUT_", false, &env_file);

        let result = transformer.transform(b"{}", &mut std::io::sink()).await;

        assert!(matches!(result, Err(PluginError::Persist { .. })));
    }
}
