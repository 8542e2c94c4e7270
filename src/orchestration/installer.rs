//! Installs a pinned terraform version from the HashiCorp release site

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::core::environment::EnvironmentContext;
use crate::core::error::PluginError;
use crate::core::fs::write_with_mode;
use crate::execution::runner::CommandRunner;
use crate::execution::step::{CommandStep, Step, StepOutcome};

const RELEASES_URL: &str = "https://releases.hashicorp.com/terraform";
const INSTALL_DIR: &str = "/bin";

/// Release architecture name for a Rust target architecture
pub fn release_arch(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("amd64"),
        "aarch64" => Some("arm64"),
        "x86" => Some("386"),
        "arm" => Some("arm"),
        _ => None,
    }
}

/// Release operating system name for a Rust target OS
pub fn release_os(os: &str) -> Option<&'static str> {
    match os {
        "linux" => Some("linux"),
        "macos" => Some("darwin"),
        "windows" => Some("windows"),
        "freebsd" => Some("freebsd"),
        "openbsd" => Some("openbsd"),
        "solaris" => Some("solaris"),
        _ => None,
    }
}

/// Downloads and unpacks terraform
pub struct ToolInstaller {
    runner: Arc<dyn CommandRunner>,
    releases_url: String,
    install_dir: PathBuf,
    download_dir: PathBuf,
}

impl ToolInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            releases_url: RELEASES_URL.to_string(),
            install_dir: PathBuf::from(INSTALL_DIR),
            download_dir: std::env::temp_dir(),
        }
    }

    /// Set the directory the binary is unpacked into
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// Validate a version pin
    pub fn parse_version(version: &str) -> Result<semver::Version, PluginError> {
        semver::Version::parse(version.trim_start_matches('v')).map_err(|e| {
            PluginError::InvalidConfig(format!("terraform version `{}`: {}", version, e))
        })
    }

    /// Release archive URL for `version` on the current platform
    pub fn archive_url(&self, version: &semver::Version) -> Result<String, PluginError> {
        let unsupported = |what: &str, name: &str| {
            PluginError::InvalidConfig(format!("no terraform release for {} {}", what, name))
        };
        let os = release_os(std::env::consts::OS)
            .ok_or_else(|| unsupported("operating system", std::env::consts::OS))?;
        let arch = release_arch(std::env::consts::ARCH)
            .ok_or_else(|| unsupported("architecture", std::env::consts::ARCH))?;

        Ok(format!(
            "{base}/{v}/terraform_{v}_{os}_{arch}.zip",
            base = self.releases_url,
            v = version,
            os = os,
            arch = arch
        ))
    }

    /// Step unpacking `archive` into the install directory
    pub fn unpack_step(&self, archive: &std::path::Path) -> Step {
        CommandStep::new("unzip")
            .arg("-o")
            .arg(archive.display().to_string())
            .arg("-d")
            .arg(self.install_dir.display().to_string())
            .into()
    }

    /// Download `version` and unpack it over any existing binary
    pub async fn install(&self, version: &str, ctx: &EnvironmentContext) -> Result<(), PluginError> {
        let parsed = Self::parse_version(version)?;
        let url = self.archive_url(&parsed)?;
        let failed = |message: String| PluginError::InstallFailed {
            version: parsed.to_string(),
            message,
        };

        info!(%url, "downloading terraform");
        let archive = reqwest::get(&url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| failed(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let archive_path = self.download_dir.join(format!("terraform_{}.zip", parsed));
        write_with_mode(&archive_path, &archive, 0o644)
            .await
            .map_err(|e| PluginError::persist(&archive_path, e))?;

        match self.runner.run(&self.unpack_step(&archive_path), ctx).await {
            StepOutcome::Completed => {
                info!(version = %parsed, dir = %self.install_dir.display(), "installed terraform");
                Ok(())
            }
            StepOutcome::Failed(reason) => Err(failed(reason)),
        }
    }
}
