//! Writes `~/.netrc` so terraform can fetch modules from private git hosts

use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::config::NetrcCredentials;
use crate::core::error::PluginError;
use crate::core::fs::write_with_mode;

const NETRC_FILE: &str = ".netrc";
const NETRC_MODE: u32 = 0o600;

/// Home directory used when the platform cannot report one
const FALLBACK_HOME: &str = "/root";

/// Home directory of the invoking user
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(FALLBACK_HOME))
}

/// Render the netrc body
pub fn render_netrc(credentials: &NetrcCredentials) -> String {
    format!(
        "machine {}\nlogin {}\npassword {}\n",
        credentials.machine,
        credentials.login,
        credentials.password.expose_secret()
    )
}

/// Write `<home>/.netrc`; skipped when no machine is configured
///
/// Returns the written path, if any.
pub async fn write_netrc(
    home: &Path,
    credentials: Option<&NetrcCredentials>,
) -> Result<Option<PathBuf>, PluginError> {
    let Some(credentials) = credentials.filter(|c| !c.machine.is_empty()) else {
        return Ok(None);
    };

    let path = home.join(NETRC_FILE);
    write_with_mode(&path, render_netrc(credentials).as_bytes(), NETRC_MODE)
        .await
        .map_err(|e| PluginError::persist(&path, e))?;

    info!(machine = %credentials.machine, path = %path.display(), "wrote netrc");
    Ok(Some(path))
}
