//! File helpers shared by the env-file, netrc and trust-store writers

use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Create or truncate `path`, write `contents` and apply `mode` on unix
///
/// The mode is set explicitly after writing so a pre-existing file with
/// looser permissions is tightened too.
pub async fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Recursively remove `path`; an absent directory is not an error
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
