//! Auto-update facility (spec §F). Not wired into the default `run` path;
//! exposed only through the `pg-host-agent update` subcommand so it is
//! testable in isolation from the collection loop.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// A release manifest served by the update endpoint: current version plus
/// a direct download URL for this platform's binary.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub url: String,
}

/// Fetch the manifest at `manifest_url`.
///
/// # Errors
/// Returns an error if the request fails or the body isn't valid JSON.
pub async fn fetch_manifest(manifest_url: &str) -> Result<Manifest> {
    reqwest::get(manifest_url)
        .await
        .context("fetching update manifest")?
        .error_for_status()
        .context("update manifest request failed")?
        .json::<Manifest>()
        .await
        .context("parsing update manifest")
}

/// Download the binary at `manifest.url` and atomically replace the
/// currently running executable with it. Returns `true` if a replacement
/// happened, `false` if `current_version` already matches the manifest.
///
/// # Errors
/// Returns an error if the download fails or the executable can't be
/// replaced (e.g. no write permission on its directory).
pub async fn check_and_replace(manifest: &Manifest, current_version: &str) -> Result<bool> {
    if manifest.version == current_version {
        info!(version = current_version, "already running the latest version");
        return Ok(false);
    }

    let bytes = reqwest::get(&manifest.url)
        .await
        .context("downloading update binary")?
        .error_for_status()
        .context("update binary request failed")?
        .bytes()
        .await
        .context("reading update binary body")?;

    let current_exe = std::env::current_exe().context("resolving current executable path")?;
    replace_binary(&current_exe, &bytes)?;

    info!(from = current_version, to = manifest.version, "replaced running binary");
    Ok(true)
}

fn replace_binary(current_exe: &Path, bytes: &[u8]) -> Result<()> {
    let dir = current_exe.parent().context("executable has no parent directory")?;
    let tmp_path = dir.join(".pg-host-agent.update.tmp");

    std::fs::write(&tmp_path, bytes).context("writing downloaded binary to temp path")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&tmp_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tmp_path, perms)?;
    }

    std::fs::rename(&tmp_path, current_exe).context("renaming temp binary over the running executable")?;
    Ok(())
}

/// Entry point for the `update` subcommand: fetch the manifest, replace the
/// binary if a newer version is available.
///
/// # Errors
/// Propagates any error from fetching the manifest or replacing the binary.
pub async fn run(manifest_url: &str, current_version: &str) -> Result<()> {
    let manifest = fetch_manifest(manifest_url).await?;

    if manifest.version.trim().is_empty() {
        bail!("update manifest at {manifest_url} has an empty version");
    }

    check_and_replace(&manifest, current_version).await?;
    Ok(())
}
