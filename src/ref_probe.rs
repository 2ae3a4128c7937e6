//! Ref Probe — cheaply learning a repository's ref set, either from the
//! remote (`git ls-remote`) or from a previously published bundle
//! (`git bundle list-heads`, or the manifest sidecar when present).

use std::collections::BTreeMap;
use std::path::Path;

use crate::encryption;
use crate::error::{BackupError, Result};
use crate::git_tool::GitTool;
use crate::manifest::Manifest;

/// Ref name -> commit OID, already filtered to `refs/heads`, `refs/tags`,
/// and `refs/remotes` — the only namespaces that participate in the
/// unchanged-since-last-backup comparison.
pub type RefMap = BTreeMap<String, String>;

fn in_scope(ref_name: &str) -> bool {
    ref_name.starts_with("refs/heads/") || ref_name.starts_with("refs/tags/") || ref_name.starts_with("refs/remotes/")
}

fn parse_ref_lines(stdout: &str) -> RefMap {
    let mut refs = RefMap::new();
    for line in stdout.lines() {
        let mut parts = line.split_whitespace();
        let (Some(oid), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if in_scope(name) {
            refs.insert(name.to_string(), oid.to_string());
        }
    }
    refs
}

/// `git ls-remote <url>`.
pub async fn probe_remote(git: &GitTool, url: &str) -> Result<RefMap> {
    let output = git.ls_remote(url).await?;
    Ok(parse_ref_lines(&output))
}

/// Learn the ref set of a previously published bundle.
///
/// Prefers the manifest sidecar when present, readable, and hash-matched to
/// the bundle on disk; falls back to `git bundle list-heads` when the bundle
/// itself is plaintext. For an encrypted bundle with no usable manifest, a
/// known passphrase is used to decrypt the bundle itself and read its heads
/// from the plaintext rather than giving up — only when no passphrase is
/// configured does this fall back to `Ok(None)` ("unknown"), treating the
/// bundle as opaque rather than attempting to open it. A decrypt failure
/// against a known-good passphrase means the bundle itself has rotted, and
/// is reported as [`crate::error::ErrorKind::CorruptArtifact`] so the caller
/// can quarantine it.
pub async fn probe_bundle(
    git: &GitTool,
    bundle_path: &Path,
    manifest_path: Option<&Path>,
    passphrase: Option<&str>,
) -> Result<Option<RefMap>> {
    if let Some(manifest_path) = manifest_path {
        if manifest_path.exists() {
            if let Ok(Some(manifest)) = Manifest::read(manifest_path, passphrase) {
                if let Ok(bundle_bytes) = std::fs::read(bundle_path) {
                    if manifest.matches_bundle(&bundle_bytes) {
                        return Ok(Some(manifest.refs));
                    }
                }
            }
        }
    }

    let is_encrypted = bundle_path.extension().and_then(|e| e.to_str()) == Some("age");
    if !is_encrypted {
        let output = git.bundle_list_heads(bundle_path).await?;
        return Ok(Some(parse_ref_lines(&output)));
    }

    let Some(passphrase) = passphrase else {
        return Ok(None);
    };

    let blob = std::fs::read(bundle_path)?;
    let plaintext = encryption::decrypt(&blob, passphrase).map_err(|e| {
        BackupError::corrupt(format!("bundle {} failed to decrypt: {}", bundle_path.display(), e.message))
    })?;

    let scratch = tempfile::Builder::new()
        .prefix("ref-probe-")
        .suffix(".bundle")
        .tempfile()
        .map_err(|e| BackupError::filesystem(format!("failed to create scratch file for decrypted bundle: {e}")))?;
    std::fs::write(scratch.path(), &plaintext)?;

    let output = git.bundle_list_heads(scratch.path()).await?;
    Ok(Some(parse_ref_lines(&output)))
}
