//! Optional Git LFS archival: `git lfs fetch --all` followed by archiving
//! the mirror's `lfs/` object store into a single `.lfs.tar` file alongside
//! the bundle. `flate2` isn't pulled in alongside `tar` since the LFS store
//! is already compressed content and a second compression pass buys little.

use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};
use crate::git_tool::GitTool;

/// Fetch all LFS objects into the mirror, then archive its `lfs/` directory.
///
/// Returns `None` when the mirror has no `lfs/` directory at all (the
/// repository simply doesn't use LFS) rather than producing an empty
/// archive.
pub async fn archive_lfs_objects(git: &GitTool, repo_dir: &Path, dest_tar: &Path) -> Result<Option<PathBuf>> {
    let lfs_dir = repo_dir.join("lfs");
    git.lfs_fetch_all(repo_dir).await?;
    if !lfs_dir.exists() {
        return Ok(None);
    }

    let dest_tar = dest_tar.to_path_buf();
    let dest_tar_for_task = dest_tar.clone();
    let lfs_dir_owned = lfs_dir.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dest_tar = dest_tar_for_task;
        let file = std::fs::File::create(&dest_tar)
            .map_err(|e| BackupError::filesystem(format!("failed to create LFS archive {}: {e}", dest_tar.display())))?;
        let mut builder = tar::Builder::new(file);
        builder
            .append_dir_all("lfs", &lfs_dir_owned)
            .map_err(|e| BackupError::filesystem(format!("failed to archive LFS store: {e}")))?;
        builder
            .finish()
            .map_err(|e| BackupError::filesystem(format!("failed to finalise LFS archive: {e}")))?;
        Ok(())
    })
    .await
    .map_err(|e| BackupError::filesystem(format!("LFS archival task panicked: {e}")))??;

    Ok(Some(dest_tar))
}
