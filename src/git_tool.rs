//! Git Command Runner — the single seam through which every `git` subprocess
//! invocation passes.
//!
//! Built on `tokio::process::Command` rather than the blocking
//! `std::process::Command` so the worker pool never blocks a runtime thread
//! on a slow clone. Transient network failures get exponential-backoff
//! retries; everything else is classified from stderr and returned as-is.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{BackupError, Result};
use crate::logging::Logger;

const MAX_NETWORK_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Substrings in git's stderr that indicate a transient, retriable network
/// problem rather than a permanent one.
const TRANSIENT_MARKERS: &[&str] = &[
    "could not resolve host",
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "temporary failure in name resolution",
    "the remote end hung up unexpectedly",
];

const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "403",
    "401",
    "invalid username or password",
];

const PROTOCOL_MARKERS: &[&str] = &["repository not found", "could not read from remote repository", "not a git repository"];

/// Classify a git subprocess's stderr into an [`ErrorKind`](crate::error::ErrorKind)-shaped
/// error before it's logged or reported anywhere.
fn classify_failure(stderr: &str) -> BackupError {
    let lower = stderr.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        return BackupError::auth(condense(stderr));
    }
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return BackupError::network(condense(stderr));
    }
    if PROTOCOL_MARKERS.iter().any(|m| lower.contains(m)) {
        return BackupError::protocol(condense(stderr));
    }
    BackupError::git_tool(condense(stderr))
}

fn is_transient(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Collapse a (possibly noisy) multi-line stderr into at most 5 lines,
/// joined for a single-line log/error message.
fn condense(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(5)
        .collect();
    if lines.is_empty() {
        "git command failed with no stderr output".to_string()
    } else {
        lines.join("; ")
    }
}

/// The single component permitted to spawn `git`. Every method corresponds
/// to exactly one line of the fixed subprocess surface.
pub struct GitTool {
    logger: Logger,
}

impl GitTool {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        self.run_with_retry(args, cwd, 0).await
    }

    async fn run_with_retry(&self, args: &[&str], cwd: Option<&Path>, attempt: u32) -> Result<String> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        self.logger.debug(&format!("git {}", args.join(" ")));

        let output = command
            .output()
            .await
            .map_err(|e| BackupError::git_tool(format!("failed to spawn git: {e}")))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_transient(&stderr) && attempt < MAX_NETWORK_RETRIES {
            let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
            self.logger
                .warn(&format!("transient git failure, retrying in {delay:?}: {}", condense(&stderr)));
            tokio::time::sleep(delay).await;
            return Box::pin(self.run_with_retry(args, cwd, attempt + 1)).await;
        }

        Err(classify_failure(&stderr))
    }

    pub async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()> {
        self.run(&["clone", "--mirror", url, dest.to_string_lossy().as_ref()], None)
            .await
            .map(|_| ())
    }

    pub async fn bundle_create_all(&self, repo_dir: &Path, bundle_path: &Path) -> Result<()> {
        self.run(&["bundle", "create", &bundle_path.to_string_lossy(), "--all"], Some(repo_dir))
            .await
            .map(|_| ())
    }

    /// Parses `git count-objects -v` output to decide emptiness: a mirror
    /// with zero total objects and no packs has nothing worth bundling.
    pub async fn is_empty_repository(&self, repo_dir: &Path) -> Result<bool> {
        let stdout = self.run(&["count-objects", "-v"], Some(repo_dir)).await?;
        let mut count = 0u64;
        let mut in_pack = 0u64;
        for line in stdout.lines() {
            if let Some(value) = line.strip_prefix("count: ") {
                count = value.trim().parse().unwrap_or(0);
            } else if let Some(value) = line.strip_prefix("in-pack: ") {
                in_pack = value.trim().parse().unwrap_or(0);
            }
        }
        Ok(count == 0 && in_pack == 0)
    }

    pub async fn ls_remote(&self, url: &str) -> Result<String> {
        self.run(&["ls-remote", url], None).await
    }

    pub async fn bundle_list_heads(&self, bundle_path: &Path) -> Result<String> {
        self.run(&["bundle", "list-heads", &bundle_path.to_string_lossy()], None).await
    }

    pub async fn lfs_fetch_all(&self, repo_dir: &Path) -> Result<()> {
        self.run(&["lfs", "fetch", "--all"], Some(repo_dir)).await.map(|_| ())
    }
}
