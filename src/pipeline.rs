//! Pipeline — dispatches every repository an enumerator discovers across a
//! fixed worker pool, collects results, and supports cooperative
//! cancellation.
//!
//! An `mpsc` job channel feeds a fixed set of spawned tasks, mirrored by a
//! results channel the caller drains exactly once per job. Cancellation uses
//! `tokio::sync::watch` rather than a third-party cancellation-token crate —
//! plain tokio/std primitives cover it without another dependency.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::ProviderConfig;
use crate::enumerator::Enumerator;
use crate::error::BackupError;
use crate::git_tool::GitTool;
use crate::logging::{Logger, MaskTable};
use crate::repository::RepositoryDescriptor;
use crate::result::{BackupResultRecord, ProviderBackupResult};
use crate::worker;

/// Handle for requesting cooperative cancellation of an in-flight pipeline
/// run. Cancellation is cooperative: it never kills a subprocess mid-flight,
/// only stops new work from starting.
#[derive(Clone)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a fresh [`CancellationHandle`]/receiver pair for a run that should
/// be externally cancellable. The handle is the caller's to hold onto; the
/// receiver is passed to [`run`] or [`run_with_repos`].
pub fn new_cancellation() -> (CancellationHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, rx)
}

/// Run one provider's full backup pass: enumerate, then dispatch every
/// discovered repository across a fixed-size worker pool. `cancel_rx` is
/// checked between jobs and at the inter-repo pacing sleep; pass the
/// receiver half of [`new_cancellation`] to allow an external caller to stop
/// an in-flight run, or a receiver that never fires if cancellation isn't
/// needed.
pub async fn run(
    config: ProviderConfig,
    enumerator: Arc<dyn Enumerator>,
    cancel_rx: watch::Receiver<bool>,
) -> ProviderBackupResult {
    let logger = build_logger(&config);

    let repos = match enumerator.list_repositories().await {
        Ok(repos) => repos,
        Err(err) => {
            logger.error(&format!("enumeration failed: {err}"));
            return ProviderBackupResult::enumeration_failed(err.to_string());
        }
    };

    run_with_repos_cancellable(config, repos, cancel_rx).await
}

/// Same as [`run`] but takes an already-enumerated repository list, so
/// callers (and tests) that already have descriptors can skip the
/// enumerator round-trip. Not externally cancellable; see
/// [`run_with_repos_cancellable`] for a run that can be stopped mid-flight.
pub async fn run_with_repos(config: ProviderConfig, repos: Vec<RepositoryDescriptor>) -> ProviderBackupResult {
    let (_handle, cancel_rx) = new_cancellation();
    run_with_repos_cancellable(config, repos, cancel_rx).await
}

/// Same as [`run_with_repos`], but checks `cancel_rx` between jobs and during
/// the inter-repo pacing sleep — each worker checks the flag at its next
/// suspension point.
pub async fn run_with_repos_cancellable(
    config: ProviderConfig,
    repos: Vec<RepositoryDescriptor>,
    cancel_rx: watch::Receiver<bool>,
) -> ProviderBackupResult {
    let logger = build_logger(&config);
    let pool_size = config.worker_pool_size.max(1);
    let pacing = config.provider.default_pacing();

    let (job_tx, job_rx) = mpsc::channel::<RepositoryDescriptor>(repos.len().max(1));
    let (result_tx, mut result_rx) = mpsc::channel::<BackupResultRecord>(repos.len().max(1));
    let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(pool_size);
    for _ in 0..pool_size {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let logger = logger.clone();
        let config = Arc::clone(&config);
        let mut cancel_rx = cancel_rx.clone();
        handles.push(tokio::spawn(async move {
            let git = GitTool::new(logger.clone());
            loop {
                let descriptor = {
                    let mut rx = job_rx.lock().await;
                    rx.recv().await
                };
                let Some(descriptor) = descriptor else { break };

                if *cancel_rx.borrow() {
                    let _ = result_tx
                        .send(BackupResultRecord::skipped_with_kind(
                            &descriptor.path_with_namespace,
                            crate::error::ErrorKind::Cancelled,
                        ))
                        .await;
                    continue;
                }

                let record = worker::back_up_repository(&git, &logger, &config, &descriptor).await;
                let _ = result_tx.send(record).await;

                if !pacing.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(pacing) => {}
                        _ = cancel_rx.changed() => {}
                    }
                }
            }
        }));
    }
    drop(result_tx);

    let expected = repos.len();
    for descriptor in repos {
        if job_tx.send(descriptor).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let mut records = Vec::with_capacity(expected);
    while let Some(record) = result_rx.recv().await {
        records.push(record);
    }

    for handle in handles {
        let _ = handle.await;
    }

    ProviderBackupResult {
        records,
        provider_error: None,
    }
}

fn build_logger(config: &ProviderConfig) -> Logger {
    let mut masks = MaskTable::new();
    for secret in config.secrets() {
        masks.register(secret);
    }
    Logger::new(config.provider.canonical_name(), config.log_level(), masks)
}

impl From<BackupError> for ProviderBackupResult {
    fn from(err: BackupError) -> Self {
        ProviderBackupResult::enumeration_failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiffRemoteMethod, ProviderKind};

    fn config(backup_dir: std::path::PathBuf, pool_size: usize) -> ProviderConfig {
        ProviderConfig {
            provider: ProviderKind::GitHub,
            api_url: "https://api.github.com".into(),
            token: None,
            backup_dir,
            backups_to_retain: 0,
            diff_remote_method: DiffRemoteMethod::Clone,
            orgs: None,
            backup_lfs: false,
            encryption_passphrase: None,
            log_level: 0,
            worker_pool_size: pool_size,
            http_timeout_secs: 120,
            http_retries: 2,
        }
    }

    #[tokio::test]
    async fn empty_repository_list_yields_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_with_repos(config(dir.path().to_path_buf(), 3), Vec::new()).await;
        assert_eq!(result.records.len(), 0);
    }

    #[tokio::test]
    async fn every_descriptor_produces_exactly_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let repos = vec![
            RepositoryDescriptor {
                name: String::new(),
                owner: "acme".into(),
                path_with_namespace: "acme/bad0".into(),
                domain: "github.com".into(),
                https_url: "https://github.com/acme/bad0.git".into(),
                ssh_url: None,
                url_with_token: None,
                url_with_basic_auth: None,
            },
            RepositoryDescriptor {
                name: String::new(),
                owner: "acme".into(),
                path_with_namespace: "acme/bad1".into(),
                domain: "github.com".into(),
                https_url: "https://github.com/acme/bad1.git".into(),
                ssh_url: None,
                url_with_token: None,
                url_with_basic_auth: None,
            },
        ];

        let result = run_with_repos(config(dir.path().to_path_buf(), 2), repos).await;
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.failed_count(), 2);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_reports_every_repo_as_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let repos = vec![RepositoryDescriptor {
            name: "repo0".into(),
            owner: "acme".into(),
            path_with_namespace: "acme/repo0".into(),
            domain: "github.com".into(),
            https_url: "https://github.com/acme/repo0.git".into(),
            ssh_url: None,
            url_with_token: None,
            url_with_basic_auth: None,
        }];

        let (handle, cancel_rx) = new_cancellation();
        handle.cancel();

        let result = run_with_repos_cancellable(config(dir.path().to_path_buf(), 1), repos, cancel_rx).await;
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].error_kind,
            Some(crate::result::ErrorKindWire::Cancelled)
        );
    }
}
