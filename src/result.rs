//! Per-repository and per-provider result records.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Outcome of backing up a single repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Ok,
    Skipped,
    Failed,
}

/// Result of attempting to back up one repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResultRecord {
    pub repo_path_with_namespace: String,
    pub status: BackupStatus,
    pub bundle_file: Option<String>,
    pub error_kind: Option<ErrorKindWire>,
    pub error_message: Option<String>,
}

impl BackupResultRecord {
    pub fn ok(repo_path_with_namespace: impl Into<String>, bundle_file: impl Into<String>) -> Self {
        Self {
            repo_path_with_namespace: repo_path_with_namespace.into(),
            status: BackupStatus::Ok,
            bundle_file: Some(bundle_file.into()),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn skipped(repo_path_with_namespace: impl Into<String>) -> Self {
        Self {
            repo_path_with_namespace: repo_path_with_namespace.into(),
            status: BackupStatus::Skipped,
            bundle_file: None,
            error_kind: None,
            error_message: None,
        }
    }

    pub fn skipped_with_kind(repo_path_with_namespace: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            repo_path_with_namespace: repo_path_with_namespace.into(),
            status: BackupStatus::Skipped,
            bundle_file: None,
            error_kind: Some(kind.into()),
            error_message: None,
        }
    }

    pub fn failed(repo_path_with_namespace: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            repo_path_with_namespace: repo_path_with_namespace.into(),
            status: BackupStatus::Failed,
            bundle_file: None,
            error_kind: Some(kind.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Serialisable mirror of [`ErrorKind`] (the core enum intentionally has no
/// `serde` derive, since it is also used as a `match` target in hot code
/// paths where deriving `Deserialize` would be noise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKindWire {
    Config,
    EnumerationFailed,
    NetworkUnavailable,
    AuthRequired,
    ProtocolError,
    GitToolFailure,
    EmptyRepository,
    EncryptionFailure,
    CorruptArtifact,
    FilesystemError,
    Cancelled,
}

impl From<ErrorKind> for ErrorKindWire {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Config => ErrorKindWire::Config,
            ErrorKind::EnumerationFailed => ErrorKindWire::EnumerationFailed,
            ErrorKind::NetworkUnavailable => ErrorKindWire::NetworkUnavailable,
            ErrorKind::AuthRequired => ErrorKindWire::AuthRequired,
            ErrorKind::ProtocolError => ErrorKindWire::ProtocolError,
            ErrorKind::GitToolFailure => ErrorKindWire::GitToolFailure,
            ErrorKind::EmptyRepository => ErrorKindWire::EmptyRepository,
            ErrorKind::EncryptionFailure => ErrorKindWire::EncryptionFailure,
            ErrorKind::CorruptArtifact => ErrorKindWire::CorruptArtifact,
            ErrorKind::FilesystemError => ErrorKindWire::FilesystemError,
            ErrorKind::Cancelled => ErrorKindWire::Cancelled,
        }
    }
}

/// Aggregate result for one provider run: an ordered sequence of
/// per-repository records, plus an optional provider-level (enumeration)
/// error that short-circuited the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderBackupResult {
    pub records: Vec<BackupResultRecord>,
    pub provider_error: Option<String>,
}

impl ProviderBackupResult {
    pub fn enumeration_failed(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            provider_error: Some(message.into()),
        }
    }

    pub fn ok_count(&self) -> usize {
        self.records.iter().filter(|r| r.status == BackupStatus::Ok).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == BackupStatus::Skipped)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == BackupStatus::Failed)
            .count()
    }
}
