//! Error & result model for the backup pipeline.
//!
//! Every fallible operation inside a single repository's backup returns a
//! typed [`BackupError`]. At the edges (config loading, one-off filesystem
//! helpers) `anyhow::Result` is still used; `anyhow` handles plumbing while
//! this closed enum covers the one contract callers actually need to match
//! on.

use thiserror::Error;

/// Classification of a repository-scoped failure.
///
/// Exactly one kind is attached to any given [`BackupError`] or
/// [`BackupResultRecord`](crate::result::BackupResultRecord).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
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

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::EnumerationFailed => "enumeration_failed",
            ErrorKind::NetworkUnavailable => "network_unavailable",
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::GitToolFailure => "git_tool_failure",
            ErrorKind::EmptyRepository => "empty_repository",
            ErrorKind::EncryptionFailure => "encryption_failure",
            ErrorKind::CorruptArtifact => "corrupt_artifact",
            ErrorKind::FilesystemError => "filesystem_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified, repository-scoped failure.
///
/// The `message` is expected to already have secrets masked by the caller
/// (see [`crate::logging::MaskTable`]) before this error is constructed from
/// subprocess stderr or similar untrusted text.
#[derive(Debug, Error, Clone)]
#[error("{kind}: {message}")]
pub struct BackupError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackupError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkUnavailable, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRequired, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    pub fn git_tool(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GitToolFailure, message)
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EncryptionFailure, message)
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptArtifact, message)
    }

    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FilesystemError, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }
}

impl From<std::io::Error> for BackupError {
    fn from(e: std::io::Error) -> Self {
        BackupError::filesystem(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
