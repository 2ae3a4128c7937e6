//! Provider Enumerator — the interface between a specific hosting provider's
//! API and the backup pipeline, plus a trivial demonstration/test double.
//!
//! Concrete provider REST/GraphQL clients aren't implemented here;
//! `FileEnumerator` below is a fixture that lets the rest of the system be
//! exercised without a network.

use async_trait::async_trait;

use crate::config::ProviderKind;
use crate::error::{BackupError, Result};
use crate::repository::RepositoryDescriptor;

/// What a backup run needs from a hosting provider: the list of
/// repositories to back up, plus enough identity to name the backup
/// subdirectory and apply provider-specific pacing.
#[async_trait]
pub trait Enumerator: Send + Sync {
    /// List every repository this enumerator is configured to cover. A
    /// partial failure (one organisation's listing call failing) should
    /// still return whatever repositories were successfully discovered —
    /// enumeration is best-effort across namespaces; a total failure (e.g.
    /// an invalid token) returns `Err`.
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>>;

    fn api_url(&self) -> &str;

    fn provider(&self) -> ProviderKind;

    fn canonical_provider_name(&self) -> &'static str {
        self.provider().canonical_name()
    }
}

/// A demonstration/test double that reads a JSON array of
/// [`RepositoryDescriptor`] from a local file instead of calling a
/// provider's API. Exists for manual exercise of the pipeline and for
/// integration tests.
pub struct FileEnumerator {
    path: std::path::PathBuf,
    provider: ProviderKind,
    api_url: String,
}

impl FileEnumerator {
    pub fn new(path: impl Into<std::path::PathBuf>, provider: ProviderKind, api_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl Enumerator for FileEnumerator {
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            BackupError::config(format!(
                "failed to read repository list {}: {e}",
                self.path.display()
            ))
        })?;
        let descriptors: Vec<RepositoryDescriptor> = serde_json::from_str(&text).map_err(|e| {
            BackupError::config(format!(
                "repository list {} is not valid JSON: {e}",
                self.path.display()
            ))
        })?;
        for descriptor in &descriptors {
            descriptor.validate()?;
        }
        Ok(descriptors)
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }
}
