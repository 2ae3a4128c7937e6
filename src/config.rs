//! Per-provider host configuration contract.
//!
//! This is deliberately a thin `serde`/`toml` deserialisation layer: plain
//! structs with `#[serde(default = "...")]` per field, no hand-rolled
//! parser. Loading secrets from environment/secrets files is the CLI's or
//! enumerator's job, out of scope for the core.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Strategy for deciding whether a fresh bundle is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffRemoteMethod {
    /// Always produce a new bundle.
    Clone,
    /// Skip when remote refs equal those of the latest bundle/manifest.
    Refs,
}

impl Default for DiffRemoteMethod {
    fn default() -> Self {
        DiffRemoteMethod::Clone
    }
}

/// Parse a `diff_remote_method` string, collapsing any unrecognised value to
/// `clone` rather than rejecting it outright.
///
/// Returns the parsed method plus whether the input was recognised, so the
/// caller can log a warning on the unrecognised path without this function
/// reaching into a logger itself.
pub fn parse_diff_remote_method(raw: &str) -> (DiffRemoteMethod, bool) {
    match raw.to_ascii_lowercase().as_str() {
        "clone" => (DiffRemoteMethod::Clone, true),
        "refs" => (DiffRemoteMethod::Refs, true),
        _ => (DiffRemoteMethod::Clone, false),
    }
}

/// Deserialise `diff_remote_method` from its raw TOML string via
/// [`parse_diff_remote_method`], so an unrecognised value collapses to
/// `clone` with a warning instead of failing the whole config load.
fn deserialize_diff_remote_method<'de, D>(deserializer: D) -> std::result::Result<DiffRemoteMethod, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let (method, recognised) = parse_diff_remote_method(&raw);
    if !recognised {
        eprintln!("warning: unrecognised diff_remote_method '{raw}', falling back to 'clone'");
    }
    Ok(method)
}

fn default_backup_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./backups")
}

fn default_backups_to_retain() -> u32 {
    0
}

fn default_pool_size() -> usize {
    5
}

fn default_http_timeout_secs() -> u64 {
    120
}

fn default_http_retries() -> u32 {
    2
}

fn default_log_level() -> i64 {
    2
}

/// Which hosting provider this configuration targets.
///
/// Concrete enumerator clients (the `gh`/`glab`-equivalent REST/GraphQL
/// collaborators) are out of scope for the core; this enum exists so it can
/// name the provider for directory layout and pacing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
    AzureDevOps,
    Sourcehut,
}

impl ProviderKind {
    /// Top-level directory name under `<backupRoot>`.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
            ProviderKind::Bitbucket => "bitbucket",
            ProviderKind::Gitea => "gitea",
            ProviderKind::AzureDevOps => "azuredevops",
            ProviderKind::Sourcehut => "sourcehut",
        }
    }

    /// Default post-repo pacing sleep: Gitea defaults to 500ms to avoid
    /// tripping per-IP rate limits, every other provider defaults to no
    /// sleep.
    pub fn default_pacing(&self) -> std::time::Duration {
        match self {
            ProviderKind::Gitea => std::time::Duration::from_millis(500),
            _ => std::time::Duration::ZERO,
        }
    }
}

/// Set of organisations/namespaces an enumerator should list, or the
/// wildcard meaning "all orgs visible to this token".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrgFilter {
    All(WildcardAll),
    Named(Vec<String>),
}

/// Marker type that only deserialises from the literal string `"*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildcardAll;

impl Serialize for WildcardAll {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("*")
    }
}

impl<'de> Deserialize<'de> for WildcardAll {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "*" {
            Ok(WildcardAll)
        } else {
            Err(serde::de::Error::custom("expected the literal wildcard \"*\""))
        }
    }
}

/// The per-provider host configuration contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_url: String,
    /// Never logged; only ever handed to [`crate::logging::MaskTable`] and to
    /// the enumerator that stamps `url_with_token`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: std::path::PathBuf,
    #[serde(default = "default_backups_to_retain")]
    pub backups_to_retain: u32,
    #[serde(default, deserialize_with = "deserialize_diff_remote_method")]
    pub diff_remote_method: DiffRemoteMethod,
    #[serde(default)]
    pub orgs: Option<OrgFilter>,
    #[serde(default)]
    pub backup_lfs: bool,
    #[serde(default)]
    #[serde(skip_serializing)]
    pub encryption_passphrase: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: i64,
    #[serde(default = "default_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_http_retries")]
    pub http_retries: u32,
}

impl ProviderConfig {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_i64(self.log_level)
    }

    /// All provider-level configured secrets, for seeding a
    /// [`crate::logging::MaskTable`] once per pipeline run. Per-repository
    /// credentials embedded in a descriptor's URLs are registered
    /// separately, as each descriptor is handled.
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if let Some(token) = &self.token {
            secrets.push(token.clone());
        }
        if let Some(passphrase) = &self.encryption_passphrase {
            secrets.push(passphrase.clone());
        }
        secrets
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_diff_method_collapses_to_clone() {
        let (method, recognised) = parse_diff_remote_method("bogus");
        assert_eq!(method, DiffRemoteMethod::Clone);
        assert!(!recognised);
    }

    #[test]
    fn known_diff_methods_round_trip() {
        assert_eq!(parse_diff_remote_method("clone").0, DiffRemoteMethod::Clone);
        assert_eq!(parse_diff_remote_method("refs").0, DiffRemoteMethod::Refs);
        assert_eq!(parse_diff_remote_method("REFS").0, DiffRemoteMethod::Refs);
    }

    #[test]
    fn deserialises_minimal_toml_with_defaults() {
        let toml_content = r#"
provider = "github"
api_url = "https://api.github.com"
"#;
        let config = ProviderConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.provider, ProviderKind::GitHub);
        assert_eq!(config.backups_to_retain, 0);
        assert_eq!(config.diff_remote_method, DiffRemoteMethod::Clone);
        assert_eq!(config.worker_pool_size, 5);
        assert!(!config.backup_lfs);
    }

    #[test]
    fn unrecognised_diff_remote_method_in_toml_collapses_to_clone() {
        let toml_content = r#"
provider = "github"
api_url = "https://api.github.com"
diff_remote_method = "bogus"
"#;
        let config = ProviderConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.diff_remote_method, DiffRemoteMethod::Clone);
    }

    #[test]
    fn recognised_diff_remote_method_in_toml_is_honoured() {
        let toml_content = r#"
provider = "github"
api_url = "https://api.github.com"
diff_remote_method = "refs"
"#;
        let config = ProviderConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.diff_remote_method, DiffRemoteMethod::Refs);
    }

    #[test]
    fn deserialises_wildcard_orgs() {
        let toml_content = r#"
provider = "gitea"
api_url = "https://gitea.example.com"
orgs = "*"
"#;
        let config = ProviderConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.orgs, Some(OrgFilter::All(WildcardAll)));
    }

    #[test]
    fn deserialises_named_orgs() {
        let toml_content = r#"
provider = "gitlab"
api_url = "https://gitlab.com"
orgs = ["acme", "widgets"]
"#;
        let config = ProviderConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.orgs,
            Some(OrgFilter::Named(vec!["acme".to_string(), "widgets".to_string()]))
        );
    }

    #[test]
    fn gitea_default_pacing_is_500ms() {
        assert_eq!(
            ProviderKind::Gitea.default_pacing(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(ProviderKind::GitHub.default_pacing(), std::time::Duration::ZERO);
    }

    #[test]
    fn secrets_collects_token_and_passphrase() {
        let mut config = ProviderConfig::from_toml_str(
            r#"
provider = "github"
api_url = "https://api.github.com"
"#,
        )
        .unwrap();
        config.token = Some("ghp_abc".into());
        config.encryption_passphrase = Some("hunter2".into());
        let secrets = config.secrets();
        assert!(secrets.contains(&"ghp_abc".to_string()));
        assert!(secrets.contains(&"hunter2".to_string()));
    }
}
