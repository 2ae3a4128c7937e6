//! Manifest — an optional sidecar recording the ref set and bundle hash of a
//! backup, so a later run can skip re-cloning without opening the (possibly
//! encrypted) bundle itself.
//!
//! JSON via `serde_json` is the concrete wire format. The sidecar is
//! encrypted in lockstep with its bundle, named `<repoName>.<timestamp>.manifest`
//! or `.manifest.age`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BackupError, Result};

/// Ref name -> commit OID, plus the bundle's own hash and creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub refs: BTreeMap<String, String>,
    pub bundle_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// `<segment>.<timestamp>.manifest` or `.manifest.age` when the sidecar is
/// encrypted alongside its bundle.
pub fn manifest_file_name(segment: &str, raw_timestamp: &str, encrypted: bool) -> String {
    if encrypted {
        format!("{segment}.{raw_timestamp}.manifest.age")
    } else {
        format!("{segment}.{raw_timestamp}.manifest")
    }
}

impl Manifest {
    pub fn new(refs: BTreeMap<String, String>, bundle_bytes: &[u8], created_at: DateTime<Utc>) -> Self {
        Self {
            refs,
            bundle_sha256: sha256_hex(bundle_bytes),
            created_at,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write this manifest to `path`, encrypting under `passphrase` when one
    /// is supplied — the sidecar follows the bundle's own encryption mode.
    pub fn write(&self, path: &Path, passphrase: Option<&str>) -> Result<()> {
        let json = self.to_json()?;
        match passphrase {
            Some(passphrase) => {
                let blob = crate::encryption::encrypt(json.as_bytes(), passphrase)?;
                std::fs::write(path, blob)?;
            }
            None => std::fs::write(path, json)?,
        }
        Ok(())
    }

    /// Read a manifest from `path`, transparently decrypting `.age` sidecars
    /// under `passphrase`.
    ///
    /// Returns `Ok(None)`, not an error, when the sidecar is encrypted but no
    /// passphrase is configured: a manifest the caller cannot read is
    /// treated as absent here. (The bundle itself is a separate matter — see
    /// [`crate::ref_probe::probe_bundle`], which does attempt to open an
    /// opaque bundle directly once a passphrase is known.)
    pub fn read(path: &Path, passphrase: Option<&str>) -> Result<Option<Self>> {
        let is_encrypted = path.extension().and_then(|e| e.to_str()) == Some("age");
        if is_encrypted {
            let Some(passphrase) = passphrase else {
                return Ok(None);
            };
            let blob = std::fs::read(path)?;
            let plaintext = crate::encryption::decrypt(&blob, passphrase)?;
            let text = String::from_utf8(plaintext)
                .map_err(|e| BackupError::corrupt(format!("decrypted manifest is not valid UTF-8: {e}")))?;
            Ok(Some(Self::from_json(&text)?))
        } else {
            let text = std::fs::read_to_string(path)?;
            Ok(Some(Self::from_json(&text)?))
        }
    }

    /// Whether this manifest's recorded bundle hash matches the bundle bytes
    /// on disk — used to detect a manifest that has drifted from its bundle;
    /// only a matching manifest is trusted.
    pub fn matches_bundle(&self, bundle_bytes: &[u8]) -> bool {
        self.bundle_sha256 == sha256_hex(bundle_bytes)
    }

    /// True when `other`'s ref set is identical to this one, restricted to
    /// `refs/heads`, `refs/tags`, and `refs/remotes` — callers build both
    /// maps already filtered this way.
    pub fn refs_equal(&self, other: &BTreeMap<String, String>) -> bool {
        &self.refs == other
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self {
        BackupError::corrupt(format!("manifest is not valid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_refs() -> BTreeMap<String, String> {
        let mut refs = BTreeMap::new();
        refs.insert("refs/heads/main".to_string(), "a".repeat(40));
        refs.insert("refs/tags/v1".to_string(), "b".repeat(40));
        refs
    }

    #[test]
    fn round_trips_through_json() {
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        let json = manifest.to_json().unwrap();
        let parsed = Manifest::from_json(&json).unwrap();
        assert_eq!(manifest, parsed);
    }

    #[test]
    fn manifest_file_name_reflects_encryption_mode() {
        assert_eq!(manifest_file_name("repo0", "20200101010101", false), "repo0.20200101010101.manifest");
        assert_eq!(manifest_file_name("repo0", "20200101010101", true), "repo0.20200101010101.manifest.age");
    }

    #[test]
    fn write_and_read_round_trip_plaintext() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo0.20200101010101.manifest");
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        manifest.write(&path, None).unwrap();

        let read_back = Manifest::read(&path, None).unwrap().unwrap();
        assert_eq!(manifest, read_back);
    }

    #[test]
    fn write_and_read_round_trip_encrypted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo0.20200101010101.manifest.age");
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        manifest.write(&path, Some("hunter2")).unwrap();

        let read_back = Manifest::read(&path, Some("hunter2")).unwrap().unwrap();
        assert_eq!(manifest, read_back);
    }

    #[test]
    fn encrypted_manifest_without_passphrase_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repo0.20200101010101.manifest.age");
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        manifest.write(&path, Some("hunter2")).unwrap();

        let read_back = Manifest::read(&path, None).unwrap();
        assert!(read_back.is_none());
    }

    #[test]
    fn matches_bundle_detects_drift() {
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        assert!(manifest.matches_bundle(b"bundle bytes"));
        assert!(!manifest.matches_bundle(b"different bytes"));
    }

    #[test]
    fn refs_equal_compares_filtered_maps() {
        let manifest = Manifest::new(sample_refs(), b"bundle bytes", Utc::now());
        assert!(manifest.refs_equal(&sample_refs()));

        let mut changed = sample_refs();
        changed.insert("refs/heads/main".to_string(), "c".repeat(40));
        assert!(!manifest.refs_equal(&changed));
    }

    #[test]
    fn corrupt_json_fails_to_parse() {
        let result = Manifest::from_json("not json at all");
        assert!(result.is_err());
    }
}
