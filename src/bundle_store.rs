//! Bundle Store — the on-disk directory of `.bundle`/`.bundle.age` files for
//! one repository, plus their manifest sidecars: list, keep-N-newest, remove
//! the rest. Filenames follow a content-addressable grammar rather than git
//! refs, so matching/parsing goes through a `regex` instead of a ref-name
//! split.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{BackupError, Result};

const TIMESTAMP_DIGITS: usize = 14;

/// `<segment>.<digit-run>.bundle[.age]`, where `segment` is the repository
/// name. The digit run is matched at any length here — a 14-digit civil
/// timestamp is the only one actually valid, but a file with some other
/// length is still a *candidate* bundle (not an unrelated file) and must be
/// quarantined rather than silently ignored. Length and parseability are
/// both checked by the caller, not by this regex.
fn bundle_regex() -> Regex {
    Regex::new(r"^(?P<segment>.+)\.(?P<ts>\d+)\.bundle(?P<age>\.age)?$").unwrap()
}

/// A bundle file discovered on disk, with its timestamp already parsed.
#[derive(Debug, Clone)]
pub struct BundleRef {
    pub path: PathBuf,
    pub segment: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub raw_timestamp: String,
    pub encrypted: bool,
}

impl BundleRef {
    /// The manifest sidecar path this bundle would carry, if any
    /// (`<segment>.<timestamp>.manifest` or `.manifest.age` matching the
    /// bundle's own encryption mode).
    pub fn manifest_path(&self) -> PathBuf {
        self.path
            .with_file_name(crate::manifest::manifest_file_name(&self.segment, &self.raw_timestamp, self.encrypted))
    }

    /// The LFS archive sidecar this bundle would carry, if LFS archival was
    /// requested for this backup (`<segment>.<timestamp>.lfs.tar`, never
    /// encrypted).
    pub fn lfs_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!("{}.{}.lfs.tar", self.segment, self.raw_timestamp))
    }
}

/// Format a `chrono` UTC instant as the on-disk 14-digit civil timestamp.
pub fn format_timestamp(at: chrono::DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// List every valid bundle in `dir` for `segment` (the repository name),
/// quarantining anything that matches the grammar as a timestamp *candidate*
/// but whose digit run isn't exactly 14 digits or doesn't parse as a civil
/// time, and silently skipping anything that doesn't match the grammar at
/// all.
///
/// A missing directory yields an empty list rather than an error — a brand
/// new repository has nothing to compare against yet.
pub fn list_valid_bundles(dir: &Path, segment: &str) -> Result<Vec<BundleRef>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let re = bundle_regex();
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        let Some(caps) = re.captures(name) else { continue };
        if &caps["segment"] != segment {
            continue;
        }
        let raw_ts = caps["ts"].to_string();
        if raw_ts.len() != TIMESTAMP_DIGITS {
            quarantine(&entry.path());
            continue;
        }
        match parse_timestamp(&raw_ts) {
            Some(timestamp) => out.push(BundleRef {
                path: entry.path(),
                segment: segment.to_string(),
                timestamp,
                raw_timestamp: raw_ts,
                encrypted: caps.name("age").is_some(),
            }),
            None => {
                quarantine(&entry.path());
            }
        }
    }
    out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));
    Ok(out)
}

/// The most recent bundle, breaking ties on equal timestamps alphabetically
/// by filename.
pub fn latest_bundle(dir: &Path, segment: &str) -> Result<Option<BundleRef>> {
    Ok(list_valid_bundles(dir, segment)?.into_iter().last())
}

/// Best-effort rename to `<name>.invalid`, always normalising on rename
/// rather than deleting outright. Never propagates a failure — a
/// corrupt/unreadable file should not abort an otherwise-successful listing.
pub fn quarantine(path: &Path) {
    let quarantined = path.with_extension(format!(
        "{}.invalid",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    let _ = std::fs::rename(path, quarantined);
}

/// Remove all bundles/sidecars except the `keep` newest, oldest-first.
/// `keep = 0` means prune nothing and is a deliberate no-op —
/// `backups_to_retain = 0` means "unlimited".
pub fn prune(dir: &Path, segment: &str, keep: u32) -> Result<Vec<PathBuf>> {
    if keep == 0 {
        return Ok(Vec::new());
    }
    let bundles = list_valid_bundles(dir, segment)?;
    let keep = keep as usize;
    if bundles.len() <= keep {
        return Ok(Vec::new());
    }
    let to_remove = &bundles[..bundles.len() - keep];
    let mut removed = Vec::new();
    for bundle in to_remove {
        let manifest = bundle.manifest_path();
        if manifest.exists() {
            std::fs::remove_file(&manifest)?;
            removed.push(manifest);
        }
        let lfs_tar = bundle.lfs_path();
        if lfs_tar.exists() {
            std::fs::remove_file(&lfs_tar)?;
            removed.push(lfs_tar);
        }
        std::fs::remove_file(&bundle.path)?;
        removed.push(bundle.path.clone());
    }
    Ok(removed)
}

/// Publish a freshly written bundle by renaming it into place atomically.
/// `tmp_path` and `final_path` must be on the same filesystem, which the
/// worker guarantees by writing into a `.working` subdirectory of
/// `backup_dir`.
pub fn publish(tmp_path: &Path, final_path: &Path) -> Result<()> {
    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(tmp_path, final_path).map_err(|e| {
        BackupError::filesystem(format!(
            "failed to publish bundle {} -> {}: {e}",
            tmp_path.display(),
            final_path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"bundle contents").unwrap();
    }

    #[test]
    fn missing_directory_yields_empty_list() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let bundles = list_valid_bundles(&missing, "repo0").unwrap();
        assert!(bundles.is_empty());
    }

    #[test]
    fn lists_and_sorts_by_timestamp() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.20200101010101.bundle");
        touch(dir.path(), "repo0.20210101010101.bundle.age");
        touch(dir.path(), "other.20220101010101.bundle");

        let bundles = list_valid_bundles(dir.path(), "repo0").unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].raw_timestamp, "20200101010101");
        assert_eq!(bundles[1].raw_timestamp, "20210101010101");
        assert!(bundles[1].encrypted);
    }

    #[test]
    fn latest_bundle_picks_most_recent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.20200101010101.bundle");
        touch(dir.path(), "repo0.20210101010101.bundle");

        let latest = latest_bundle(dir.path(), "repo0").unwrap().unwrap();
        assert_eq!(latest.raw_timestamp, "20210101010101");
    }

    #[test]
    fn malformed_timestamp_is_quarantined() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.99999999999999.bundle");

        let bundles = list_valid_bundles(dir.path(), "repo0").unwrap();
        assert!(bundles.is_empty());
        assert!(dir.path().join("repo0.99999999999999.bundle.invalid").exists());
    }

    #[test]
    fn fifteen_digit_timestamp_is_quarantined_not_skipped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.202001010101011.bundle");

        let bundles = list_valid_bundles(dir.path(), "repo0").unwrap();
        assert!(bundles.is_empty());
        assert!(dir.path().join("repo0.202001010101011.bundle.invalid").exists());
    }

    #[test]
    fn short_digit_run_is_also_quarantined() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.2020.bundle");

        let bundles = list_valid_bundles(dir.path(), "repo0").unwrap();
        assert!(bundles.is_empty());
        assert!(dir.path().join("repo0.2020.bundle.invalid").exists());
    }

    #[test]
    fn prune_zero_keep_is_noop() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.20200101010101.bundle");
        let removed = prune(dir.path(), "repo0", 0).unwrap();
        assert!(removed.is_empty());
        assert!(dir.path().join("repo0.20200101010101.bundle").exists());
    }

    #[test]
    fn prune_removes_oldest_first_and_its_manifest() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.20200101010101.bundle");
        touch(dir.path(), "repo0.20200101010101.manifest");
        touch(dir.path(), "repo0.20210101010101.bundle");
        touch(dir.path(), "repo0.20220101010101.bundle");

        let removed = prune(dir.path(), "repo0", 2).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("repo0.20200101010101.bundle").exists());
        assert!(!dir.path().join("repo0.20200101010101.manifest").exists());
        assert!(dir.path().join("repo0.20210101010101.bundle").exists());
        assert!(dir.path().join("repo0.20220101010101.bundle").exists());
    }

    #[test]
    fn prune_removes_the_lfs_sidecar_too() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "repo0.20200101010101.bundle");
        touch(dir.path(), "repo0.20200101010101.lfs.tar");
        touch(dir.path(), "repo0.20210101010101.bundle");

        let removed = prune(dir.path(), "repo0", 1).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("repo0.20200101010101.lfs.tar").exists());
        assert!(dir.path().join("repo0.20210101010101.bundle").exists());
    }

    #[test]
    fn publish_renames_into_place_and_creates_parent() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("scratch.bundle");
        std::fs::write(&tmp, b"data").unwrap();
        let dest = dir.path().join("nested/repo0.20200101010101.bundle");

        publish(&tmp, &dest).unwrap();
        assert!(dest.exists());
        assert!(!tmp.exists());
    }
}
