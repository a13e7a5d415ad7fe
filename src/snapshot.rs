//! Snapshot engine: timestamped copies of the root document and its
//! resolved modules, with restore.
//!
//! Layout under the configuration root:
//!
//! ```text
//! .hydra_backups/
//!   20250101_120000_before-sweep/
//!     meta.json          {tag, timestamp, modules: [relative paths]}
//!     config.yaml
//!     model/resnet.yaml
//! ```
//!
//! Individual copy failures are absorbed and only shrink the manifest.
//! Restoring requires a readable manifest.

use crate::config::BackupSettings;
use crate::error::SnapshotError;
use crate::modules::ModuleResolver;
use crate::paths;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest written into every snapshot directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub tag: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Copied files, relative to the configuration root, forward-slashed.
    pub modules: Vec<String>,
}

impl SnapshotMeta {
    pub fn created_at(&self) -> Option<DateTime<Local>> {
        let micros = (self.timestamp * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros).map(|dt| dt.with_timezone(&Local))
    }
}

/// A listed snapshot: its manifest plus the directory it lives in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub meta: SnapshotMeta,
    pub path: PathBuf,
}

/// Outcome of a restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// The safety snapshot taken before anything was overwritten.
    pub pre_restore: PathBuf,
    pub restored: Vec<String>,
    /// Manifest entries missing from the snapshot or escaping the root.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotManager {
    config_root: PathBuf,
    backup_root: PathBuf,
    settings: BackupSettings,
}

impl SnapshotManager {
    pub fn new(config_root: impl AsRef<Path>, settings: BackupSettings) -> Self {
        let config_root = paths::absolute(config_root.as_ref());
        Self {
            backup_root: config_root.join(&settings.dir_name),
            config_root,
            settings,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Snapshot the resolver's current root document and resolved modules.
    pub fn create(&self, tag: &str, resolver: &ModuleResolver) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.backup_root)
            .map_err(|e| SnapshotError::io(&self.backup_root, e))?;

        let now = Local::now();
        let snapshot_dir = self.reserve_dir(&format!(
            "{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            sanitize_tag(tag)
        ))?;

        let mut sources: Vec<PathBuf> = Vec::new();
        if let Some(root) = resolver.root_document() {
            sources.push(root);
        }
        sources.extend(
            resolver
                .resolve_current()
                .into_iter()
                .filter_map(|module| module.path),
        );

        let mut copied: Vec<String> = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(rel) = paths::relative_slash_path(&self.config_root, &source) else {
                warn!(path = %source.display(), "Skipping file outside the configuration root");
                continue;
            };
            if copied.contains(&rel) {
                continue;
            }
            let Some(dest) = paths::sandboxed_join(&snapshot_dir, &rel) else {
                continue;
            };
            match copy_file(&source, &dest) {
                Ok(()) => copied.push(rel),
                Err(e) => {
                    warn!(path = %source.display(), error = %e, "Skipping file that could not be copied");
                }
            }
        }

        let meta = SnapshotMeta {
            tag: tag.to_string(),
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            modules: copied,
        };
        let manifest = snapshot_dir.join(&self.settings.manifest_name);
        let json = serde_json::to_string_pretty(&meta).map_err(|source| {
            SnapshotError::ManifestInvalid {
                path: manifest.clone(),
                source,
            }
        })?;
        fs::write(&manifest, json).map_err(|e| SnapshotError::io(&manifest, e))?;

        info!(
            path = %snapshot_dir.display(),
            tag,
            files = meta.modules.len(),
            "Created snapshot"
        );
        Ok(snapshot_dir)
    }

    /// Every snapshot with a valid manifest, newest first.
    pub fn list_snapshots(&self) -> Vec<SnapshotEntry> {
        let entries = match fs::read_dir(&self.backup_root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %self.backup_root.display(), error = %e, "Cannot list snapshots");
                }
                return Vec::new();
            }
        };

        let mut snapshots: Vec<SnapshotEntry> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path| match self.read_manifest(&path) {
                Ok(meta) => Some(SnapshotEntry { meta, path }),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Ignoring directory without a valid manifest");
                    None
                }
            })
            .collect();

        snapshots.sort_by(|a, b| b.meta.timestamp.total_cmp(&a.meta.timestamp));
        snapshots
    }

    /// Restore a snapshot over the live tree.
    ///
    /// A safety snapshot of the current state is always taken first. Only a
    /// missing or unreadable manifest is an error; files absent from the
    /// snapshot are skipped.
    pub fn restore(
        &self,
        snapshot_dir: &Path,
        resolver: &ModuleResolver,
    ) -> Result<RestoreReport, SnapshotError> {
        let pre_restore = self.create(&self.settings.pre_restore_tag, resolver)?;
        let meta = self.read_manifest(snapshot_dir)?;

        let mut restored = Vec::new();
        let mut skipped = Vec::new();
        for rel in meta.modules {
            let pair = paths::sandboxed_join(snapshot_dir, &rel)
                .zip(paths::sandboxed_join(&self.config_root, &rel));
            let Some((source, dest)) = pair.filter(|(source, _)| source.is_file()) else {
                debug!(file = %rel, "Snapshot file missing, skipped");
                skipped.push(rel);
                continue;
            };
            match copy_file(&source, &dest) {
                Ok(()) => restored.push(rel),
                Err(e) => {
                    warn!(file = %rel, error = %e, "Failed to restore file");
                    skipped.push(rel);
                }
            }
        }

        info!(
            snapshot = %snapshot_dir.display(),
            restored = restored.len(),
            skipped = skipped.len(),
            "Restored snapshot"
        );
        Ok(RestoreReport {
            pre_restore,
            restored,
            skipped,
        })
    }

    fn read_manifest(&self, snapshot_dir: &Path) -> Result<SnapshotMeta, SnapshotError> {
        let path = snapshot_dir.join(&self.settings.manifest_name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::ManifestMissing { path });
            }
            Err(e) => return Err(SnapshotError::io(&path, e)),
        };
        serde_json::from_str(&text).map_err(|source| SnapshotError::ManifestInvalid { path, source })
    }

    /// Create a fresh snapshot directory, suffixing the name on collision.
    fn reserve_dir(&self, base: &str) -> Result<PathBuf, SnapshotError> {
        let mut candidate = self.backup_root.join(base);
        let mut attempt = 1;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = self.backup_root.join(format!("{base}_{attempt}"));
                    attempt += 1;
                }
                Err(e) => return Err(SnapshotError::io(&candidate, e)),
            }
        }
    }
}

fn copy_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, dest).map(|_| ())
}

/// Keep a tag usable as part of a directory name.
fn sanitize_tag(tag: &str) -> String {
    let cleaned: String = tag
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "snapshot".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PRE_RESTORE_TAG;
    use tempfile::TempDir;

    fn tree() -> (TempDir, ModuleResolver, SnapshotManager) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("model")).unwrap();
        fs::write(root.join("model/resnet.yaml"), "depth: 50\n").unwrap();
        fs::write(
            root.join("config.yaml"),
            "defaults:\n  - model: resnet\n  - db: missing\n",
        )
        .unwrap();
        let resolver = ModuleResolver::new(root);
        let manager = SnapshotManager::new(root, BackupSettings::default());
        (temp, resolver, manager)
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("before sweep/2"), "before_sweep_2");
        assert_eq!(sanitize_tag("v1.2-rc"), "v1.2-rc");
        assert_eq!(sanitize_tag(".."), "snapshot");
        assert_eq!(sanitize_tag(""), "snapshot");
    }

    #[test]
    fn test_create_copies_root_and_resolved_modules() {
        let (_temp, resolver, manager) = tree();
        let dir = manager.create("t", &resolver).unwrap();
        assert!(dir.starts_with(manager.backup_root()));
        assert!(dir.file_name().unwrap().to_string_lossy().ends_with("_t"));

        let meta = manager.read_manifest(&dir).unwrap();
        assert_eq!(meta.tag, "t");
        assert_eq!(meta.modules, vec!["config.yaml", "model/resnet.yaml"]);
        assert!(dir.join("model/resnet.yaml").is_file());
        assert!(meta.created_at().is_some());
    }

    #[test]
    fn test_same_second_snapshots_do_not_collide() {
        let (_temp, resolver, manager) = tree();
        let a = manager.create("same", &resolver).unwrap();
        let b = manager.create("same", &resolver).unwrap();
        assert_ne!(a, b);
        assert_eq!(manager.list_snapshots().len(), 2);
    }

    #[test]
    fn test_list_skips_invalid_and_sorts_newest_first() {
        let (_temp, resolver, manager) = tree();
        manager.create("a", &resolver).unwrap();
        fs::create_dir_all(manager.backup_root().join("junk")).unwrap();
        let bad = manager.backup_root().join("bad");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("meta.json"), "{not json").unwrap();

        let old = manager.backup_root().join("old");
        fs::create_dir_all(&old).unwrap();
        fs::write(
            old.join("meta.json"),
            r#"{"tag": "old", "timestamp": 1.0, "modules": []}"#,
        )
        .unwrap();

        let tags: Vec<String> = manager
            .list_snapshots()
            .into_iter()
            .map(|s| s.meta.tag)
            .collect();
        assert_eq!(tags, vec!["a", "old"]);
    }

    #[test]
    fn test_restore_without_manifest_fails_after_safety_backup() {
        let (_temp, resolver, manager) = tree();
        let empty = manager.backup_root().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let err = manager.restore(&empty, &resolver).unwrap_err();
        assert!(matches!(err, SnapshotError::ManifestMissing { .. }));
        assert!(
            manager
                .list_snapshots()
                .iter()
                .any(|s| s.meta.tag == DEFAULT_PRE_RESTORE_TAG)
        );
    }

    #[test]
    fn test_restore_skips_missing_and_escaping_entries() {
        let (temp, resolver, manager) = tree();
        let dir = manager.backup_root().join("manual");
        fs::create_dir_all(dir.join("model")).unwrap();
        fs::write(dir.join("model/resnet.yaml"), "depth: 18\n").unwrap();
        fs::write(
            dir.join("meta.json"),
            r#"{"tag": "m", "timestamp": 2.0, "modules": ["model/resnet.yaml", "gone.yaml", "../outside.yaml"]}"#,
        )
        .unwrap();

        let report = manager.restore(&dir, &resolver).unwrap();
        assert_eq!(report.restored, vec!["model/resnet.yaml"]);
        assert_eq!(report.skipped, vec!["gone.yaml", "../outside.yaml"]);
        assert_eq!(
            fs::read_to_string(temp.path().join("model/resnet.yaml")).unwrap(),
            "depth: 18\n"
        );
    }
}
