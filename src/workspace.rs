//! One engine instance per configuration root.
//!
//! A [`Workspace`] owns the root path, the loaded settings and the selected
//! root document. Everything else is read from disk on demand, so any method
//! may be called at any time and reflects the current tree.

use crate::compose::MergeEngine;
use crate::config::watcher::{WatchPaths, WatcherConfig};
use crate::config::{Settings, SettingsLoader};
use crate::error::{ResolveError, SnapshotError};
use crate::modules::{ConfigModule, ModuleResolver};
use crate::paths;
use crate::snapshot::{RestoreReport, SnapshotEntry, SnapshotManager};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Workspace {
    resolver: ModuleResolver,
    settings: Settings,
}

impl Workspace {
    /// Open a configuration root with settings loaded from the usual tiers.
    pub fn open(config_root: impl AsRef<Path>) -> Self {
        let config_root = config_root.as_ref();
        let settings = SettingsLoader::load(config_root).into_settings();
        Self::with_settings(config_root, settings)
    }

    pub fn with_settings(config_root: impl AsRef<Path>, settings: Settings) -> Self {
        let resolver = ModuleResolver::new(config_root);
        info!(root = %resolver.config_root().display(), "Opened workspace");
        Self { resolver, settings }
    }

    pub fn config_root(&self) -> &Path {
        self.resolver.config_root()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn select_root_document(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        debug!(path = %path.display(), "Selected root document");
        self.resolver.select_root_document(path);
    }

    /// The selected root document if it still exists, else the detected one.
    pub fn root_document(&self) -> Option<PathBuf> {
        self.resolver.root_document()
    }

    pub fn candidate_root_documents(&self) -> Vec<PathBuf> {
        self.resolver.list_candidate_root_documents()
    }

    /// Modules of the current root document, in defaults-list order.
    pub fn modules(&self) -> Vec<ConfigModule> {
        self.resolver.resolve_current()
    }

    /// Rendered YAML of the composed configuration. Never fails.
    pub fn merge(&self, overrides: &[String]) -> String {
        let engine = MergeEngine::new(self.config_root(), self.settings.merge.clone());
        engine.merge(self.root_document().as_deref(), overrides)
    }

    fn snapshots(&self) -> SnapshotManager {
        SnapshotManager::new(self.config_root(), self.settings.backups.clone())
    }

    pub fn create_snapshot(&self, tag: &str) -> Result<PathBuf, SnapshotError> {
        self.snapshots().create(tag, &self.resolver)
    }

    pub fn list_snapshots(&self) -> Vec<SnapshotEntry> {
        self.snapshots().list_snapshots()
    }

    pub fn restore_snapshot(&self, snapshot_dir: &Path) -> Result<RestoreReport, SnapshotError> {
        self.snapshots().restore(snapshot_dir, &self.resolver)
    }

    /// Rewrite a defaults entry, then re-resolve the module list.
    pub fn rewrite_entry(
        &self,
        old: &ConfigModule,
        new_group: &str,
        new_name: &str,
    ) -> Result<Vec<ConfigModule>, ResolveError> {
        self.resolver.rewrite_defaults_entry(old, new_group, new_name)?;
        Ok(self.modules())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config_root().join(&self.settings.backups.dir_name)
    }

    /// Every YAML file in the tree as a sorted, root-relative path.
    ///
    /// The backup directory and hidden entries are skipped.
    pub fn file_browser_entries(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_yaml_files(self.config_root(), &self.backup_dir(), &mut files);
        let mut entries: Vec<String> = files
            .iter()
            .filter_map(|p| paths::relative_slash_path(self.config_root(), p))
            .collect();
        entries.sort();
        entries
    }

    pub fn watch_paths(&self) -> WatchPaths {
        WatchPaths {
            config_root: self.config_root().to_path_buf(),
            backup_dir: self.backup_dir(),
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            debounce_duration: self.settings.watch.debounce(),
        }
    }
}

fn collect_yaml_files(dir: &Path, skip: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || path == skip {
            continue;
        }
        if path.is_dir() {
            collect_yaml_files(&path, skip, out);
        } else if paths::is_yaml_file(&path) {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("db")).unwrap();
        fs::write(root.join("db/mysql.yaml"), "host: localhost\n").unwrap();
        fs::write(root.join("db/postgres.yaml"), "host: pg\n").unwrap();
        fs::write(root.join("config.yaml"), "defaults:\n  - db: mysql\n  - _self_\nlr: 0.1\n").unwrap();
        fs::write(root.join("notes.txt"), "not yaml").unwrap();
        let ws = Workspace::with_settings(root, Settings::default());
        (temp, ws)
    }

    #[test]
    fn test_file_browser_skips_backups_and_hidden() {
        let (_temp, ws) = workspace();
        ws.create_snapshot("t").unwrap();
        fs::write(ws.config_root().join(".hydra-compose.yaml"), "{}\n").unwrap();
        assert_eq!(
            ws.file_browser_entries(),
            vec!["config.yaml", "db/mysql.yaml", "db/postgres.yaml"]
        );
    }

    #[test]
    fn test_rewrite_then_reresolve() {
        let (_temp, ws) = workspace();
        let modules = ws.modules();
        let modules = ws.rewrite_entry(&modules[0], "db", "postgres").unwrap();
        assert_eq!(modules[0].name, "postgres");
        assert!(modules[0].resolved);
        assert!(ws.merge(&[]).contains("host: pg"));
    }

    #[test]
    fn test_rewrite_missing_entry_is_error() {
        let (_temp, ws) = workspace();
        let ghost = ConfigModule::locate(ws.config_root(), "model", "resnet", false);
        assert!(matches!(
            ws.rewrite_entry(&ghost, "model", "vit"),
            Err(ResolveError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_selection_is_per_instance() {
        let (temp, mut a) = workspace();
        let b = a.clone();
        let other = temp.path().join("train.yaml");
        fs::write(&other, "defaults: []\nepochs: 3\n").unwrap();
        a.select_root_document(&other);
        assert_eq!(a.root_document(), Some(paths::absolute(&other)));
        assert_eq!(b.root_document(), Some(b.config_root().join("config.yaml")));
        assert!(a.merge(&[]).contains("epochs: 3"));
    }

    #[test]
    fn test_backup_dir_from_settings() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.backups.dir_name = "snaps".into();
        let ws = Workspace::with_settings(temp.path(), settings);
        assert_eq!(ws.backup_dir(), ws.config_root().join("snaps"));
        assert_eq!(ws.watch_paths().backup_dir, ws.backup_dir());
    }
}
