//! Settings types for the composition engine itself.
//!
//! These are the tool's own tunables, not the Hydra-style tree being viewed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default name of the backup directory under the configuration root.
pub const DEFAULT_BACKUP_DIR: &str = ".hydra_backups";

/// Default manifest file name inside each snapshot directory.
pub const DEFAULT_MANIFEST_NAME: &str = "meta.json";

/// Tag used for the automatic backup taken before every restore.
pub const DEFAULT_PRE_RESTORE_TAG: &str = "pre_restore_backup";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backups: BackupSettings,

    #[serde(default)]
    pub merge: MergeSettings,

    #[serde(default)]
    pub watch: WatchSettings,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Directory (relative to the configuration root) holding snapshots.
    #[serde(default = "default_backup_dir")]
    pub dir_name: String,

    /// Manifest file written into every snapshot directory.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Tag of the safety snapshot taken before a restore.
    #[serde(default = "default_pre_restore_tag")]
    pub pre_restore_tag: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dir_name: default_backup_dir(),
            manifest_name: default_manifest_name(),
            pre_restore_tag: default_pre_restore_tag(),
        }
    }
}

fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.to_string()
}

fn default_manifest_name() -> String {
    DEFAULT_MANIFEST_NAME.to_string()
}

fn default_pre_restore_tag() -> String {
    DEFAULT_PRE_RESTORE_TAG.to_string()
}

/// Which composition strategies the merge engine may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Native composition first, manual fallback on structured failure.
    #[default]
    Auto,
    /// Native composition only.
    Native,
    /// Manual composition only.
    Manual,
}

impl MergeStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(MergeStrategy::Auto),
            "native" | "hydra" => Some(MergeStrategy::Native),
            "manual" => Some(MergeStrategy::Manual),
            _ => None,
        }
    }
}

/// Merge engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSettings {
    #[serde(default)]
    pub strategy: MergeStrategy,

    /// Attempt `${...}` resolution on natively composed output.
    #[serde(default = "default_true")]
    pub resolve_interpolations: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            resolve_interpolations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Watch-mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Debounce window for coalescing rapid file changes.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl WatchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    500
}
