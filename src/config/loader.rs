//! Settings loader with tier-based merging.
//!
//! Loads the engine's settings from multiple tiers and merges them
//! field-by-field, later tiers winning.

use super::merge::{NullPolicy, deep_merge_all};
use super::types::{MergeStrategy, Settings};
use crate::error::SettingsError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the per-tree settings file at the configuration root.
pub const PROJECT_SETTINGS_FILE: &str = ".hydra-compose.yaml";

/// File name of the user-level settings file.
pub const USER_SETTINGS_FILE: &str = "settings.yaml";

/// Settings tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// User-level settings (~/.hydra-compose/settings.yaml)
    User = 1,
    /// Per-tree settings (<config-root>/.hydra-compose.yaml)
    Project = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for SettingsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsTier::Defaults => write!(f, "defaults"),
            SettingsTier::User => write!(f, "user"),
            SettingsTier::Project => write!(f, "project"),
            SettingsTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each settings tier.
#[derive(Debug, Clone, Default)]
pub struct SettingsPaths {
    /// User-level settings directory
    pub user_dir: Option<PathBuf>,
    /// Per-tree settings file
    pub project_file: Option<PathBuf>,
}

impl SettingsPaths {
    /// Discover settings paths for a configuration root.
    pub fn discover(config_root: &Path) -> Self {
        // User dir: HYDRA_COMPOSE_USER_DIR or ~/.hydra-compose
        let user_dir = std::env::var("HYDRA_COMPOSE_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".hydra-compose")));

        Self {
            user_dir,
            project_file: Some(config_root.join(PROJECT_SETTINGS_FILE)),
        }
    }

    /// Create paths with explicit locations.
    pub fn with_paths(user_dir: Option<PathBuf>, project_file: Option<PathBuf>) -> Self {
        Self {
            user_dir,
            project_file,
        }
    }

    fn user_file(&self) -> Option<PathBuf> {
        self.user_dir.as_ref().map(|d| d.join(USER_SETTINGS_FILE))
    }
}

/// Loader that merges settings tiers.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    pub paths: SettingsPaths,
    settings: Settings,
    /// Files that contributed to the merged settings, lowest tier first.
    sources: Vec<(SettingsTier, PathBuf)>,
}

impl SettingsLoader {
    /// Load settings for a configuration root from all tiers.
    pub fn load(config_root: &Path) -> Self {
        Self::load_with_paths(SettingsPaths::discover(config_root))
    }

    /// Load settings with explicit tier paths.
    ///
    /// Missing or unreadable tier files are skipped with a warning; the
    /// defaults tier always applies.
    pub fn load_with_paths(paths: SettingsPaths) -> Self {
        let mut layers: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults
        if let Ok(defaults) = serde_yaml::to_value(Settings::default()) {
            layers.push(defaults);
        }

        // Tier 2: User settings
        if let Some(file) = paths.user_file() {
            if let Some(layer) = read_layer(&file) {
                layers.push(layer);
                sources.push((SettingsTier::User, file));
            }
        }

        // Tier 3: Per-tree settings
        if let Some(ref file) = paths.project_file {
            if let Some(layer) = read_layer(file) {
                layers.push(layer);
                sources.push((SettingsTier::Project, file.clone()));
            }
        }

        let merged = deep_merge_all(layers, NullPolicy::KeepBase);
        let mut settings = match serde_yaml::from_value::<Settings>(merged) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Merged settings are invalid, using defaults");
                Settings::default()
            }
        };

        // Tier 4: Environment
        Self::apply_env_overrides(&mut settings);

        Self {
            paths,
            settings,
            sources,
        }
    }

    /// Load a single explicit settings file over the defaults.
    ///
    /// Unlike the tiered load, a bad explicit file is an error.
    pub fn load_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layer: Value = serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let defaults = serde_yaml::to_value(Settings::default())?;
        let merged = deep_merge_all([defaults, layer], NullPolicy::KeepBase);
        let mut settings: Settings = serde_yaml::from_value(merged)?;
        Self::apply_env_overrides(&mut settings);

        Ok(Self {
            paths: SettingsPaths::default(),
            settings,
            sources: vec![(SettingsTier::Project, path.to_path_buf())],
        })
    }

    fn apply_env_overrides(settings: &mut Settings) {
        if let Ok(dir) = std::env::var("HYDRA_COMPOSE_BACKUP_DIR") {
            settings.backups.dir_name = dir;
        }

        if let Ok(strategy) = std::env::var("HYDRA_COMPOSE_MERGE_STRATEGY") {
            match MergeStrategy::from_str(&strategy) {
                Some(s) => settings.merge.strategy = s,
                None => warn!(value = %strategy, "Ignoring unknown HYDRA_COMPOSE_MERGE_STRATEGY"),
            }
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Files that contributed to the loaded settings.
    pub fn sources(&self) -> &[(SettingsTier, PathBuf)] {
        &self.sources
    }
}

fn read_layer(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable settings file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(path = %path.display(), "Loaded settings layer");
            Some(value)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unparseable settings file");
            None
        }
    }
}
