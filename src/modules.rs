//! Module resolution for a root document's defaults list.
//!
//! Every call re-reads the root document from disk; nothing is cached, so
//! edits made by an external editor are visible on the next resolve.

use crate::compose::defaults::{DefaultsEntry, DefaultsList, ROOT_GROUP, module_path};
use crate::error::ResolveError;
use crate::paths;
use crate::rewrite;
use serde::Serialize;
use serde_yaml::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One configuration fragment contributed to the composition.
///
/// `resolved` is true exactly when `path` is set. Unresolved modules stay in
/// the list so callers can surface missing entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigModule {
    pub group: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub resolved: bool,
    /// Declared with the `override` keyword.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_override: bool,
}

impl ConfigModule {
    /// Build a module, checking whether its backing file exists.
    pub fn locate(config_root: &Path, group: &str, name: &str, is_override: bool) -> Self {
        let candidate = module_path(config_root, group, name);
        let path = candidate.is_file().then_some(candidate);
        Self {
            group: group.to_string(),
            name: name.to_string(),
            resolved: path.is_some(),
            path,
            is_override,
        }
    }

    /// Backing file relative to the configuration root, forward-slashed.
    pub fn relative_path(&self, config_root: &Path) -> Option<String> {
        self.path
            .as_deref()
            .and_then(|p| paths::relative_slash_path(config_root, p))
    }
}

impl fmt::Display for ConfigModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.group, self.name)
    }
}

/// Load a YAML file as a structured value, `None` if unreadable or invalid.
pub fn load_document(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot read document");
            return None;
        }
    };
    match serde_yaml::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot parse document");
            None
        }
    }
}

/// Parses defaults lists into ordered module lists and tracks which
/// document is treated as root.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    config_root: PathBuf,
    selected: Option<PathBuf>,
}

impl ModuleResolver {
    pub fn new(config_root: impl AsRef<Path>) -> Self {
        Self {
            config_root: paths::absolute(config_root.as_ref()),
            selected: None,
        }
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Resolve a root document's defaults list, in declaration order.
    ///
    /// Never fails: an unreadable or non-mapping document yields an empty
    /// list, and entries that cannot be interpreted are dropped.
    pub fn resolve(&self, root_document: &Path) -> Vec<ConfigModule> {
        let Some(document) = load_document(root_document) else {
            return Vec::new();
        };
        let Some(defaults) = DefaultsList::from_document(&document) else {
            return Vec::new();
        };

        let mut modules = Vec::with_capacity(defaults.entries.len());
        for entry in defaults.entries {
            match entry {
                DefaultsEntry::SelfMarker => {}
                DefaultsEntry::GroupNameEntry(sel) => modules.push(ConfigModule::locate(
                    &self.config_root,
                    &sel.group,
                    &sel.name,
                    sel.is_override,
                )),
                DefaultsEntry::StringEntry(name) => {
                    let module = ConfigModule::locate(&self.config_root, ROOT_GROUP, &name, false);
                    if module.resolved {
                        modules.push(module);
                    } else {
                        // A bare group name with no selection is ambiguous.
                        debug!(entry = %name, "Dropping unresolvable bare defaults entry");
                    }
                }
                DefaultsEntry::Unrecognized(raw) => {
                    debug!(entry = %raw, "Dropping unrecognized defaults entry");
                }
            }
        }
        modules
    }

    /// Resolve the currently selected (or detected) root document.
    pub fn resolve_current(&self) -> Vec<ConfigModule> {
        self.root_document()
            .map(|p| self.resolve(&p))
            .unwrap_or_default()
    }

    /// Every top-level `.yaml`/`.yml` file under the configuration root.
    pub fn list_candidate_root_documents(&self) -> Vec<PathBuf> {
        paths::top_level_yaml_files(&self.config_root)
    }

    /// Auto-detect a root document (see [`paths::detect_root_document`]).
    pub fn detect_root_document(&self) -> Option<PathBuf> {
        paths::detect_root_document(&self.config_root)
    }

    /// Change which document is treated as root.
    pub fn select_root_document(&mut self, path: impl AsRef<Path>) {
        self.selected = Some(paths::absolute(path.as_ref()));
    }

    /// The explicitly selected document, if any.
    pub fn selected_root_document(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    /// The selected document if it still exists, else the detected one.
    pub fn root_document(&self) -> Option<PathBuf> {
        match self.selected {
            Some(ref path) if path.is_file() => Some(path.clone()),
            _ => self.detect_root_document(),
        }
    }

    /// Rewrite the defaults entry for `old` in the current root document.
    ///
    /// Returns the number of lines rewritten.
    pub fn rewrite_defaults_entry(
        &self,
        old: &ConfigModule,
        new_group: &str,
        new_name: &str,
    ) -> Result<usize, ResolveError> {
        let root = self.root_document().ok_or(ResolveError::NoRootDocument)?;
        rewrite::rewrite_entry_in_file(&root, &old.group, &old.name, new_group, new_name)
    }
}
