//! Lenient fallback composition.
//!
//! Approximates defaults-list composition with plain deep merges: missing
//! modules are skipped, `override` entries are ignored, removal overrides are
//! dropped and interpolations are left as written. Only an unreadable or
//! unparseable file makes it fail.

use super::defaults::{DefaultsEntry, DefaultsList, ROOT_GROUP, module_path};
use super::overrides::{dotlist_tree, normalize_for_fallback};
use super::tree::nest_under;
use super::{Composer, read_fragment};
use crate::config::deep_merge;
use crate::error::ComposeError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ManualComposer {
    config_root: PathBuf,
}

impl ManualComposer {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    /// Load a module if its file exists; `None` means skip it.
    fn load_if_present(&self, group: &str, name: &str) -> Result<Option<Value>, ComposeError> {
        let path = module_path(&self.config_root, group, name);
        if !path.is_file() {
            debug!(group, name, "Skipping missing module in manual merge");
            return Ok(None);
        }
        let (_, value) = read_fragment(&path)?;
        Ok(Some(value))
    }
}

impl Composer for ManualComposer {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn compose(&self, root_document: &Path, overrides: &[String]) -> Result<Value, ComposeError> {
        let (_, document) = read_fragment(root_document)?;
        let base = match document {
            value @ Value::Mapping(_) => value,
            Value::Null => Value::Mapping(Mapping::new()),
            other => nest_under(&[ROOT_GROUP], other),
        };

        let defaults = DefaultsList::from_document(&base).unwrap_or_default();
        let mut self_content = base.clone();
        if let Value::Mapping(ref mut map) = self_content {
            map.shift_remove("defaults");
        }

        let mut merged = if defaults.is_empty() {
            base
        } else {
            let mut acc = Value::Mapping(Mapping::new());
            for entry in &defaults.entries {
                match entry {
                    DefaultsEntry::SelfMarker => {
                        acc = deep_merge(acc, self_content.clone());
                    }
                    DefaultsEntry::StringEntry(name) => {
                        if let Some(fragment) = self.load_if_present(ROOT_GROUP, name)? {
                            acc = deep_merge(acc, fragment);
                        }
                    }
                    DefaultsEntry::GroupNameEntry(sel) if sel.is_override => {
                        debug!(group = %sel.group, name = %sel.name, "Manual merge skips override entry");
                    }
                    DefaultsEntry::GroupNameEntry(sel) => {
                        if let Some(fragment) = self.load_if_present(&sel.group, &sel.name)? {
                            acc = deep_merge(acc, nest_under(&[sel.group.as_str()], fragment));
                        }
                    }
                    DefaultsEntry::Unrecognized(raw) => {
                        debug!(entry = %raw, "Manual merge skips unrecognized entry");
                    }
                }
            }
            if !defaults.has_self_marker() {
                acc = deep_merge(acc, self_content);
            }
            acc
        };

        let pairs: Vec<(String, String)> = overrides
            .iter()
            .filter_map(|raw| normalize_for_fallback(raw))
            .collect();
        if !pairs.is_empty() {
            merged = deep_merge(merged, dotlist_tree(&pairs));
        }
        Ok(merged)
    }
}
