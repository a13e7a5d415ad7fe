//! Defaults-list decoding.
//!
//! A defaults list mixes bare strings, `group/name` strings and one-key
//! mappings. Each entry is decoded once into a [`DefaultsEntry`] so the
//! resolver and both composition strategies match on variants instead of
//! re-inspecting loose YAML.

use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Marker entry for the root document's own keys.
pub const SELF_MARKER: &str = "_self_";

/// Synthetic group for bare file references with no group.
pub const ROOT_GROUP: &str = "root";

const OVERRIDE_KEYWORD: &str = "override";

/// How a group selection was written in the root document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryForm {
    /// `- group/name`
    Path,
    /// `- group: name`
    Mapping,
}

/// A `group` + `name` selection from the defaults list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    pub group: String,
    pub name: String,
    /// Written as `override group: name` (or `override group/name`).
    pub is_override: bool,
    pub form: EntryForm,
}

impl GroupSelection {
    /// Path segments of the package this selection merges under.
    pub fn package(&self) -> Vec<&str> {
        package_segments(&self.group)
    }
}

/// One decoded defaults-list entry.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultsEntry {
    /// `_self_`: where the root document's own keys are merged.
    SelfMarker,
    /// A bare name without `/`, tried as a root-level file.
    StringEntry(String),
    /// `group/name` or `{group: name}`.
    GroupNameEntry(GroupSelection),
    /// Anything else (null selections, lists of names, nested mappings).
    Unrecognized(String),
}

/// Decoded defaults list of a root document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultsList {
    pub entries: Vec<DefaultsEntry>,
}

impl DefaultsList {
    /// Decode the `defaults` key of a parsed root document.
    ///
    /// Returns `None` if the document is not a mapping. A missing or
    /// non-sequence `defaults` key yields an empty list.
    pub fn from_document(document: &Value) -> Option<Self> {
        let map = document.as_mapping()?;
        let entries = match map.get("defaults") {
            Some(Value::Sequence(items)) => items.iter().flat_map(decode_item).collect(),
            _ => Vec::new(),
        };
        Some(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_self_marker(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, DefaultsEntry::SelfMarker))
    }
}

fn decode_item(item: &Value) -> Vec<DefaultsEntry> {
    match item {
        Value::String(s) => vec![decode_string(s)],
        // Multi-key mappings are accepted; each pair is its own selection.
        Value::Mapping(map) => map
            .iter()
            .map(|(key, value)| match (key.as_str(), value.as_str()) {
                (Some(key), Some(name)) => {
                    let (group, is_override) = strip_override(key);
                    DefaultsEntry::GroupNameEntry(GroupSelection {
                        group: group.to_string(),
                        name: name.to_string(),
                        is_override,
                        form: EntryForm::Mapping,
                    })
                }
                _ => DefaultsEntry::Unrecognized(describe(item)),
            })
            .collect(),
        other => vec![DefaultsEntry::Unrecognized(describe(other))],
    }
}

fn decode_string(s: &str) -> DefaultsEntry {
    if s == SELF_MARKER {
        return DefaultsEntry::SelfMarker;
    }
    let (body, is_override) = strip_override(s);
    match body.rsplit_once('/') {
        Some((group, name)) if !group.is_empty() && !name.is_empty() => {
            DefaultsEntry::GroupNameEntry(GroupSelection {
                group: group.to_string(),
                name: name.to_string(),
                is_override,
                form: EntryForm::Path,
            })
        }
        Some(_) => DefaultsEntry::Unrecognized(s.to_string()),
        None => DefaultsEntry::StringEntry(s.to_string()),
    }
}

/// Split an `override ` prefix off a group key.
///
/// The bare key `override` is kept as the group name but still flagged.
fn strip_override(key: &str) -> (&str, bool) {
    if key == OVERRIDE_KEYWORD {
        return (key, true);
    }
    match key.strip_prefix("override ") {
        Some(rest) => (rest.trim(), true),
        None => (key, false),
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().replace('\n', " "))
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// `group` split into nesting segments (`a/b` merges under `a.b`).
pub fn package_segments(group: &str) -> Vec<&str> {
    group.split('/').filter(|s| !s.is_empty()).collect()
}

/// Expected backing file for a group/name pair.
///
/// The synthetic `root` group resolves directly under the configuration root.
pub fn module_path(config_root: &Path, group: &str, name: &str) -> PathBuf {
    let file = format!("{name}.yaml");
    if group == ROOT_GROUP {
        config_root.join(file)
    } else {
        config_root.join(group).join(file)
    }
}
