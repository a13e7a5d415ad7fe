//! Strict composition with defaults-list semantics.
//!
//! Anything this composer cannot represent faithfully (package headers,
//! nested defaults lists, ambiguous entries) is reported as an error rather
//! than approximated, so the merge engine can fall back to the manual
//! strategy.

use super::defaults::{DefaultsEntry, DefaultsList, ROOT_GROUP, module_path, package_segments};
use super::overrides::{Override, OverrideKind};
use super::tree::{contains_path, get_path, nest_under, remove_path, set_path};
use super::{Composer, read_fragment};
use crate::config::deep_merge;
use crate::error::ComposeError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One step of the resolved composition plan.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// The root document's own keys.
    SelfKeys,
    /// `<root>/<group>/<name>.yaml`, merged under the group's package.
    Group { group: String, name: String },
    /// `<root>/<name>.yaml`, merged at the top level.
    RootFile { name: String },
}

impl Step {
    fn is_group(&self, wanted: &str) -> bool {
        matches!(self, Step::Group { group, .. } if group == wanted)
    }
}

#[derive(Debug, Clone)]
pub struct NativeComposer {
    config_root: PathBuf,
}

impl NativeComposer {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    fn plan(&self, defaults: &DefaultsList) -> Result<Vec<Step>, ComposeError> {
        let mut steps: Vec<Step> = Vec::with_capacity(defaults.entries.len() + 1);

        for entry in &defaults.entries {
            match entry {
                DefaultsEntry::SelfMarker => steps.push(Step::SelfKeys),
                DefaultsEntry::StringEntry(name) => {
                    if !module_path(&self.config_root, ROOT_GROUP, name).is_file() {
                        return Err(ComposeError::UnsupportedEntry(format!(
                            "'{name}' matches no file and has no group selection"
                        )));
                    }
                    steps.push(Step::RootFile { name: name.clone() });
                }
                DefaultsEntry::GroupNameEntry(sel) if sel.is_override => {
                    let target = steps
                        .iter_mut()
                        .find(|step| step.is_group(&sel.group))
                        .ok_or_else(|| ComposeError::OverrideWithoutTarget {
                            group: sel.group.clone(),
                        })?;
                    debug!(group = %sel.group, name = %sel.name, "Defaults override replaces selection");
                    *target = Step::Group {
                        group: sel.group.clone(),
                        name: sel.name.clone(),
                    };
                }
                DefaultsEntry::GroupNameEntry(sel) => steps.push(Step::Group {
                    group: sel.group.clone(),
                    name: sel.name.clone(),
                }),
                DefaultsEntry::Unrecognized(raw) => {
                    return Err(ComposeError::UnsupportedEntry(raw.clone()));
                }
            }
        }

        if !steps.contains(&Step::SelfKeys) {
            steps.push(Step::SelfKeys);
        }
        Ok(steps)
    }

    /// Apply overrides that address the defaults list itself.
    ///
    /// Returns the overrides left to apply to the composed document.
    fn apply_group_overrides(
        &self,
        steps: &mut Vec<Step>,
        overrides: Vec<Override>,
    ) -> Result<Vec<Override>, ComposeError> {
        let mut remaining = Vec::with_capacity(overrides.len());

        for ov in overrides {
            let selected = steps.iter().position(|step| step.is_group(&ov.key));
            let option = ov.value.as_deref().map(str::trim).unwrap_or_default();
            let option_exists = !option.is_empty()
                && module_path(&self.config_root, &ov.key, option).is_file();

            match (ov.kind, selected) {
                (OverrideKind::Assign | OverrideKind::ForceAdd, Some(index)) => {
                    steps[index] = Step::Group {
                        group: ov.key.clone(),
                        name: option.to_string(),
                    };
                }
                (OverrideKind::Append, Some(_)) if option_exists => {
                    return Err(ComposeError::KeyExists { key: ov.key });
                }
                (OverrideKind::Append | OverrideKind::ForceAdd, None) if option_exists => {
                    steps.push(Step::Group {
                        group: ov.key.clone(),
                        name: option.to_string(),
                    });
                }
                (OverrideKind::Delete, Some(index)) => {
                    steps.remove(index);
                }
                _ => {
                    remaining.push(ov);
                    continue;
                }
            }
            debug!(override_str = %ov, "Applied defaults-list override");
        }
        Ok(remaining)
    }

    fn load_step(&self, step: &Step, root_content: &Value) -> Result<Value, ComposeError> {
        match step {
            Step::SelfKeys => Ok(root_content.clone()),
            Step::RootFile { name } => {
                let path = module_path(&self.config_root, ROOT_GROUP, name);
                self.load_fragment(&path, &format!("{ROOT_GROUP}/{name}"))
            }
            Step::Group { group, name } => {
                let path = module_path(&self.config_root, group, name);
                if !path.is_file() {
                    return Err(ComposeError::MissingModule {
                        group: group.clone(),
                        name: name.clone(),
                        path,
                    });
                }
                let fragment = self.load_fragment(&path, &format!("{group}/{name}"))?;
                Ok(nest_under(&package_segments(group), fragment))
            }
        }
    }

    fn load_fragment(&self, path: &Path, label: &str) -> Result<Value, ComposeError> {
        let (text, value) = read_fragment(path)?;
        if text.lines().any(|line| line.trim_start().starts_with("# @package")) {
            return Err(ComposeError::UnsupportedEntry(format!(
                "{label} declares a @package header"
            )));
        }
        match value {
            Value::Null => Ok(Value::Mapping(Mapping::new())),
            Value::Mapping(map) if map.contains_key("defaults") => Err(
                ComposeError::UnsupportedEntry(format!("{label} has its own defaults list")),
            ),
            value @ Value::Mapping(_) => Ok(value),
            _ => Err(ComposeError::UnsupportedEntry(format!(
                "{label} is not a mapping"
            ))),
        }
    }
}

impl Composer for NativeComposer {
    fn name(&self) -> &'static str {
        "native"
    }

    fn compose(&self, root_document: &Path, overrides: &[String]) -> Result<Value, ComposeError> {
        let (_, document) = read_fragment(root_document)?;
        let defaults = DefaultsList::from_document(&document).unwrap_or_default();
        let mut root_content = match document {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            _ => {
                return Err(ComposeError::UnsupportedEntry(format!(
                    "{} is not a mapping",
                    root_document.display()
                )));
            }
        };
        root_content.shift_remove("defaults");
        let root_content = Value::Mapping(root_content);

        let parsed = overrides
            .iter()
            .map(|raw| Override::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut steps = self.plan(&defaults)?;
        let value_overrides = self.apply_group_overrides(&mut steps, parsed)?;

        let mut composed = Value::Mapping(Mapping::new());
        for step in &steps {
            composed = deep_merge(composed, self.load_step(step, &root_content)?);
        }

        for ov in value_overrides {
            let segments = ov.segments();
            match ov.kind {
                OverrideKind::Assign => {
                    if get_path(&composed, &segments).is_none() {
                        return Err(ComposeError::KeyNotFound { key: ov.key });
                    }
                    set_path(&mut composed, &segments, ov.parsed_value())?;
                }
                OverrideKind::Append => {
                    if contains_path(&composed, &segments) {
                        return Err(ComposeError::KeyExists { key: ov.key });
                    }
                    set_path(&mut composed, &segments, ov.parsed_value())?;
                }
                OverrideKind::ForceAdd => {
                    set_path(&mut composed, &segments, ov.parsed_value())?;
                }
                OverrideKind::Delete => {
                    if remove_path(&mut composed, &segments).is_none() {
                        return Err(ComposeError::DeleteMissing { key: ov.key });
                    }
                }
            }
        }

        Ok(composed)
    }
}
