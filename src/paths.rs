//! Path helpers for a configuration root.
//!
//! - Lists and detects root-document candidates
//! - Discovers a configuration root by walking up from a start path
//! - Converts paths to root-relative forward-slash form for manifests
//! - Sandboxes manifest paths so a restore can never write outside the root

use serde_yaml::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Returns true for `.yaml` / `.yml` files.
pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Make a path absolute without touching the filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Every top-level YAML file in `dir`, sorted by file name.
///
/// Hidden files are skipped (the engine's own settings file lives there).
pub fn top_level_yaml_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_yaml_file(p))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// Whether a file parses as a mapping with a `defaults` key.
///
/// With `require_sequence`, the key must also hold a sequence.
pub fn has_defaults_key(path: &Path, require_sequence: bool) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(map)) => match map.get("defaults") {
            Some(Value::Sequence(_)) => true,
            Some(_) => !require_sequence,
            None => false,
        },
        Ok(_) => false,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping unparseable candidate");
            false
        }
    }
}

/// Pick the root document for a configuration root.
///
/// The first top-level YAML file carrying a `defaults` key wins; otherwise
/// the first top-level YAML file; otherwise `None`.
pub fn detect_root_document(config_root: &Path) -> Option<PathBuf> {
    let candidates = top_level_yaml_files(config_root);
    candidates
        .iter()
        .find(|p| has_defaults_key(p, false))
        .or_else(|| candidates.first())
        .cloned()
}

/// Check only `dir` itself for a root document with a `defaults` key.
pub fn detect_config_dir(dir: &Path) -> Option<PathBuf> {
    top_level_yaml_files(dir)
        .iter()
        .any(|p| has_defaults_key(p, false))
        .then(|| dir.to_path_buf())
}

/// Walk upward from `start` to the first directory holding a YAML file whose
/// `defaults` key is a sequence.
pub fn discover_config_root(start: &Path) -> Option<PathBuf> {
    let start = absolute(start);
    let mut current = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start
    };

    loop {
        if top_level_yaml_files(&current)
            .iter()
            .any(|p| has_defaults_key(p, true))
        {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Root-relative path in forward-slash form, or `None` if `path` is not
/// under `root`.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Join a manifest-relative path onto `root`, rejecting anything that could
/// escape it (absolute paths, `..`, drive prefixes).
pub fn sandboxed_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    let mut joined = root.to_path_buf();
    let mut pushed = false;
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    pushed.then_some(joined)
}
