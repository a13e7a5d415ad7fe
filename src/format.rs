//! Output formatting for module lists, root documents and snapshots.

use crate::modules::ConfigModule;
use crate::paths;
use crate::snapshot::SnapshotEntry;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

fn display_path(config_root: &Path, path: &Path) -> String {
    paths::relative_slash_path(config_root, path).unwrap_or_else(|| path.display().to_string())
}

/// One line per module; unresolved modules are flagged `MISSING`.
pub fn format_modules_text(
    modules: &[ConfigModule],
    root_document: Option<&Path>,
    config_root: &Path,
) -> String {
    let mut out = String::new();
    match root_document {
        Some(root) => out.push_str(&format!("Root: {}\n", display_path(config_root, root))),
        None => out.push_str("Root: (none)\n"),
    }
    if modules.is_empty() {
        out.push_str("  (no modules)\n");
        return out;
    }

    let width = modules
        .iter()
        .map(|m| m.group.len() + m.name.len() + 1)
        .max()
        .unwrap_or(0);
    for module in modules {
        let id = format!("{}/{}", module.group, module.name);
        let location = module
            .relative_path(config_root)
            .unwrap_or_else(|| "MISSING".to_string());
        let marker = if module.is_override { " (override)" } else { "" };
        out.push_str(&format!("  {id:<width$}  {location}{marker}\n"));
    }
    out
}

pub fn format_modules_json(
    modules: &[ConfigModule],
    root_document: Option<&Path>,
    config_root: &Path,
) -> Value {
    let modules: Vec<Value> = modules
        .iter()
        .map(|m| {
            json!({
                "group": m.group,
                "name": m.name,
                "path": m.relative_path(config_root),
                "resolved": m.resolved,
                "override": m.is_override,
            })
        })
        .collect();
    json!({
        "config_root": config_root.display().to_string(),
        "root_document": root_document.map(|p| display_path(config_root, p)),
        "modules": modules,
    })
}

/// Candidate root documents, the active one marked with `*`.
pub fn format_roots(candidates: &[PathBuf], active: Option<&Path>, config_root: &Path) -> String {
    if candidates.is_empty() {
        return "(no YAML files at the configuration root)\n".to_string();
    }
    candidates
        .iter()
        .map(|candidate| {
            let mark = if Some(candidate.as_path()) == active { '*' } else { ' ' };
            format!("{mark} {}\n", display_path(config_root, candidate))
        })
        .collect()
}

/// Snapshot table, newest first as given.
pub fn format_snapshots_text(snapshots: &[SnapshotEntry]) -> String {
    if snapshots.is_empty() {
        return "No snapshots.\n".to_string();
    }
    let mut out = format!("{:<19}  {:<24}  {:>5}  {}\n", "CREATED", "TAG", "FILES", "PATH");
    for entry in snapshots {
        let created = entry
            .meta
            .created_at()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "?".to_string());
        out.push_str(&format!(
            "{:<19}  {:<24}  {:>5}  {}\n",
            created,
            entry.meta.tag,
            entry.meta.modules.len(),
            entry.path.display()
        ));
    }
    out
}

pub fn format_snapshots_json(snapshots: &[SnapshotEntry]) -> serde_json::Result<Value> {
    serde_json::to_value(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotMeta;

    fn module(group: &str, name: &str, path: Option<&str>) -> ConfigModule {
        ConfigModule {
            group: group.into(),
            name: name.into(),
            path: path.map(|p| Path::new("/conf").join(p)),
            resolved: path.is_some(),
            is_override: false,
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }

    #[test]
    fn test_modules_text_flags_missing() {
        let modules = vec![
            module("db", "mysql", Some("db/mysql.yaml")),
            module("model", "vit", None),
        ];
        let root = Path::new("/conf");
        let doc = root.join("config.yaml");
        let text = format_modules_text(&modules, Some(doc.as_path()), root);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Root: config.yaml");
        assert!(lines[1].contains("db/mysql") && lines[1].ends_with("db/mysql.yaml"));
        assert!(lines[2].ends_with("MISSING"));
    }

    #[test]
    fn test_modules_json_shape() {
        let modules = vec![module("model", "vit", None)];
        let value = format_modules_json(&modules, None, Path::new("/conf"));
        assert_eq!(value["modules"][0]["resolved"], json!(false));
        assert_eq!(value["modules"][0]["path"], Value::Null);
        assert_eq!(value["root_document"], Value::Null);
    }

    #[test]
    fn test_roots_marks_active() {
        let root = Path::new("/conf");
        let candidates = vec![root.join("config.yaml"), root.join("train.yaml")];
        let text = format_roots(&candidates, Some(candidates[1].as_path()), root);
        assert_eq!(text, "  config.yaml\n* train.yaml\n");
    }

    #[test]
    fn test_snapshots_json_flattens_meta() {
        let entries = vec![SnapshotEntry {
            meta: SnapshotMeta {
                tag: "t".into(),
                timestamp: 10.5,
                modules: vec!["config.yaml".into()],
            },
            path: PathBuf::from("/conf/.hydra_backups/x_t"),
        }];
        let value = format_snapshots_json(&entries).unwrap();
        assert_eq!(value[0]["tag"], json!("t"));
        assert_eq!(value[0]["modules"][0], json!("config.yaml"));
        assert_eq!(value[0]["path"], json!("/conf/.hydra_backups/x_t"));
        assert!(format_snapshots_text(&entries).contains("  t  "));
        assert_eq!(format_snapshots_text(&[]), "No snapshots.\n");
    }
}
