//! Integration tests for module resolution and root-document handling.
//!
//! Covers:
//! - declaration order with `_self_` removed
//! - exact `<root>/<group>/<name>.yaml` resolution
//! - missing modules surfaced as unresolved, never as errors
//! - root-document detection and config-root discovery

use hydra_compose::compose::defaults::ROOT_GROUP;
use hydra_compose::paths::{detect_config_dir, discover_config_root};
use hydra_compose::{ModuleResolver, Workspace};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    write(root, "db/mysql.yaml", "host: localhost\n");
    write(root, "model/resnet.yaml", "depth: 50\n");
    write(root, "server/db/postgres.yaml", "port: 5432\n");
    write(root, "extras.yaml", "seed: 1\n");
    write(
        root,
        "config.yaml",
        r#"
defaults:
  - _self_
  - db: mysql
  - model/resnet
  - server/db/postgres
  - extras
  - optim: sgd
  - _self_
lr: 0.1
"#,
    );
    temp
}

#[test]
fn test_order_matches_defaults_without_self() {
    let temp = fixture();
    let resolver = ModuleResolver::new(temp.path());
    let ids: Vec<(String, String)> = resolver
        .resolve_current()
        .into_iter()
        .map(|m| (m.group, m.name))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("db".to_string(), "mysql".to_string()),
            ("model".to_string(), "resnet".to_string()),
            ("server/db".to_string(), "postgres".to_string()),
            (ROOT_GROUP.to_string(), "extras".to_string()),
            ("optim".to_string(), "sgd".to_string()),
        ]
    );
}

#[test]
fn test_resolved_iff_exact_path_exists() {
    let temp = fixture();
    let resolver = ModuleResolver::new(temp.path());
    for module in resolver.resolve_current() {
        let expected = resolver
            .config_root()
            .join(&module.group)
            .join(format!("{}.yaml", module.name));
        let expected = if module.group == ROOT_GROUP {
            resolver.config_root().join(format!("{}.yaml", module.name))
        } else {
            expected
        };
        assert_eq!(module.resolved, expected.is_file(), "{module}");
        assert_eq!(module.path.is_some(), module.resolved);
    }
}

#[test]
fn test_missing_module_degrades_gracefully() {
    let temp = fixture();
    let ws = Workspace::open(temp.path());
    let modules = ws.modules();
    let optim = modules.iter().find(|m| m.group == "optim").unwrap();
    assert!(!optim.resolved);

    let merged: serde_yaml::Value = serde_yaml::from_str(&ws.merge(&[])).unwrap();
    assert!(merged.get("optim").is_none());
    assert_eq!(merged["db"]["host"], serde_yaml::Value::from("localhost"));
}

#[test]
fn test_yml_module_is_not_resolved() {
    let temp = fixture();
    write(temp.path(), "db/sqlite.yml", "file: x\n");
    write(temp.path(), "config.yaml", "defaults:\n  - db: sqlite\n");
    let resolver = ModuleResolver::new(temp.path());
    let modules = resolver.resolve_current();
    assert_eq!(modules.len(), 1);
    assert!(!modules[0].resolved);
}

#[test]
fn test_detection_prefers_document_with_defaults() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.yaml", "x: 1\n");
    write(temp.path(), "b.yaml", "defaults: []\n");
    let resolver = ModuleResolver::new(temp.path());
    assert_eq!(
        resolver.detect_root_document(),
        Some(resolver.config_root().join("b.yaml"))
    );

    fs::remove_file(temp.path().join("b.yaml")).unwrap();
    assert_eq!(
        resolver.detect_root_document(),
        Some(resolver.config_root().join("a.yaml"))
    );

    fs::remove_file(temp.path().join("a.yaml")).unwrap();
    assert_eq!(resolver.detect_root_document(), None);
    assert!(resolver.resolve_current().is_empty());
}

#[test]
fn test_discover_config_root_walks_up() {
    let temp = fixture();
    let nested = temp.path().join("model");
    let found = discover_config_root(&nested.join("resnet.yaml")).unwrap();
    assert_eq!(found, hydra_compose::paths::absolute(temp.path()));
    assert_eq!(
        detect_config_dir(temp.path()),
        Some(temp.path().to_path_buf())
    );
    assert_eq!(detect_config_dir(&nested), None);
}
