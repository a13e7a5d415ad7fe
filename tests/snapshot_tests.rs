//! Integration tests for snapshot create/list/restore.

use hydra_compose::Workspace;
use hydra_compose::config::{DEFAULT_PRE_RESTORE_TAG, Settings};
use hydra_compose::error::SnapshotError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> (TempDir, Workspace) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write(temp.path(), "model/resnet.yaml", "depth: 50\n");
    write(temp.path(), "db/mysql.yaml", "host: localhost\n");
    write(
        temp.path(),
        "config.yaml",
        "defaults:\n  - model: resnet\n  - db: mysql\n  - optim: missing\n",
    );
    let ws = Workspace::with_settings(temp.path(), Settings::default());
    (temp, ws)
}

#[test]
fn test_snapshot_restore_round_trip() {
    let (temp, ws) = fixture();
    let tracked = temp.path().join("model/resnet.yaml");
    let original = fs::read(&tracked).unwrap();

    let snapshot = ws.create_snapshot("t").unwrap();
    fs::write(&tracked, "depth: 101\n").unwrap();

    let report = ws.restore_snapshot(&snapshot).unwrap();
    assert_eq!(fs::read(&tracked).unwrap(), original);
    assert!(report.restored.contains(&"model/resnet.yaml".to_string()));

    // The safety snapshot captured the mutated state.
    let snapshots = ws.list_snapshots();
    let safety = snapshots
        .iter()
        .find(|s| s.meta.tag == DEFAULT_PRE_RESTORE_TAG)
        .expect("pre-restore snapshot should exist");
    assert_eq!(safety.path, report.pre_restore);
    assert_eq!(
        fs::read_to_string(safety.path.join("model/resnet.yaml")).unwrap(),
        "depth: 101\n"
    );
}

#[test]
fn test_manifest_lists_exactly_what_was_copied() {
    let (_temp, ws) = fixture();
    let snapshot = ws.create_snapshot("manifest").unwrap();
    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(snapshot.join("meta.json")).unwrap()).unwrap();
    assert_eq!(manifest["tag"], "manifest");
    assert!(manifest["timestamp"].as_f64().unwrap() > 0.0);
    assert_eq!(
        manifest["modules"],
        serde_json::json!(["config.yaml", "model/resnet.yaml", "db/mysql.yaml"])
    );
}

#[test]
fn test_restore_recreates_deleted_directories() {
    let (temp, ws) = fixture();
    let snapshot = ws.create_snapshot("t").unwrap();
    fs::remove_dir_all(temp.path().join("db")).unwrap();

    ws.restore_snapshot(&snapshot).unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("db/mysql.yaml")).unwrap(),
        "host: localhost\n"
    );
}

#[test]
fn test_restore_without_manifest_is_error() {
    let (temp, ws) = fixture();
    let bogus = temp.path().join(".hydra_backups/not_a_snapshot");
    fs::create_dir_all(&bogus).unwrap();
    assert!(matches!(
        ws.restore_snapshot(&bogus),
        Err(SnapshotError::ManifestMissing { .. })
    ));
}

#[test]
fn test_list_is_newest_first_and_ignores_junk() {
    let (temp, ws) = fixture();
    assert!(ws.list_snapshots().is_empty());
    write(
        temp.path(),
        ".hydra_backups/old/meta.json",
        r#"{"tag": "old", "timestamp": 100.0, "modules": []}"#,
    );
    write(temp.path(), ".hydra_backups/corrupt/meta.json", "[]");
    ws.create_snapshot("new").unwrap();

    let tags: Vec<String> = ws.list_snapshots().into_iter().map(|s| s.meta.tag).collect();
    assert_eq!(tags, vec!["new", "old"]);
}

#[test]
fn test_custom_backup_dir() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "config.yaml", "defaults: []\n");
    let mut settings = Settings::default();
    settings.backups.dir_name = "snaps".to_string();
    let ws = Workspace::with_settings(temp.path(), settings);
    let snapshot = ws.create_snapshot("x").unwrap();
    assert!(snapshot.starts_with(ws.config_root().join("snaps")));
}
