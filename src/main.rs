//! hydra-compose
//!
//! Command-line driver over the composition engine: module listing, merged
//! previews, defaults-entry rewrites, snapshots and a watch mode.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use hydra_compose::cli::snapshot::SnapshotAction;
use hydra_compose::cli::{Cli, Command, MergeArgs, RewriteArgs};
use hydra_compose::config::SettingsLoader;
use hydra_compose::config::watcher::{TreeChangeEvent, start_tree_watcher};
use hydra_compose::format::{self, OutputFormat};
use hydra_compose::logging;
use hydra_compose::modules::ConfigModule;
use hydra_compose::paths;
use hydra_compose::workspace::Workspace;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log, cli.verbose)?;

    let workspace = open_workspace(&cli)?;

    match cli.command {
        Command::Modules { format } => {
            let modules = workspace.modules();
            let root = workspace.root_document();
            match format {
                OutputFormat::Text => print!(
                    "{}",
                    format::format_modules_text(&modules, root.as_deref(), workspace.config_root())
                ),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&format::format_modules_json(
                        &modules,
                        root.as_deref(),
                        workspace.config_root()
                    ))?
                ),
            }
        }
        Command::Roots => {
            let root = workspace.root_document();
            print!(
                "{}",
                format::format_roots(
                    &workspace.candidate_root_documents(),
                    root.as_deref(),
                    workspace.config_root()
                )
            );
        }
        Command::Merge(args) => {
            print!("{}", workspace.merge(&args.valid_overrides()));
        }
        Command::Rewrite(args) => run_rewrite(&workspace, &args)?,
        Command::Snapshot(args) => match args.action {
            SnapshotAction::Create { tag } => {
                let dir = workspace.create_snapshot(&tag)?;
                println!("Created snapshot {}", dir.display());
            }
            SnapshotAction::List { format } => {
                let snapshots = workspace.list_snapshots();
                match format {
                    OutputFormat::Text => print!("{}", format::format_snapshots_text(&snapshots)),
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::to_string_pretty(&format::format_snapshots_json(&snapshots)?)?
                    ),
                }
            }
            SnapshotAction::Restore { snapshot } => {
                let dir = resolve_snapshot_dir(&workspace, &snapshot);
                let report = workspace
                    .restore_snapshot(&dir)
                    .with_context(|| format!("cannot restore {}", dir.display()))?;
                println!(
                    "Restored {} file(s) from {} (safety snapshot: {})",
                    report.restored.len(),
                    dir.display(),
                    report.pre_restore.display()
                );
                for skipped in &report.skipped {
                    println!("  skipped {skipped}");
                }
            }
        },
        Command::Watch(args) => run_watch(&workspace, &args).await?,
    }

    Ok(())
}

fn open_workspace(cli: &Cli) -> Result<Workspace> {
    let config_root = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            paths::detect_config_dir(&cwd).ok_or_else(|| {
                anyhow!(
                    "no root document with a defaults list in {}; pass --config-dir",
                    cwd.display()
                )
            })?
        }
    };
    if !config_root.is_dir() {
        bail!("configuration root {} is not a directory", config_root.display());
    }

    let settings = match &cli.settings {
        Some(path) => SettingsLoader::load_file(path)?.into_settings(),
        None => SettingsLoader::load(&config_root).into_settings(),
    };
    debug!(?settings, "Loaded settings");

    let mut workspace = Workspace::with_settings(&config_root, settings);
    if let Some(root) = &cli.root {
        let root = if root.is_file() {
            root.clone()
        } else {
            config_root.join(root)
        };
        if !root.is_file() {
            bail!("root document {} does not exist", root.display());
        }
        workspace.select_root_document(root);
    }
    Ok(workspace)
}

fn run_rewrite(workspace: &Workspace, args: &RewriteArgs) -> Result<()> {
    let old = workspace
        .modules()
        .into_iter()
        .find(|m| m.group == args.from.group && m.name == args.from.name)
        .unwrap_or_else(|| {
            ConfigModule::locate(workspace.config_root(), &args.from.group, &args.from.name, false)
        });
    let modules = workspace.rewrite_entry(&old, &args.to.group, &args.to.name)?;
    println!("Rewrote {} -> {}", args.from, args.to);
    let root = workspace.root_document();
    print!(
        "{}",
        format::format_modules_text(&modules, root.as_deref(), workspace.config_root())
    );
    Ok(())
}

/// Accept either a path or a snapshot name under the backup directory.
fn resolve_snapshot_dir(workspace: &Workspace, snapshot: &Path) -> PathBuf {
    if snapshot.is_dir() {
        snapshot.to_path_buf()
    } else {
        workspace.backup_dir().join(snapshot)
    }
}

async fn run_watch(workspace: &Workspace, args: &MergeArgs) -> Result<()> {
    let overrides = args.valid_overrides();
    print!("{}", workspace.merge(&overrides));

    let mut handle = start_tree_watcher(workspace.watch_paths(), workspace.watcher_config())?;
    loop {
        tokio::select! {
            event = handle.wait_for_change() => match event {
                None => break,
                Some(TreeChangeEvent::Error(e)) => warn!(error = %e, "Watcher error"),
                Some(event) if event.requires_refresh() => {
                    info!(paths = ?event.affected_paths(), "Configuration changed");
                    if event.touches_root_documents(&workspace.watch_paths()) {
                        debug!(root = ?workspace.root_document(), "Root document candidates changed");
                    }
                    println!("# --- {} ---", chrono::Local::now().format("%H:%M:%S"));
                    print!("{}", workspace.merge(&overrides));
                }
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
