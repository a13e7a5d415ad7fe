//! CLI command definitions for hydra-compose.
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod snapshot;

use crate::compose::defaults::ROOT_GROUP;
use crate::format::OutputFormat;
use crate::logging::LogTarget;
use clap::{Args, Parser, Subcommand};
use snapshot::SnapshotArgs;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Compose, inspect and snapshot Hydra-style YAML configuration trees
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration root (default: the current directory, if it holds a root document)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Root document to compose (default: auto-detected)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub root: Option<PathBuf>,

    /// Settings file (replaces the user and project settings files)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the modules selected by the root document's defaults list
    Modules {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List candidate root documents, marking the active one
    Roots,

    /// Print the composed configuration
    Merge(MergeArgs),

    /// Change a defaults entry in the root document, keeping its formatting
    Rewrite(RewriteArgs),

    /// Create, list or restore snapshots
    Snapshot(SnapshotArgs),

    /// Re-print the composed configuration whenever the tree changes
    Watch(MergeArgs),
}

/// Arguments shared by `merge` and `watch`
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Overrides such as `db=postgres`, `lr=0.1`, `+extra=1`, `~key`
    #[arg(value_name = "OVERRIDE", allow_hyphen_values = true)]
    pub overrides: Vec<String>,
}

impl MergeArgs {
    /// Overrides that look well-formed; the rest are dropped.
    ///
    /// Anything without `=` is discarded unless it is a `~key` removal.
    pub fn valid_overrides(&self) -> Vec<String> {
        self.overrides
            .iter()
            .filter(|ov| ov.contains('=') || (ov.starts_with('~') && ov.len() > 1))
            .cloned()
            .collect()
    }
}

/// Arguments for the rewrite subcommand
#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// Entry to change, as `group/name` (a bare `name` means a root-level file)
    #[arg(value_name = "GROUP/NAME")]
    pub from: Selection,

    /// New selection, as `group/name`
    #[arg(value_name = "NEW_GROUP/NEW_NAME")]
    pub to: Selection,
}

/// A `group/name` pair given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub group: String,
    pub name: String,
}

impl FromStr for Selection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (group, name) = match s.rsplit_once('/') {
            Some((group, name)) => (group, name),
            None => (ROOT_GROUP, s),
        };
        if group.is_empty() || name.is_empty() {
            return Err(format!("Invalid selection '{s}'. Expected group/name"));
        }
        Ok(Selection {
            group: group.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parse() {
        let sel: Selection = "server/db/postgres".parse().unwrap();
        assert_eq!(sel.group, "server/db");
        assert_eq!(sel.name, "postgres");
        let bare: Selection = "extras".parse().unwrap();
        assert_eq!(bare.group, ROOT_GROUP);
        assert!("db/".parse::<Selection>().is_err());
        assert!("".parse::<Selection>().is_err());
    }

    #[test]
    fn test_valid_overrides_filter() {
        let args = MergeArgs {
            overrides: vec![
                "lr=0.1".into(),
                "typo".into(),
                "~db".into(),
                "~".into(),
                "+x=1".into(),
            ],
        };
        assert_eq!(args.valid_overrides(), vec!["lr=0.1", "~db", "+x=1"]);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "hydra-compose",
            "--config-dir",
            "conf",
            "merge",
            "db=postgres",
            "~model",
        ])
        .unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("conf")));
        assert_eq!(cli.log, LogTarget::Stderr);
        match cli.command {
            Command::Merge(args) => assert_eq!(args.overrides, vec!["db=postgres", "~model"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rewrite_and_snapshot() {
        let cli = Cli::try_parse_from(["hydra-compose", "rewrite", "model/resnet", "model/vit"]).unwrap();
        assert!(matches!(cli.command, Command::Rewrite(ref a) if a.to.name == "vit"));

        let cli = Cli::try_parse_from(["hydra-compose", "snapshot", "list", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Command::Snapshot(_)));
    }
}
