//! Snapshot subcommand for hydra-compose
//!
//! Creates, lists and restores backups of the root document and its modules.

use crate::format::OutputFormat;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments for the snapshot subcommand
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub action: SnapshotAction,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotAction {
    /// Copy the root document and every resolved module into a new snapshot
    Create {
        /// Label appended to the snapshot directory name
        #[arg(value_name = "TAG")]
        tag: String,
    },

    /// List snapshots, newest first
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Restore a snapshot (a safety snapshot is taken first)
    Restore {
        /// Snapshot directory, or its name under the backup directory
        #[arg(value_name = "DIR")]
        snapshot: PathBuf,
    },
}
