//! Hydra-style configuration composition.
//!
//! This module exports the engine used by the `hydra-compose` binary: module
//! resolution, merging, defaults-entry rewrites and snapshots.

pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod modules;
pub mod paths;
pub mod rewrite;
pub mod snapshot;
pub mod workspace;

pub use compose::MergeEngine;
pub use modules::{ConfigModule, ModuleResolver};
pub use snapshot::{SnapshotEntry, SnapshotManager, SnapshotMeta};
pub use workspace::Workspace;
