//! Structured error types for the composition engine.
//!
//! Only the write paths surface errors to callers: rewriting a defaults entry
//! and restoring a snapshot. Composition failures are values consumed by the
//! merge engine's fallback logic and never escape `MergeEngine::merge`.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the module resolver's write operations.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No root document is selected and none could be detected.
    #[error("no root document is loaded")]
    NoRootDocument,

    /// The root document has no line encoding the requested defaults entry.
    #[error("could not find defaults entry for {group}/{name} in {}", path.display())]
    EntryNotFound {
        group: String,
        name: String,
        path: PathBuf,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ResolveError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors raised by the snapshot engine.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot directory has no manifest; nothing can be restored.
    #[error("snapshot metadata not found: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// The manifest exists but is not valid JSON of the expected shape.
    #[error("snapshot metadata is invalid in {}: {source}", path.display())]
    ManifestInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SnapshotError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Structured failure of a composition strategy.
///
/// Returned by [`crate::compose::Composer::compose`]; the merge engine turns
/// it into either a fallback attempt or a commented error line.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("no root document found")]
    NoRootDocument,

    #[error("could not find module '{group}/{name}' (expected {})", path.display())]
    MissingModule {
        group: String,
        name: String,
        path: PathBuf,
    },

    #[error("unsupported defaults entry: {0}")]
    UnsupportedEntry(String),

    #[error("'override {group}' has no earlier defaults entry to override")]
    OverrideWithoutTarget { group: String },

    #[error("invalid override '{0}': expected key=value")]
    InvalidOverride(String),

    #[error("could not override '{key}': key not found (use +{key}=... to add it)")]
    KeyNotFound { key: String },

    #[error("could not append '{key}': key already exists (use ++{key}=... to force)")]
    KeyExists { key: String },

    #[error("could not delete '{key}': key not found")]
    DeleteMissing { key: String },

    #[error("cannot set '{key}': '{parent}' is not a mapping")]
    NotAMapping { key: String, parent: String },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to render composed config: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ComposeError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, source: serde_yaml::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors loading the tool's own settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid merged settings: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_not_found_message() {
        let err = ResolveError::EntryNotFound {
            group: "model".into(),
            name: "resnet".into(),
            path: PathBuf::from("conf/config.yaml"),
        };
        assert_eq!(
            err.to_string(),
            "could not find defaults entry for model/resnet in conf/config.yaml"
        );
    }

    #[test]
    fn test_manifest_missing_message() {
        let err = SnapshotError::ManifestMissing {
            path: PathBuf::from("b/meta.json"),
        };
        assert!(err.to_string().contains("b/meta.json"));
    }

    #[test]
    fn test_compose_error_hints() {
        let err = ComposeError::KeyNotFound { key: "lr".into() };
        assert!(err.to_string().contains("+lr="));
        let err = ComposeError::KeyExists { key: "lr".into() };
        assert!(err.to_string().contains("++lr="));
    }
}
