//! Configuration composition.
//!
//! [`MergeEngine::merge`] is the single entry point. It tries the strict
//! [`NativeComposer`] first and, if that returns a [`ComposeError`], the
//! lenient [`ManualComposer`]. The two strategies share no accumulator
//! state; each builds its result from disk on every call.
//!
//! The returned text is always displayable YAML. Failures are reported as
//! leading `#` comment lines, never as an error value.

pub mod defaults;
pub mod interpolation;
mod manual;
mod native;
pub mod overrides;
pub mod tree;

pub use manual::ManualComposer;
pub use native::NativeComposer;

use crate::config::{MergeSettings, MergeStrategy};
use crate::error::ComposeError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A composition strategy.
pub trait Composer {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Compose `root_document` with `overrides` into one document.
    fn compose(&self, root_document: &Path, overrides: &[String]) -> Result<Value, ComposeError>;
}

/// Read and parse a YAML file, keeping the raw text for header checks.
pub(crate) fn read_fragment(path: &Path) -> Result<(String, Value), ComposeError> {
    let text = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;
    let value = serde_yaml::from_str(&text).map_err(|e| ComposeError::parse(path, e))?;
    Ok((text, value))
}

/// Render a composed document as YAML text.
pub fn render(value: &Value) -> Result<String, ComposeError> {
    Ok(serde_yaml::to_string(value)?)
}

/// Prefix every line of `message` with `# `.
fn comment_lines(message: &str) -> String {
    message
        .lines()
        .map(|line| format!("# {line}\n"))
        .collect()
}

fn error_text(err: &ComposeError) -> String {
    format!("# Error merging config:\n{}", comment_lines(&err.to_string()))
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Produces the merged preview for a configuration root.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    config_root: PathBuf,
    settings: MergeSettings,
}

impl MergeEngine {
    pub fn new(config_root: impl Into<PathBuf>, settings: MergeSettings) -> Self {
        Self {
            config_root: config_root.into(),
            settings,
        }
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Merge `root_document` with `overrides` into rendered YAML.
    ///
    /// Never fails; see the module docs for how errors are reported.
    pub fn merge(&self, root_document: Option<&Path>, overrides: &[String]) -> String {
        let Some(root_document) = root_document else {
            return error_text(&ComposeError::NoRootDocument);
        };

        match self.settings.strategy {
            MergeStrategy::Manual => self.merge_manual(root_document, overrides),
            MergeStrategy::Native => self
                .merge_native(root_document, overrides)
                .unwrap_or_else(|e| error_text(&e)),
            MergeStrategy::Auto => match self.merge_native(root_document, overrides) {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        root = %root_document.display(),
                        error = %e,
                        "Native compose failed, falling back to manual merge"
                    );
                    format!(
                        "# Native compose failed ({}); showing manual merge\n{}",
                        single_line(&e.to_string()),
                        self.merge_manual(root_document, overrides)
                    )
                }
            },
        }
    }

    /// Primary strategy: strict composition plus interpolation.
    ///
    /// Unresolvable interpolations degrade to a warning header; only the
    /// composition step itself can fail.
    pub fn merge_native(
        &self,
        root_document: &Path,
        overrides: &[String],
    ) -> Result<String, ComposeError> {
        let composer = NativeComposer::new(&self.config_root);
        let composed = composer.compose(root_document, overrides)?;
        debug!(strategy = composer.name(), root = %root_document.display(), "Composed");

        if !self.settings.resolve_interpolations {
            return render(&composed);
        }

        let resolution = interpolation::resolve(&composed);
        let body = render(&resolution.value)?;
        let Some(first) = resolution.failures.first() else {
            return Ok(body);
        };

        debug!(count = resolution.failures.len(), "Unresolved interpolations");
        let mut header = String::from("# Warning: some interpolations could not be resolved\n");
        header.push_str(&format!("#   ({})\n", single_line(&first.to_string())));
        if resolution.failures.len() > 1 {
            let unresolved: Vec<String> = resolution
                .failures
                .iter()
                .map(|f| single_line(&f.expression))
                .collect();
            header.push_str(&format!("#   unresolved: {}\n", unresolved.join(", ")));
        }
        Ok(header + &body)
    }

    /// Fallback strategy. Its own failure is the terminal error comment.
    pub fn merge_manual(&self, root_document: &Path, overrides: &[String]) -> String {
        let composer = ManualComposer::new(&self.config_root);
        match composer
            .compose(root_document, overrides)
            .and_then(|value| render(&value))
        {
            Ok(text) => text,
            Err(e) => {
                warn!(root = %root_document.display(), error = %e, "Manual merge failed");
                error_text(&e)
            }
        }
    }
}
