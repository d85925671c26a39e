//! Registration of the plugin in the framework's dependency manifest.
//!
//! The agent runtime's `package.json` must depend on the plugin through a
//! workspace reference so the package manager links the local copy instead
//! of fetching from a registry.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::json::render_pretty;

/// Tracing target for manifest patching.
const MANIFEST_TARGET: &str = "quantai_installer::manifest";

/// Package name the plugin is published under.
pub const PLUGIN_PACKAGE: &str = "@ai16z/plugin-trading-assistant";

/// Version specification resolving a dependency from the local workspace.
pub const WORKSPACE_REFERENCE: &str = "workspace:*";

/// Key of the dependency mapping inside the manifest.
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Ways a manifest document can have the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ManifestShapeError {
    /// The document root is not a JSON object.
    #[error("manifest root is not a JSON object")]
    RootNotObject,
    /// The document has no `dependencies` key.
    #[error("manifest has no 'dependencies' mapping")]
    MissingDependencies,
    /// `dependencies` is present but not an object.
    #[error("manifest 'dependencies' is not a JSON object")]
    DependenciesNotObject,
}

/// Errors raised while patching a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be read.
    #[error("failed to read manifest '{path}': {source}")]
    Read {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The manifest is not valid JSON.
    #[error("failed to parse manifest '{path}': {source}")]
    Parse {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The manifest parsed but has the wrong shape.
    #[error("invalid manifest '{path}': {source}")]
    Shape {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Shape violation.
        #[source]
        source: ManifestShapeError,
    },
    /// The patched manifest could not be serialised.
    #[error("failed to serialise manifest '{path}': {source}")]
    Serialize {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The patched manifest could not be written.
    #[error("failed to write manifest '{path}': {source}")]
    Write {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result of registering the dependency in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The dependency was not present before.
    Inserted,
    /// The dependency pointed somewhere else and was overwritten.
    Replaced {
        /// Previous version specification.
        previous: Value,
    },
    /// The dependency already had the expected specification.
    Unchanged,
}

/// Inserts or overwrites one dependency in a JSON manifest.
///
/// # Example
///
/// ```
/// use quantai_installer::manifest::{ManifestPatcher, PatchOutcome};
///
/// let mut document = serde_json::json!({ "dependencies": { "x": "1.0.0" } });
/// let outcome = ManifestPatcher::default().patch_value(&mut document).unwrap();
///
/// assert_eq!(outcome, PatchOutcome::Inserted);
/// assert_eq!(document["dependencies"]["x"], "1.0.0");
/// assert_eq!(
///     document["dependencies"]["@ai16z/plugin-trading-assistant"],
///     "workspace:*"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPatcher {
    package: String,
    version_spec: String,
}

impl Default for ManifestPatcher {
    fn default() -> Self {
        Self::new(PLUGIN_PACKAGE, WORKSPACE_REFERENCE)
    }
}

impl ManifestPatcher {
    /// Creates a patcher registering `package` at `version_spec`.
    #[must_use]
    pub fn new(package: impl Into<String>, version_spec: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version_spec: version_spec.into(),
        }
    }

    /// Package name written into the mapping.
    #[must_use]
    pub const fn package(&self) -> &str {
        self.package.as_str()
    }

    /// Registers the dependency in an in-memory document, leaving every other
    /// key untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestShapeError`] when the document has no
    /// `dependencies` object.
    pub fn patch_value(&self, document: &mut Value) -> Result<PatchOutcome, ManifestShapeError> {
        let root = document
            .as_object_mut()
            .ok_or(ManifestShapeError::RootNotObject)?;
        let dependencies = root
            .get_mut(DEPENDENCIES_KEY)
            .ok_or(ManifestShapeError::MissingDependencies)?
            .as_object_mut()
            .ok_or(ManifestShapeError::DependenciesNotObject)?;

        let wanted = Value::String(self.version_spec.clone());
        let outcome = match dependencies.insert(self.package.clone(), wanted.clone()) {
            None => PatchOutcome::Inserted,
            Some(previous) if previous == wanted => PatchOutcome::Unchanged,
            Some(previous) => PatchOutcome::Replaced { previous },
        };
        Ok(outcome)
    }

    /// Reads, patches, and rewrites the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] when the file is missing, unreadable, not
    /// JSON, has the wrong shape, or cannot be written back.
    pub fn patch_file(&self, path: &Utf8Path) -> Result<PatchOutcome, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document: Value =
            serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let outcome = self
            .patch_value(&mut document)
            .map_err(|source| ManifestError::Shape {
                path: path.to_path_buf(),
                source,
            })?;

        let rendered = render_pretty(&document).map_err(|source| ManifestError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, rendered).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            target: MANIFEST_TARGET,
            path = %path,
            package = self.package.as_str(),
            outcome = ?outcome,
            "registered plugin dependency"
        );
        Ok(outcome)
    }
}
