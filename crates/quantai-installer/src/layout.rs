//! Filesystem locations touched by an installation run.

use camino::{Utf8Path, Utf8PathBuf};
use quantai_config::{CharacterMode, InstallerConfig};
use thiserror::Error;

/// Location of the plugin package inside the checkout.
pub const PLUGIN_PACKAGE_DIR: &str = "packages/plugin-trading-assistant";

/// Location of the agent manifest inside the checkout.
pub const AGENT_MANIFEST: &str = "agent/package.json";

/// Location of the agent entry point inside the checkout.
pub const AGENT_ENTRY_POINT: &str = "agent/src/index.ts";

/// Replacement entry point shipped with the plugin sources.
pub const ENTRY_POINT_BACKUP: &str = "index.ts.backup";

/// Errors raised while resolving the layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The checkout name is not a single path component.
    #[error("checkout name '{name}' must be a single directory name")]
    InvalidCheckoutName {
        /// Rejected name.
        name: String,
    },
}

/// Resolved paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    workspace_dir: Utf8PathBuf,
    checkout_name: String,
    plugin_source: Utf8PathBuf,
    character_template: Utf8PathBuf,
}

impl InstallLayout {
    /// Creates a layout from explicit locations.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidCheckoutName`] when `checkout_name` is
    /// empty, `.` or `..`, or contains a path separator.
    pub fn new(
        workspace_dir: impl Into<Utf8PathBuf>,
        checkout_name: impl Into<String>,
        plugin_source: impl Into<Utf8PathBuf>,
        character_template: impl Into<Utf8PathBuf>,
    ) -> Result<Self, LayoutError> {
        let name = checkout_name.into();
        if !is_single_component(&name) {
            return Err(LayoutError::InvalidCheckoutName { name });
        }
        Ok(Self {
            workspace_dir: workspace_dir.into(),
            checkout_name: name,
            plugin_source: plugin_source.into(),
            character_template: character_template.into(),
        })
    }

    /// Resolves the layout from configuration, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] when the configured checkout name is invalid.
    pub fn from_config(config: &InstallerConfig) -> Result<Self, LayoutError> {
        let plugin_source = config.plugin_source();
        let template = config.character_template(&plugin_source);
        Self::new(
            config.workspace_dir(),
            config.checkout_name(),
            plugin_source,
            template,
        )
    }

    /// Directory containing the checkout.
    #[must_use]
    pub fn workspace_dir(&self) -> &Utf8Path {
        &self.workspace_dir
    }

    /// Directory name of the checkout.
    #[must_use]
    pub fn checkout_name(&self) -> &str {
        &self.checkout_name
    }

    /// Root of the plugin sources.
    #[must_use]
    pub fn plugin_source(&self) -> &Utf8Path {
        &self.plugin_source
    }

    /// Template used in [`CharacterMode::Template`].
    #[must_use]
    pub fn character_template(&self) -> &Utf8Path {
        &self.character_template
    }

    /// The framework checkout.
    #[must_use]
    pub fn checkout_dir(&self) -> Utf8PathBuf {
        self.workspace_dir.join(&self.checkout_name)
    }

    /// Destination of the plugin sources inside the checkout.
    #[must_use]
    pub fn plugin_destination(&self) -> Utf8PathBuf {
        self.checkout_dir().join(PLUGIN_PACKAGE_DIR)
    }

    /// The agent's dependency manifest.
    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.checkout_dir().join(AGENT_MANIFEST)
    }

    /// Entry point copy shipped with the plugin.
    #[must_use]
    pub fn entry_point_backup(&self) -> Utf8PathBuf {
        self.plugin_source.join(ENTRY_POINT_BACKUP)
    }

    /// Entry point replaced inside the checkout.
    #[must_use]
    pub fn entry_point_target(&self) -> Utf8PathBuf {
        self.checkout_dir().join(AGENT_ENTRY_POINT)
    }

    /// Root directory the character document is written below in `mode`.
    #[must_use]
    pub fn character_root(&self, mode: CharacterMode) -> Utf8PathBuf {
        match mode {
            CharacterMode::Fresh => self.plugin_destination(),
            CharacterMode::Template => self.checkout_dir(),
        }
    }
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
