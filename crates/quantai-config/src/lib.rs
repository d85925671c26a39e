//! Layered configuration for the QuantAI installer.
//!
//! [`InstallerConfig`] is resolved by `ortho_config` from, in increasing
//! precedence, the built-in defaults in [`defaults`], a configuration file
//! named with `--config-path`, `QUANTAI_*` environment variables, and
//! command-line flags. The loader fills every scalar setting from the defaults
//! layer. Path settings stay unset unless configured and are derived by the
//! accessors below, which also cover values built without the loader.

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod character;
pub mod defaults;
mod logging;

pub use character::CharacterMode;
pub use defaults::{
    DEFAULT_BUILD_COMMAND, DEFAULT_CHECKOUT_NAME, DEFAULT_LOG_FILTER, DEFAULT_REPOSITORY_URL,
    DEFAULT_TEMPLATE_PATH, default_log_filter, default_log_filter_string, default_log_format,
    default_working_directory,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Operator-tunable settings for an installation run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "QUANTAI")]
pub struct InstallerConfig {
    /// Directory the framework checkout lives in (or is cloned into).
    pub workspace_dir: Option<Utf8PathBuf>,
    /// Directory name of the framework checkout inside the workspace.
    #[ortho_config(default = String::from(DEFAULT_CHECKOUT_NAME))]
    pub checkout_name: Option<String>,
    /// Remote cloned when the checkout is absent.
    #[ortho_config(default = String::from(DEFAULT_REPOSITORY_URL))]
    pub repository_url: Option<String>,
    /// Root of the plugin sources copied into the checkout.
    pub plugin_source: Option<Utf8PathBuf>,
    /// How the character configuration document is produced.
    #[ortho_config(default = CharacterMode::Template)]
    pub character_mode: Option<CharacterMode>,
    /// Template read in [`CharacterMode::Template`].
    pub character_template: Option<Utf8PathBuf>,
    /// Shell command that installs dependencies and builds the checkout.
    #[ortho_config(default = String::from(DEFAULT_BUILD_COMMAND))]
    pub build_command: Option<String>,
    /// `tracing` filter directive, for example `info` or `quantai=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: Option<String>,
    /// Output format of the structured log stream.
    #[ortho_config(default = default_log_format())]
    pub log_format: Option<LogFormat>,
}

impl InstallerConfig {
    /// Resolves configuration from the given argument list plus the
    /// environment and any configuration file it names.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a source cannot be read or a value fails
    /// to parse.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Directory the framework checkout lives in.
    #[must_use]
    pub fn workspace_dir(&self) -> Utf8PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(default_working_directory)
    }

    /// Directory name of the framework checkout.
    #[must_use]
    pub fn checkout_name(&self) -> &str {
        self.checkout_name
            .as_deref()
            .unwrap_or(DEFAULT_CHECKOUT_NAME)
    }

    /// Remote cloned when the checkout is absent.
    #[must_use]
    pub fn repository_url(&self) -> &str {
        self.repository_url
            .as_deref()
            .unwrap_or(DEFAULT_REPOSITORY_URL)
    }

    /// Root of the plugin sources.
    #[must_use]
    pub fn plugin_source(&self) -> Utf8PathBuf {
        self.plugin_source
            .clone()
            .unwrap_or_else(default_working_directory)
    }

    /// Selected character construction mode.
    #[must_use]
    pub fn character_mode(&self) -> CharacterMode {
        self.character_mode.unwrap_or_default()
    }

    /// Template path, defaulting to the copy bundled with the plugin sources.
    #[must_use]
    pub fn character_template(&self, plugin_source: &Utf8Path) -> Utf8PathBuf {
        self.character_template
            .clone()
            .unwrap_or_else(|| plugin_source.join(DEFAULT_TEMPLATE_PATH))
    }

    /// Install-and-build command run inside the checkout.
    #[must_use]
    pub fn build_command(&self) -> &str {
        self.build_command
            .as_deref()
            .unwrap_or(DEFAULT_BUILD_COMMAND)
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}
