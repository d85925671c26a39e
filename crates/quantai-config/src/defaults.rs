use camino::Utf8PathBuf;

/// Directory name of the framework checkout inside the workspace.
pub const DEFAULT_CHECKOUT_NAME: &str = "eliza";

/// Remote cloned when the framework checkout is absent.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/ai16z/eliza.git";

/// Command run in the checkout once every file is in place.
pub const DEFAULT_BUILD_COMMAND: &str = "pnpm install && pnpm build";

/// Default log filter expression used by the installer.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Relative location of the bundled character template inside the plugin
/// sources.
pub const DEFAULT_TEMPLATE_PATH: &str = "characters/quantai.character.json";

/// Borrowed form of [`DEFAULT_LOG_FILTER`] for accessor fallbacks.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value for the configuration loader's defaults layer.
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Compact human-readable lines unless JSON is requested.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Directory used for both the workspace and the plugin sources when none
/// is configured.
pub fn default_working_directory() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}
