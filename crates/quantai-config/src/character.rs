use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Selects how the character configuration document is produced.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CharacterMode {
    /// Load the bundled template and overwrite its `secrets` and `settings`
    /// sections; the result lands under the framework checkout.
    #[default]
    Template,
    /// Build the document from fixed identity defaults with every credential
    /// under `settings.secrets`; the result lands under the plugin package.
    Fresh,
}
