//! Assembly of the agent's character configuration document.
//!
//! The document is produced in one of two ways:
//!
//! - **fresh**: identity defaults plus every credential under
//!   `settings.secrets`, written below the plugin package;
//! - **template**: a bundled JSON template whose top-level `secrets` object
//!   receives the authentication credentials and whose `settings` object
//!   receives the platform account details. Every other template key is kept.
//!   The result is written below the framework checkout root.
//!
//! In both cases the credentials are collected while the document is built
//! and the target file is overwritten unconditionally.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::json::render_pretty;
use crate::prompt::Prompter;
use crate::secrets::{PromptError, SecretCollector, SecretScope, SecretSet};

/// Tracing target for character assembly.
const CHARACTER_TARGET: &str = "quantai_installer::character";

/// Directory holding character documents.
pub const CHARACTER_DIR: &str = "characters";

/// File name of the generated character document.
pub const CHARACTER_FILE: &str = "quantai.character.json";

/// Top-level key receiving authentication credentials in a template.
pub const SECRETS_KEY: &str = "secrets";

/// Top-level key receiving platform account details in a template.
pub const SETTINGS_KEY: &str = "settings";

const DEFAULT_NAME: &str = "QuantAI";
const DEFAULT_DESCRIPTION: &str = "A trading assistant AI";
const DEFAULT_MODEL_PROVIDER: &str = "openai";
const DEFAULT_CLIENTS: [&str; 2] = ["telegram", "twitter"];

/// Character document built from fixed identity defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDocument {
    /// Display name of the agent.
    pub name: String,
    /// Account handle of the agent.
    pub username: String,
    /// One-line description.
    pub description: String,
    /// Language model backend.
    pub model_provider: String,
    /// Enabled chat clients.
    pub clients: Vec<String>,
    /// Runtime settings, including every credential.
    pub settings: CharacterSettings,
}

/// `settings` section of a [`CharacterDocument`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharacterSettings {
    /// Credentials keyed by their document key, in collection order.
    pub secrets: Map<String, Value>,
}

impl CharacterDocument {
    /// Builds the default identity with `secrets` stored under
    /// `settings.secrets`.
    #[must_use]
    pub fn with_secrets(secrets: &SecretSet) -> Self {
        let entries = secrets
            .iter()
            .map(|(field, value)| (field.key().to_owned(), Value::String(value.to_owned())))
            .collect();
        Self {
            name: DEFAULT_NAME.to_owned(),
            username: DEFAULT_NAME.to_owned(),
            description: DEFAULT_DESCRIPTION.to_owned(),
            model_provider: DEFAULT_MODEL_PROVIDER.to_owned(),
            clients: DEFAULT_CLIENTS.iter().map(|client| (*client).to_owned()).collect(),
            settings: CharacterSettings { secrets: entries },
        }
    }
}

/// Ways a template document can have the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CharacterShapeError {
    /// The template root is not a JSON object.
    #[error("character template root is not a JSON object")]
    RootNotObject,
    /// A section that receives credentials exists but is not an object.
    #[error("character template section '{section}' is not a JSON object")]
    SectionNotObject {
        /// Offending top-level key.
        section: &'static str,
    },
}

/// Errors raised while producing the character configuration.
#[derive(Debug, Error)]
pub enum CharacterError {
    /// The template could not be read.
    #[error("failed to read character template '{path}': {source}")]
    ReadTemplate {
        /// Template path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The template is not valid JSON.
    #[error("failed to parse character template '{path}': {source}")]
    ParseTemplate {
        /// Template path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The template parsed but cannot receive credentials.
    #[error("invalid character template '{path}': {source}")]
    Shape {
        /// Template path.
        path: Utf8PathBuf,
        /// Shape violation.
        #[source]
        source: CharacterShapeError,
    },
    /// Collecting credentials from the operator failed.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// The document could not be serialised.
    #[error("failed to serialise character document '{path}': {source}")]
    Serialize {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The output directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The document could not be written.
    #[error("failed to write character document '{path}': {source}")]
    Write {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Where the document content starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Defaults,
    Template(Utf8PathBuf),
}

/// Produces the character configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterConfigBuilder {
    origin: Origin,
    output_dir: Utf8PathBuf,
}

impl CharacterConfigBuilder {
    /// Builds from identity defaults into `<output_root>/characters`.
    #[must_use]
    pub fn fresh(output_root: &Utf8Path) -> Self {
        Self {
            origin: Origin::Defaults,
            output_dir: output_root.join(CHARACTER_DIR),
        }
    }

    /// Builds from the template at `template` into
    /// `<output_root>/characters`.
    #[must_use]
    pub fn from_template(template: impl Into<Utf8PathBuf>, output_root: &Utf8Path) -> Self {
        Self {
            origin: Origin::Template(template.into()),
            output_dir: output_root.join(CHARACTER_DIR),
        }
    }

    /// Path of the file [`Self::build`] writes.
    #[must_use]
    pub fn output_path(&self) -> Utf8PathBuf {
        self.output_dir.join(CHARACTER_FILE)
    }

    /// Collects credentials and writes the document, returning its path.
    ///
    /// A template is loaded and checked before the operator is prompted, so
    /// a broken template fails without asking for anything.
    ///
    /// # Errors
    ///
    /// Returns a [`CharacterError`] when the template cannot be loaded or has
    /// the wrong shape, when prompting fails, or when the output cannot be
    /// written.
    pub fn build<P: Prompter>(
        &self,
        collector: &mut SecretCollector<P>,
    ) -> Result<Utf8PathBuf, CharacterError> {
        let output = self.output_path();
        let rendered = match &self.origin {
            Origin::Defaults => {
                let secrets = collector.collect()?;
                let document = CharacterDocument::with_secrets(&secrets);
                render_pretty(&document)
            }
            Origin::Template(template) => {
                let mut document = load_template(template)?;
                let secrets = collector.collect()?;
                merge_secrets(&mut document, &secrets).map_err(|source| {
                    CharacterError::Shape {
                        path: template.clone(),
                        source,
                    }
                })?;
                render_pretty(&document)
            }
        }
        .map_err(|source| CharacterError::Serialize {
            path: output.clone(),
            source,
        })?;

        fs::create_dir_all(&self.output_dir).map_err(|source| CharacterError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;
        fs::write(&output, rendered).map_err(|source| CharacterError::Write {
            path: output.clone(),
            source,
        })?;

        info!(target: CHARACTER_TARGET, path = %output, "wrote character configuration");
        Ok(output)
    }
}

fn load_template(path: &Utf8Path) -> Result<Value, CharacterError> {
    let text = fs::read_to_string(path).map_err(|source| CharacterError::ReadTemplate {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value =
        serde_json::from_str(&text).map_err(|source| CharacterError::ParseTemplate {
            path: path.to_path_buf(),
            source,
        })?;
    check_shape(&document).map_err(|source| CharacterError::Shape {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(target: CHARACTER_TARGET, path = %path, "loaded character template");
    Ok(document)
}

fn check_shape(document: &Value) -> Result<(), CharacterShapeError> {
    let root = document
        .as_object()
        .ok_or(CharacterShapeError::RootNotObject)?;
    for section in [SECRETS_KEY, SETTINGS_KEY] {
        if root.get(section).is_some_and(|value| !value.is_object()) {
            return Err(CharacterShapeError::SectionNotObject { section });
        }
    }
    Ok(())
}

/// Top-level key a credential of `scope` is written under.
const fn section_for(scope: SecretScope) -> &'static str {
    match scope {
        SecretScope::Authentication => SECRETS_KEY,
        SecretScope::Platform => SETTINGS_KEY,
    }
}

/// Writes `secrets` into a template document using the split layout.
///
/// Missing `secrets` or `settings` objects are created; existing keys inside
/// them are overwritten and every other key is left alone.
///
/// # Errors
///
/// Returns a [`CharacterShapeError`] when the root or a target section is
/// not an object. The document is not modified in that case.
pub fn merge_secrets(document: &mut Value, secrets: &SecretSet) -> Result<(), CharacterShapeError> {
    check_shape(document)?;
    let root = document
        .as_object_mut()
        .ok_or(CharacterShapeError::RootNotObject)?;

    for (field, value) in secrets.iter() {
        let section = section_for(field.scope());
        let target = root
            .entry(section)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(CharacterShapeError::SectionNotObject { section })?;
        target.insert(field.key().to_owned(), Value::String(value.to_owned()));
    }
    Ok(())
}
