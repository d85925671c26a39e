//! Interactive collection of the credentials written into the character
//! configuration.
//!
//! Every field accepts a blank answer as an explicit skip, and the empty
//! string is stored as a real value. Two fields are special:
//!
//! - the database URL is assembled from several sub-prompts, and a blank
//!   database name skips the rest of them;
//! - the session cookie blob is base64 text whose decoded payload must be
//!   JSON. Invalid blobs degrade to an empty value with a warning instead of
//!   aborting the run.

use std::fmt;
use std::io;
use std::string::FromUtf8Error;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::prompt::Prompter;

/// Tracing target for secret collection.
const SECRETS_TARGET: &str = "quantai_installer::secrets";

/// Suffix advertising the blank-to-skip convention.
pub const SKIP_HINT: &str = "press Enter to skip";

/// Host used when the database host prompt is left blank.
pub const DEFAULT_DATABASE_HOST: &str = "localhost";

/// Port used when the database port prompt is left blank.
pub const DEFAULT_DATABASE_PORT: &str = "5432";

/// Characters escaped in the database name, which forms the URL path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped in the userinfo part of the database URL.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Where a credential belongs in the split character layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretScope {
    /// Authentication material kept under `secrets`.
    Authentication,
    /// Platform account details kept under `settings`.
    Platform,
}

/// A credential the installer asks the operator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretField {
    /// PostgreSQL connection string for the trading database.
    DatabaseUrl,
    /// OpenAI API key.
    OpenAiApiKey,
    /// Telegram bot token.
    TelegramBotToken,
    /// Twitter account username.
    TwitterUsername,
    /// Twitter account password.
    TwitterPassword,
    /// Twitter account email.
    TwitterEmail,
    /// Base64-encoded JSON cookie jar for the Twitter session.
    TwitterCookies,
}

impl SecretField {
    /// Every field in prompt order.
    pub const ALL: [Self; 7] = [
        Self::DatabaseUrl,
        Self::OpenAiApiKey,
        Self::TelegramBotToken,
        Self::TwitterUsername,
        Self::TwitterPassword,
        Self::TwitterEmail,
        Self::TwitterCookies,
    ];

    /// Key used in the character configuration document.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::DatabaseUrl => "TRADING_DB_URL",
            Self::OpenAiApiKey => "OPENAI_API_KEY",
            Self::TelegramBotToken => "TELEGRAM_BOT_TOKEN",
            Self::TwitterUsername => "TWITTER_USERNAME",
            Self::TwitterPassword => "TWITTER_PASSWORD",
            Self::TwitterEmail => "TWITTER_EMAIL",
            Self::TwitterCookies => "TWITTER_COOKIES",
        }
    }

    /// Human-readable prompt label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DatabaseUrl => "Trading database URL",
            Self::OpenAiApiKey => "OpenAI API Key",
            Self::TelegramBotToken => "Telegram Bot Token",
            Self::TwitterUsername => "Twitter Username",
            Self::TwitterPassword => "Twitter Password",
            Self::TwitterEmail => "Twitter Email",
            Self::TwitterCookies => "Twitter Cookies (base64)",
        }
    }

    /// Section of the split layout this field is written to.
    #[must_use]
    pub const fn scope(self) -> SecretScope {
        match self {
            Self::TwitterUsername | Self::TwitterEmail => SecretScope::Platform,
            _ => SecretScope::Authentication,
        }
    }
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered credential values gathered during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSet {
    entries: Vec<(SecretField, String)>,
}

impl SecretSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Stores `value` for `field`, replacing any earlier value in place.
    pub fn insert(&mut self, field: SecretField, value: impl Into<String>) {
        let text = value.into();
        match self.entries.iter_mut().find(|(known, _)| *known == field) {
            Some(entry) => entry.1 = text,
            None => self.entries.push((field, text)),
        }
    }

    /// Returns the value stored for `field`.
    #[must_use]
    pub fn get(&self, field: SecretField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(known, _)| *known == field)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over the stored values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SecretField, &str)> {
        self.entries
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }

    /// Number of stored fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors raised while talking to the operator.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The prompt could not be shown or the answer could not be read.
    #[error("failed to read answer for '{label}': {source}")]
    Read {
        /// Label of the prompt that failed.
        label: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Reasons a cookie blob is rejected.
#[derive(Debug, Error)]
pub enum CookieError {
    /// The text is not valid base64.
    #[error("cookie blob is not valid base64: {0}")]
    Encoding(#[source] base64::DecodeError),
    /// The decoded bytes are not UTF-8 text.
    #[error("decoded cookie blob is not UTF-8: {0}")]
    Utf8(#[source] FromUtf8Error),
    /// The decoded text is not JSON.
    #[error("decoded cookie blob is not JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// Decodes a base64 cookie blob and checks that the payload is JSON.
///
/// Surrounding whitespace is ignored; the returned text is exactly the
/// decoded payload.
///
/// # Errors
///
/// Returns a [`CookieError`] describing the first check that failed.
pub fn try_decode_cookie_blob(encoded: &str) -> Result<String, CookieError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(CookieError::Encoding)?;
    let text = String::from_utf8(bytes).map_err(CookieError::Utf8)?;
    serde_json::from_str::<serde_json::Value>(&text).map_err(CookieError::Json)?;
    Ok(text)
}

/// Decodes a cookie blob, degrading to an empty string with a warning when
/// the blob is invalid. A blank blob is an explicit skip.
#[must_use]
pub fn decode_cookie_blob(encoded: &str) -> String {
    if encoded.trim().is_empty() {
        return String::new();
    }
    match try_decode_cookie_blob(encoded) {
        Ok(text) => text,
        Err(error) => {
            warn!(
                target: SECRETS_TARGET,
                field = SecretField::TwitterCookies.key(),
                %error,
                "ignoring invalid cookie blob; the field is left empty"
            );
            String::new()
        }
    }
}

/// Parts of a PostgreSQL connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUrlParts {
    /// Database name.
    pub database: String,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: String,
    /// Login role.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl DatabaseUrlParts {
    /// Renders the connection string, escaping the userinfo and the database
    /// name.
    ///
    /// The host is written as given so bracketed IPv6 literals such as
    /// `[::1]` keep their authority syntax.
    #[must_use]
    pub fn to_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            utf8_percent_encode(&self.username, USERINFO),
            utf8_percent_encode(&self.password, USERINFO),
            self.host,
            self.port,
            utf8_percent_encode(&self.database, PATH_SEGMENT)
        )
    }
}

/// Gathers a [`SecretSet`] through a [`Prompter`].
#[derive(Debug)]
pub struct SecretCollector<P> {
    prompter: P,
}

impl<P> SecretCollector<P> {
    /// Creates a collector asking questions through `prompter`.
    #[must_use]
    pub const fn new(prompter: P) -> Self {
        Self { prompter }
    }

    /// Returns the wrapped prompter.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.prompter
    }
}

impl<P: Prompter> SecretCollector<P> {
    /// Asks for every [`SecretField`] in order.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the operator cannot be prompted. An
    /// invalid cookie blob is not an error.
    pub fn collect(&mut self) -> Result<SecretSet, PromptError> {
        let mut secrets = SecretSet::new();
        for field in SecretField::ALL {
            let value = self.collect_field(field)?;
            debug!(
                target: SECRETS_TARGET,
                field = field.key(),
                provided = !value.is_empty(),
                "collected secret"
            );
            secrets.insert(field, value);
        }
        Ok(secrets)
    }

    /// Asks for a single field.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the operator cannot be prompted.
    pub fn collect_field(&mut self, field: SecretField) -> Result<String, PromptError> {
        match field {
            SecretField::DatabaseUrl => self.database_url(),
            SecretField::TwitterCookies => {
                let encoded = self.ask_skippable(field.label())?;
                Ok(decode_cookie_blob(&encoded))
            }
            _ => self.ask_skippable(field.label()),
        }
    }

    fn database_url(&mut self) -> Result<String, PromptError> {
        info!(
            target: SECRETS_TARGET,
            "Please enter PostgreSQL connection details ({SKIP_HINT}):"
        );
        let database = self.ask("Database name")?;
        if database.is_empty() {
            return Ok(String::new());
        }

        let host = self.ask(&format!("Host (default: {DEFAULT_DATABASE_HOST})"))?;
        let port = self.ask(&format!("Port (default: {DEFAULT_DATABASE_PORT})"))?;
        let parts = DatabaseUrlParts {
            database,
            host: or_default(host, DEFAULT_DATABASE_HOST),
            port: or_default(port, DEFAULT_DATABASE_PORT),
            username: self.ask("Username")?,
            password: self.ask("Password")?,
        };
        Ok(parts.to_url())
    }

    fn ask_skippable(&mut self, label: &str) -> Result<String, PromptError> {
        self.ask(&format!("{label} ({SKIP_HINT})"))
    }

    fn ask(&mut self, label: &str) -> Result<String, PromptError> {
        self.prompter
            .prompt(label)
            .map(|answer| answer.trim().to_owned())
            .map_err(|source| PromptError::Read {
                label: label.to_owned(),
                source,
            })
    }
}

fn or_default(answer: String, fallback: &str) -> String {
    if answer.is_empty() {
        fallback.to_owned()
    } else {
        answer
    }
}
