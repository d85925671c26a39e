//! Filtered, recursive copy of the plugin sources into the framework
//! checkout.
//!
//! [`ExcludeRules`] decide per entry name whether something is skipped. The
//! rules are consulted at every depth of the walk, which also keeps the
//! framework checkout itself out of the copy when it lives inside the plugin
//! directory.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use thiserror::Error;
use tracing::{debug, warn};

/// Tracing target for synchronisation.
const SYNC_TARGET: &str = "quantai_installer::sync";

/// Leading marker turning a rule into a suffix match.
pub const WILDCARD: char = '*';

/// Rules excluded on every run besides the checkout directory name.
pub const DEFAULT_EXCLUDES: [&str; 4] = [".git", "__pycache__", "*.pyc", "node_modules"];

/// A single exclusion pattern.
///
/// A name matches when the pattern is a substring of it, or when the pattern
/// starts with [`WILDCARD`] and the name ends with the rest of the pattern.
///
/// # Example
///
/// ```
/// use quantai_installer::sync::ExcludeRule;
///
/// assert!(ExcludeRule::new(".git").matches(".gitignore"));
/// assert!(ExcludeRule::new("*.pyc").matches("module.cpython-311.pyc"));
/// assert!(!ExcludeRule::new("*.pyc").matches("module.py"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExcludeRule {
    pattern: String,
}

impl ExcludeRule {
    /// Creates a rule from its textual pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Returns the textual pattern.
    #[must_use]
    pub const fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns `true` when `name` is excluded by this rule.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.pattern.as_str())
            || self
                .pattern
                .strip_prefix(WILDCARD)
                .is_some_and(|suffix| name.ends_with(suffix))
    }
}

/// Unordered set of [`ExcludeRule`]s; a name is excluded if any rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeRules {
    rules: Vec<ExcludeRule>,
}

impl ExcludeRules {
    /// Creates a rule set from patterns.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: patterns.into_iter().map(ExcludeRule::new).collect(),
        }
    }

    /// Default rules for a framework checkout named `checkout_name`.
    #[must_use]
    pub fn for_checkout(checkout_name: &str) -> Self {
        Self::new(std::iter::once(checkout_name).chain(DEFAULT_EXCLUDES))
    }

    /// Returns the first rule excluding `name`.
    #[must_use]
    pub fn matching_rule(&self, name: &str) -> Option<&ExcludeRule> {
        self.rules.iter().find(|rule| rule.matches(name))
    }

    /// Returns `true` when any rule excludes `name`.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.matching_rule(name).is_some()
    }

    /// Iterates over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &ExcludeRule> {
        self.rules.iter()
    }
}

/// Counters reported after a synchronisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Regular files written to the destination.
    pub files: usize,
    /// Directories walked and mirrored.
    pub directories: usize,
    /// Entries skipped by an exclude rule.
    pub excluded: usize,
    /// Entries that are neither files nor directories, or have non-UTF-8
    /// names.
    pub skipped: usize,
}

/// Errors raised while copying the plugin tree.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A source directory could not be opened or listed.
    #[error("failed to read source directory '{path}': {source}")]
    ReadSource {
        /// Directory being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A destination directory could not be created or opened.
    #[error("failed to prepare destination directory '{path}': {source}")]
    PrepareDestination {
        /// Directory being prepared.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A file could not be copied.
    #[error("failed to copy '{path}': {source}")]
    CopyFile {
        /// Source file being copied.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Mirrors a directory tree into a destination, honouring [`ExcludeRules`].
///
/// Re-running onto a populated destination overwrites files in place.
#[derive(Debug, Clone)]
pub struct FileSynchronizer {
    rules: ExcludeRules,
}

impl FileSynchronizer {
    /// Creates a synchroniser applying `rules`.
    #[must_use]
    pub const fn new(rules: ExcludeRules) -> Self {
        Self { rules }
    }

    /// Returns the active rules.
    #[must_use]
    pub const fn rules(&self) -> &ExcludeRules {
        &self.rules
    }

    /// Copies `source` into `destination`, creating the destination when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] naming the path on the first filesystem
    /// failure. Files copied before the failure stay in place.
    pub fn sync(
        &self,
        source: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<SyncSummary, SyncError> {
        let source_dir = Dir::open_ambient_dir(source, ambient_authority()).map_err(|err| {
            SyncError::ReadSource {
                path: source.to_path_buf(),
                source: err,
            }
        })?;

        std::fs::create_dir_all(destination).map_err(|err| SyncError::PrepareDestination {
            path: destination.to_path_buf(),
            source: err,
        })?;
        let destination_dir =
            Dir::open_ambient_dir(destination, ambient_authority()).map_err(|err| {
                SyncError::PrepareDestination {
                    path: destination.to_path_buf(),
                    source: err,
                }
            })?;

        let mut summary = SyncSummary::default();
        let mut walk = Walk {
            rules: &self.rules,
            summary: &mut summary,
        };
        walk.copy_tree(&source_dir, &destination_dir, source, destination)?;

        debug!(
            target: SYNC_TARGET,
            source = %source,
            destination = %destination,
            files = summary.files,
            excluded = summary.excluded,
            "synchronised plugin tree"
        );
        Ok(summary)
    }
}

/// State threaded through one recursive copy.
struct Walk<'a> {
    rules: &'a ExcludeRules,
    summary: &'a mut SyncSummary,
}

impl Walk<'_> {
    fn copy_tree(
        &mut self,
        from: &Dir,
        to: &Dir,
        from_path: &Utf8Path,
        to_path: &Utf8Path,
    ) -> Result<(), SyncError> {
        let read_error = |err: io::Error| SyncError::ReadSource {
            path: from_path.to_path_buf(),
            source: err,
        };

        for item in from.entries().map_err(read_error)? {
            let entry = item.map_err(read_error)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(
                    target: SYNC_TARGET,
                    directory = %from_path,
                    entry = ?file_name,
                    "skipping entry with a non-UTF-8 name"
                );
                self.summary.skipped += 1;
                continue;
            };

            let entry_path = from_path.join(name);
            if let Some(rule) = self.rules.matching_rule(name) {
                debug!(
                    target: SYNC_TARGET,
                    path = %entry_path,
                    rule = rule.pattern(),
                    "excluded"
                );
                self.summary.excluded += 1;
                continue;
            }

            let file_type = entry.file_type().map_err(read_error)?;
            if file_type.is_dir() {
                let target_path = to_path.join(name);
                let prepare_error = |err: io::Error| SyncError::PrepareDestination {
                    path: target_path.clone(),
                    source: err,
                };
                to.create_dir_all(name).map_err(prepare_error)?;
                let child_to = to.open_dir(name).map_err(prepare_error)?;
                let child_from = entry.open_dir().map_err(|err| SyncError::ReadSource {
                    path: entry_path.clone(),
                    source: err,
                })?;
                self.summary.directories += 1;
                self.copy_tree(&child_from, &child_to, &entry_path, &target_path)?;
            } else if file_type.is_file() {
                from.copy(name, to, name)
                    .map_err(|err| SyncError::CopyFile {
                        path: entry_path.clone(),
                        source: err,
                    })?;
                self.summary.files += 1;
            } else {
                warn!(
                    target: SYNC_TARGET,
                    path = %entry_path,
                    "skipping entry that is neither a file nor a directory"
                );
                self.summary.skipped += 1;
            }
        }
        Ok(())
    }
}
