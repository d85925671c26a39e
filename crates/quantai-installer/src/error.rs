//! Failure type shared by every pipeline step.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::character::CharacterError;
use crate::manifest::ManifestError;
use crate::process::CommandError;
use crate::sync::SyncError;

/// Why a pipeline step failed.
#[derive(Debug, Error)]
pub enum InstallError {
    /// An external command could not be run or exited unsuccessfully.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The checkout path is occupied by something other than a directory.
    #[error("checkout path '{path}' exists but is not a directory")]
    CheckoutNotDirectory {
        /// Checkout path.
        path: Utf8PathBuf,
    },
    /// The checkout path could not be inspected.
    #[error("failed to inspect checkout path '{path}': {source}")]
    InspectCheckout {
        /// Checkout path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The workspace directory could not be created.
    #[error("failed to create workspace directory '{path}': {source}")]
    CreateWorkspace {
        /// Workspace path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Copying the plugin sources failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Registering the plugin in the manifest failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// The entry point could not be replaced.
    #[error("failed to copy entry point '{from}' to '{to}': {source}")]
    EntryPoint {
        /// Backup copy shipped with the plugin.
        from: Utf8PathBuf,
        /// Entry point inside the checkout.
        to: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Building the character configuration failed.
    #[error(transparent)]
    Character(#[from] CharacterError),
}
