//! Fail-fast sequencing of the installation steps.
//!
//! [`Orchestrator::run`] walks [`PipelineStep::ORDER`] and stops at the first
//! failing step. Nothing already applied is undone; the error names the step
//! that failed.

use std::fmt;

use quantai_config::CharacterMode;
use thiserror::Error;
use tracing::{error, info};

use crate::character::{CHARACTER_DIR, CHARACTER_FILE};
use crate::error::InstallError;
use crate::layout::PLUGIN_PACKAGE_DIR;

mod system;

pub use system::{StepSettings, SystemSteps};

/// Tracing target for pipeline progress.
const PIPELINE_TARGET: &str = "quantai_installer::pipeline";

/// One unit of the installation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    /// Clone the framework unless a checkout is already present.
    EnsureRepository,
    /// Copy the plugin sources into the checkout.
    SyncPluginSources,
    /// Register the plugin in the agent manifest.
    PatchManifest,
    /// Replace the agent entry point with the plugin's copy.
    ReplaceEntryPoint,
    /// Collect credentials and write the character configuration.
    BuildCharacter,
    /// Install dependencies and build the checkout.
    InstallAndBuild,
}

impl PipelineStep {
    /// Every step in execution order.
    pub const ORDER: [Self; 6] = [
        Self::EnsureRepository,
        Self::SyncPluginSources,
        Self::PatchManifest,
        Self::ReplaceEntryPoint,
        Self::BuildCharacter,
        Self::InstallAndBuild,
    ];

    /// Stable identifier used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EnsureRepository => "ensure-repository",
            Self::SyncPluginSources => "sync-plugin-sources",
            Self::PatchManifest => "patch-manifest",
            Self::ReplaceEntryPoint => "replace-entry-point",
            Self::BuildCharacter => "build-character",
            Self::InstallAndBuild => "install-and-build",
        }
    }

    /// Progress message logged when the step starts.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::EnsureRepository => "Preparing framework checkout...",
            Self::SyncPluginSources => "Setting up trading assistant plugin...",
            Self::PatchManifest => "Modifying package.json...",
            Self::ReplaceEntryPoint => "Updating index.ts...",
            Self::BuildCharacter => "Creating character file...",
            Self::InstallAndBuild => "Installing dependencies and building project...",
        }
    }

    /// Runs this step against `steps`.
    ///
    /// # Errors
    ///
    /// Propagates the step's [`InstallError`].
    pub fn execute<S: InstallSteps + ?Sized>(self, steps: &mut S) -> Result<(), InstallError> {
        match self {
            Self::EnsureRepository => steps.ensure_repository(),
            Self::SyncPluginSources => steps.sync_plugin_sources(),
            Self::PatchManifest => steps.patch_manifest(),
            Self::ReplaceEntryPoint => steps.replace_entry_point(),
            Self::BuildCharacter => steps.build_character(),
            Self::InstallAndBuild => steps.install_and_build(),
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The side effects behind each [`PipelineStep`].
#[cfg_attr(test, mockall::automock)]
pub trait InstallSteps {
    /// Makes sure the framework checkout exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] when the checkout cannot be inspected or
    /// cloned.
    fn ensure_repository(&mut self) -> Result<(), InstallError>;

    /// Copies the plugin sources into the checkout.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Sync`] on filesystem failure.
    fn sync_plugin_sources(&mut self) -> Result<(), InstallError>;

    /// Registers the plugin in the agent manifest.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Manifest`] when the manifest cannot be patched.
    fn patch_manifest(&mut self) -> Result<(), InstallError>;

    /// Overwrites the agent entry point with the plugin's copy.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::EntryPoint`] when the copy fails.
    fn replace_entry_point(&mut self) -> Result<(), InstallError>;

    /// Collects credentials and writes the character configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Character`] on any read, prompt, or write
    /// failure.
    fn build_character(&mut self) -> Result<(), InstallError>;

    /// Installs dependencies and builds the checkout.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Command`] when the build command fails.
    fn install_and_build(&mut self) -> Result<(), InstallError>;
}

/// The first failing step and its cause.
#[derive(Debug, Error)]
#[error("installation step '{step}' failed: {source}")]
pub struct PipelineError {
    /// Step that failed.
    pub step: PipelineStep,
    /// Underlying failure.
    #[source]
    pub source: InstallError,
}

/// How to start the agent once installation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartInstructions {
    checkout_name: String,
    character_path: String,
}

impl StartInstructions {
    /// Instructions for a checkout and a character path relative to it.
    #[must_use]
    pub fn new(checkout_name: impl Into<String>, character_path: impl Into<String>) -> Self {
        Self {
            checkout_name: checkout_name.into(),
            character_path: character_path.into(),
        }
    }

    /// Instructions pointing at the document written in `mode`.
    #[must_use]
    pub fn for_mode(checkout_name: impl Into<String>, mode: CharacterMode) -> Self {
        let character_path = match mode {
            CharacterMode::Template => format!("{CHARACTER_DIR}/{CHARACTER_FILE}"),
            CharacterMode::Fresh => {
                format!("{PLUGIN_PACKAGE_DIR}/{CHARACTER_DIR}/{CHARACTER_FILE}")
            }
        };
        Self::new(checkout_name, character_path)
    }

    /// Character path relative to the checkout.
    #[must_use]
    pub fn character_path(&self) -> &str {
        &self.character_path
    }
}

impl fmt::Display for StartInstructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Installation completed successfully!")?;
        writeln!(f, "To start the agent, run:")?;
        writeln!(f, "cd {}", self.checkout_name)?;
        write!(f, "pnpm run start --character='{}'", self.character_path)
    }
}

/// Runs every [`PipelineStep`] in order, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    instructions: StartInstructions,
}

impl Orchestrator {
    /// Creates an orchestrator reporting `instructions` on success.
    #[must_use]
    pub const fn new(instructions: StartInstructions) -> Self {
        Self { instructions }
    }

    /// Executes the pipeline against `steps`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the first step that failed. Later
    /// steps are not invoked.
    pub fn run<S: InstallSteps + ?Sized>(
        self,
        steps: &mut S,
    ) -> Result<StartInstructions, PipelineError> {
        for step in PipelineStep::ORDER {
            info!(target: PIPELINE_TARGET, step = step.name(), "{}", step.description());
            if let Err(source) = step.execute(steps) {
                error!(
                    target: PIPELINE_TARGET,
                    step = step.name(),
                    error = %source,
                    "installation failed"
                );
                return Err(PipelineError { step, source });
            }
        }
        info!(target: PIPELINE_TARGET, "{}", self.instructions);
        Ok(self.instructions)
    }
}

#[cfg(test)]
mod tests;
