//! Production [`InstallSteps`] backed by the filesystem, the host shell and
//! the operator.

use std::fs;
use std::io;

use quantai_config::{CharacterMode, InstallerConfig};
use tracing::info;

use super::{InstallSteps, PIPELINE_TARGET};
use crate::character::CharacterConfigBuilder;
use crate::error::InstallError;
use crate::layout::InstallLayout;
use crate::manifest::ManifestPatcher;
use crate::process::{CommandRunner, shell_quote};
use crate::prompt::Prompter;
use crate::secrets::SecretCollector;
use crate::sync::{ExcludeRules, FileSynchronizer};

/// Non-path settings consumed by the steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSettings {
    /// Remote cloned when the checkout is absent.
    pub repository_url: String,
    /// Install-and-build command run in the checkout.
    pub build_command: String,
    /// How the character document is produced.
    pub character_mode: CharacterMode,
}

impl StepSettings {
    /// Extracts the settings from configuration, applying defaults.
    #[must_use]
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            repository_url: config.repository_url().to_owned(),
            build_command: config.build_command().to_owned(),
            character_mode: config.character_mode(),
        }
    }
}

/// Runs the installation against the real system.
#[derive(Debug)]
pub struct SystemSteps<R, P> {
    layout: InstallLayout,
    settings: StepSettings,
    runner: R,
    prompter: P,
    synchronizer: FileSynchronizer,
    patcher: ManifestPatcher,
}

impl<R, P> SystemSteps<R, P> {
    /// Creates steps over `layout`, running commands with `runner` and asking
    /// for credentials through `prompter`.
    #[must_use]
    pub fn new(layout: InstallLayout, settings: StepSettings, runner: R, prompter: P) -> Self {
        let synchronizer = FileSynchronizer::new(ExcludeRules::for_checkout(layout.checkout_name()));
        Self {
            layout,
            settings,
            runner,
            prompter,
            synchronizer,
            patcher: ManifestPatcher::default(),
        }
    }

    /// Resolved locations.
    #[must_use]
    pub const fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Command runner in use.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Prompter in use.
    #[must_use]
    pub const fn prompter(&self) -> &P {
        &self.prompter
    }

    fn character_builder(&self) -> CharacterConfigBuilder {
        let mode = self.settings.character_mode;
        let root = self.layout.character_root(mode);
        match mode {
            CharacterMode::Fresh => CharacterConfigBuilder::fresh(&root),
            CharacterMode::Template => {
                CharacterConfigBuilder::from_template(self.layout.character_template(), &root)
            }
        }
    }
}

impl<R: CommandRunner, P: Prompter> InstallSteps for SystemSteps<R, P> {
    fn ensure_repository(&mut self) -> Result<(), InstallError> {
        let checkout = self.layout.checkout_dir();
        match fs::metadata(&checkout) {
            Ok(metadata) if metadata.is_dir() => {
                info!(
                    target: PIPELINE_TARGET,
                    path = %checkout,
                    "checkout already present; skipping clone"
                );
                return Ok(());
            }
            Ok(_) => return Err(InstallError::CheckoutNotDirectory { path: checkout }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(InstallError::InspectCheckout {
                    path: checkout,
                    source,
                });
            }
        }

        let workspace = self.layout.workspace_dir();
        fs::create_dir_all(workspace).map_err(|source| InstallError::CreateWorkspace {
            path: workspace.to_path_buf(),
            source,
        })?;
        let command = format!(
            "git clone {} {}",
            shell_quote(&self.settings.repository_url),
            shell_quote(self.layout.checkout_name())
        );
        self.runner.run(&command, workspace)?;
        Ok(())
    }

    fn sync_plugin_sources(&mut self) -> Result<(), InstallError> {
        let destination = self.layout.plugin_destination();
        let summary = self
            .synchronizer
            .sync(self.layout.plugin_source(), &destination)?;
        info!(
            target: PIPELINE_TARGET,
            destination = %destination,
            files = summary.files,
            excluded = summary.excluded,
            skipped = summary.skipped,
            "plugin sources copied"
        );
        Ok(())
    }

    fn patch_manifest(&mut self) -> Result<(), InstallError> {
        self.patcher.patch_file(&self.layout.manifest_path())?;
        Ok(())
    }

    fn replace_entry_point(&mut self) -> Result<(), InstallError> {
        let from = self.layout.entry_point_backup();
        let to = self.layout.entry_point_target();
        fs::copy(&from, &to).map_err(|source| InstallError::EntryPoint {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        info!(target: PIPELINE_TARGET, path = %to, "entry point replaced");
        Ok(())
    }

    fn build_character(&mut self) -> Result<(), InstallError> {
        let builder = self.character_builder();
        let mut collector = SecretCollector::new(&mut self.prompter);
        builder.build(&mut collector)?;
        Ok(())
    }

    fn install_and_build(&mut self) -> Result<(), InstallError> {
        self.runner
            .run(&self.settings.build_command, &self.layout.checkout_dir())?;
        Ok(())
    }
}
