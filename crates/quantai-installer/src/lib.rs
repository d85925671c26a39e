//! Installer that prepares an agent framework checkout to host the QuantAI
//! trading assistant plugin.
//!
//! An installation is a fixed, fail-fast sequence of steps driven by
//! [`pipeline::Orchestrator`]: make sure the framework checkout exists, copy
//! the plugin sources into it, register the plugin in the agent manifest,
//! replace the agent entry point, write the character configuration with
//! credentials collected from the operator, and finally install and build the
//! checkout. Nothing is rolled back when a step fails.
//!
//! The binary entry point is [`run`], which takes its streams as parameters so
//! tests can drive it without a terminal.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use quantai_config::InstallerConfig;

mod app_error;
pub mod character;
pub mod error;
pub(crate) mod json;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod prompt;
pub mod secrets;
pub mod sync;
pub mod telemetry;

use app_error::AppError;
use layout::InstallLayout;
use pipeline::{Orchestrator, StartInstructions, StepSettings, SystemSteps};
use process::ShellRunner;
use prompt::TerminalPrompter;
use telemetry::{SharedStream, Telemetry};

/// Runs an installation with the given arguments and streams.
///
/// Prompts are written to `stdout` and answered from `stdin`; the start
/// instructions are printed to `stdout` on success. Structured logs and the
/// failure report share `stderr`, and a failure turns into
/// [`ExitCode::FAILURE`].
#[must_use]
pub fn run<I, T, R, W, E>(args: I, stdin: R, stdout: &mut W, stderr: E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    R: BufRead,
    W: Write,
    E: Write + Send + 'static,
{
    let diagnostics = SharedStream::new(stderr);
    match try_run(args, stdin, stdout, diagnostics.clone()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut report = diagnostics;
            writeln!(report, "{error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn try_run<I, T, R, W, E>(
    args: I,
    stdin: R,
    stdout: &mut W,
    diagnostics: SharedStream<E>,
) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    R: BufRead,
    W: Write,
    E: Write + Send + 'static,
{
    let config = InstallerConfig::load_from_args(args).map_err(AppError::LoadConfiguration)?;
    let telemetry = Telemetry::new(&config, diagnostics)?;
    let layout = InstallLayout::from_config(&config)?;
    let settings = StepSettings::from_config(&config);
    let orchestrator = Orchestrator::new(StartInstructions::for_mode(
        layout.checkout_name(),
        settings.character_mode,
    ));

    let instructions = telemetry.scope(|| {
        let prompter = TerminalPrompter::new(stdin, &mut *stdout);
        let mut steps = SystemSteps::new(layout, settings, ShellRunner, prompter);
        orchestrator.run(&mut steps)
    })?;

    writeln!(stdout, "{instructions}").map_err(AppError::WriteInstructions)?;
    Ok(())
}

#[cfg(test)]
mod tests;
