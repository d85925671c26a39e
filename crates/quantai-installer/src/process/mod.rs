//! Synchronous execution of shell commands.
//!
//! [`CommandRunner`] is the seam between the pipeline and the host shell.
//! [`ShellRunner`] hands the command string to `sh -c` (`cmd /C` on Windows)
//! with the installer's own stdio attached, so clone progress and build output
//! stream straight to the operator.

use std::io;
use std::process::{Command, ExitStatus, Stdio};

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, error};

/// Tracing target for command execution.
const PROCESS_TARGET: &str = "quantai_installer::process";

/// Errors raised while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The shell could not be started.
    #[error("failed to start '{command}': {source}")]
    Spawn {
        /// Command string handed to the shell.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The command ran and exited unsuccessfully.
    #[error("command '{command}' failed with {}", describe_status(*.status))]
    Failed {
        /// Command string handed to the shell.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        status: Option<i32>,
    },
}

fn describe_status(status: Option<i32>) -> String {
    status.map_or_else(
        || String::from("no exit code"),
        |code| format!("exit code {code}"),
    )
}

/// Runs a command string in a working directory and waits for it.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs `command` with `cwd` as its working directory.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] when the command cannot be started and
    /// [`CommandError::Failed`] when it exits with a non-zero status.
    fn run(&self, command: &str, cwd: &Utf8Path) -> Result<(), CommandError>;
}

/// [`CommandRunner`] backed by the host shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut shell = Command::new("cmd");
            shell.arg("/C").arg(command);
            shell
        } else {
            let mut shell = Command::new("sh");
            shell.arg("-c").arg(command);
            shell
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, cwd: &Utf8Path) -> Result<(), CommandError> {
        debug!(target: PROCESS_TARGET, command, cwd = %cwd, "running command");
        let status: ExitStatus = Self::shell(command)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| CommandError::Spawn {
                command: command.to_owned(),
                source,
            })?;

        if status.success() {
            return Ok(());
        }
        let code = status.code();
        error!(
            target: PROCESS_TARGET,
            command,
            cwd = %cwd,
            status = ?code,
            "command failed"
        );
        Err(CommandError::Failed {
            command: command.to_owned(),
            status: code,
        })
    }
}

/// Quotes `argument` for interpolation into a POSIX shell command line.
///
/// # Example
///
/// ```
/// use quantai_installer::process::shell_quote;
///
/// assert_eq!(shell_quote("eliza"), "'eliza'");
/// assert_eq!(shell_quote("it's"), r"'it'\''s'");
/// ```
#[must_use]
pub fn shell_quote(argument: &str) -> String {
    format!("'{}'", argument.replace('\'', r"'\''"))
}
