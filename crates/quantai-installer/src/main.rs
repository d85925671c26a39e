//! Binary entry point for the QuantAI installer.
//!
//! Delegates to [`quantai_installer::run`] with the process's own streams.

use std::io::{self, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    quantai_installer::run(std::env::args_os(), stdin, &mut stdout, io::stderr())
}
