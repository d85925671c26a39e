//! Line-oriented operator prompts.
//!
//! Secret collection only talks to the operator through [`Prompter`], so tests
//! can script answers while the binary reads from the terminal.

use std::io::{self, BufRead, Write};

/// Capability for asking the operator a single question.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Shows `label` and returns the answer without its line terminator.
    ///
    /// End of input is reported as an empty answer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the label cannot be written or
    /// the answer cannot be read.
    fn prompt(&mut self, label: &str) -> io::Result<String>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn prompt(&mut self, label: &str) -> io::Result<String> {
        (**self).prompt(label)
    }
}

/// Prompts on an output stream and reads answers line by line.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use quantai_installer::prompt::{Prompter, TerminalPrompter};
///
/// let mut output = Vec::new();
/// let mut prompter = TerminalPrompter::new(Cursor::new("sk-test\n"), &mut output);
/// assert_eq!(prompter.prompt("OpenAI API Key").unwrap(), "sk-test");
/// drop(prompter);
/// assert_eq!(output, b"OpenAI API Key: ");
/// ```
#[derive(Debug)]
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl<R, W> TerminalPrompter<R, W> {
    /// Creates a prompter over the given streams.
    #[must_use]
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn prompt(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }
}
