//! Crate-level test doubles and behavioural scenarios.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::process::{CommandError, CommandRunner};
use crate::prompt::Prompter;

mod behaviour;

/// Answers prompts from a fixed script and records every label it was shown.
///
/// Running out of answers reads as end of input, which is a blank answer.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompter {
    answers: VecDeque<String>,
    labels: Vec<String>,
}

impl ScriptedPrompter {
    pub(crate) fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            labels: Vec::new(),
        }
    }

    pub(crate) fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&mut self, label: &str) -> io::Result<String> {
        self.labels.push(label.to_owned());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    calls: RefCell<Vec<(String, Utf8PathBuf)>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    /// Fails any command containing `needle` with exit status 1.
    pub(crate) fn failing_on(needle: &str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: Some(needle.to_owned()),
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub(crate) fn calls(&self) -> Vec<(String, Utf8PathBuf)> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, cwd: &Utf8Path) -> Result<(), CommandError> {
        self.calls
            .borrow_mut()
            .push((command.to_owned(), cwd.to_path_buf()));
        match &self.fail_on {
            Some(needle) if command.contains(needle.as_str()) => Err(CommandError::Failed {
                command: command.to_owned(),
                status: Some(1),
            }),
            _ => Ok(()),
        }
    }
}

/// Cloneable in-memory sink for captured log output.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub(crate) fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
