//! Structured logging for an installation run.
//!
//! [`Telemetry`] owns a `tracing` dispatcher built from the configured filter
//! and format. Nothing is installed globally: callers run their work inside
//! [`Telemetry::scope`] and every event emitted on that thread reaches the
//! handle's subscriber. Events are written to whichever stream the caller
//! hands over, shared through [`SharedStream`].

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use quantai_config::{InstallerConfig, LogFormat};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
}

/// Cloneable handle that serialises writes to one underlying stream.
///
/// The log subscriber and the entry point's error report both write through
/// clones of the same handle, so their lines never interleave mid-write.
#[derive(Debug)]
pub struct SharedStream<W>(Arc<Mutex<W>>);

impl<W> SharedStream<W> {
    /// Wraps `stream` for shared use.
    #[must_use]
    pub fn new(stream: W) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }
}

impl<W> Clone for SharedStream<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W: Write> Write for SharedStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

/// Explicit logging handle passed down from the entry point.
#[derive(Debug, Clone)]
pub struct Telemetry {
    dispatch: Dispatch,
}

impl Telemetry {
    /// Builds a handle writing uncoloured lines to `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Filter`] when the configured filter does not
    /// parse.
    pub fn new<W>(
        config: &InstallerConfig,
        stream: SharedStream<W>,
    ) -> Result<Self, TelemetryError>
    where
        W: Write + Send + 'static,
    {
        Self::with_writer(config, move || stream.clone(), false)
    }

    /// Builds a handle writing to `make_writer`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Filter`] when the configured filter does not
    /// parse.
    pub fn with_writer<W>(
        config: &InstallerConfig,
        make_writer: W,
        ansi: bool,
    ) -> Result<Self, TelemetryError>
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_new(config.log_filter())
            .map_err(|error| TelemetryError::Filter(error.to_string()))?;

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(make_writer)
            .with_ansi(ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339());

        let dispatch = match config.log_format() {
            LogFormat::Json => Dispatch::new(builder.json().flatten_event(true).finish()),
            LogFormat::Compact => Dispatch::new(builder.compact().finish()),
        };
        Ok(Self { dispatch })
    }

    /// Runs `work` with this handle as the current dispatcher.
    pub fn scope<T>(&self, work: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, work)
    }

    /// Underlying dispatcher.
    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}
