//! Error type for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::layout::LayoutError;
use crate::pipeline::PipelineError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("invalid installation layout: {0}")]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to print start instructions: {0}")]
    WriteInstructions(io::Error),
}
