//! Error types for the CLI runtime.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use shipyard::{ConfigError, PipelineError, TelemetryError};
use thiserror::Error;

/// Exit code for usage and configuration errors.
pub(crate) const EXIT_USAGE: u8 = 64;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("{} failed: {}", .0.stage(), .0)]
    Pipeline(PipelineError),
    #[error("failed to supervise service (pid {pid}): {source}")]
    Supervise { pid: u32, source: io::Error },
}

impl AppError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::LoadConfiguration(_)
            | Self::CliUsage(_)
            | Self::Configuration(_)
            | Self::Telemetry(_) => ExitCode::from(EXIT_USAGE),
            Self::Pipeline(error) => ExitCode::from(error.exit_code()),
            Self::Supervise { .. } => ExitCode::from(shipyard::Stage::Launch.exit_code()),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(error: PipelineError) -> Self {
        Self::Pipeline(error)
    }
}
