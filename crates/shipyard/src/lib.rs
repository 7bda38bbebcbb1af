//! Build-and-run lifecycle controller.
//!
//! Shipyard builds a project with an injected build tool, stages the
//! resulting artifact into a runtime root, and launches it as a process bound
//! to one TCP port. The three stages run strictly in sequence:
//!
//! 1. The [`BuildStageRunner`] invokes a [`BuildTool`] in the source
//!    directory and resolves the [`Artifact`] it produced.
//! 2. The [`ArtifactPackager`] checks the artifact exists and meets the
//!    minimum size, then copies or hard-links it into the runtime root.
//! 3. The [`ProcessLauncher`] verifies the port is free, starts the entry
//!    command, and optionally waits until the port accepts connections.
//!
//! A failure at any stage is terminal for the run and maps to a process exit
//! code through [`PipelineError::exit_code`]: `1` for build, `2` for
//! packaging and `3` for launch failures. [`Pipeline`] ties the stages
//! together, records the [`PipelineState`] history of each run, and reports
//! progress through a [`PipelineReporter`].

mod build;
mod error;
mod launch;
mod model;
mod package;
mod pipeline;
mod reporter;
pub mod telemetry;

pub use build::{
    BuildReport, BuildStageRunner, BuildTool, CommandBuildTool, DEFAULT_TAIL_LINES, LogTail,
};
pub use error::{ConfigError, PipelineError, Stage};
pub use launch::{ProcessHandle, ProcessLauncher, ensure_port_available};
pub use model::{Artifact, BuildSpec, BuildStep, RuntimeConfig, StagedArtifact};
pub use package::ArtifactPackager;
pub use pipeline::{InvalidTransition, Pipeline, PipelineRun, PipelineState, RunningService};
pub use reporter::{PipelineReporter, StructuredPipelineReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
