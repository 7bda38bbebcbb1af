//! Build stage: turns a [`BuildSpec`] into an [`Artifact`].
//!
//! The stage delegates compilation to a [`BuildTool`]. The production tool,
//! [`CommandBuildTool`], runs each step as an OS process in the source
//! directory. Tests substitute their own implementation to exercise the
//! pipeline without spawning compilers.

mod command;
mod log;

use std::time::Duration;

use tracing::debug;

pub use self::command::CommandBuildTool;
pub use self::log::{DEFAULT_TAIL_LINES, LogTail};

use crate::error::PipelineError;
use crate::model::{Artifact, BuildSpec};

/// Tracing target for build stage events.
pub(crate) const BUILD_TARGET: &str = "shipyard::build";

/// Compiles a [`BuildSpec`].
///
/// Implementations run every build step in order and stop at the first
/// failure. Intermediate build files are left in place.
#[cfg_attr(test, mockall::automock)]
pub trait BuildTool {
    /// Runs the build described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BuildSpawn`], [`PipelineError::BuildFailure`],
    /// [`PipelineError::BuildTimeout`] or [`PipelineError::BuildMonitor`].
    fn build(&self, spec: &BuildSpec) -> Result<BuildReport, PipelineError>;
}

impl<T: BuildTool + ?Sized> BuildTool for &T {
    fn build(&self, spec: &BuildSpec) -> Result<BuildReport, PipelineError> {
        (**self).build(spec)
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildReport {
    steps_run: usize,
    elapsed: Duration,
    log: LogTail,
}

impl BuildReport {
    /// Creates a report.
    #[must_use]
    pub const fn new(steps_run: usize, elapsed: Duration, log: LogTail) -> Self {
        Self {
            steps_run,
            elapsed,
            log,
        }
    }

    /// Number of steps that ran to completion.
    #[must_use]
    pub const fn steps_run(&self) -> usize {
        self.steps_run
    }

    /// Wall-clock duration of the build.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Tail of the combined build output.
    #[must_use]
    pub const fn log(&self) -> &LogTail {
        &self.log
    }
}

/// Runs the build tool and resolves the artifact it is expected to produce.
#[derive(Debug, Clone, Default)]
pub struct BuildStageRunner<B> {
    tool: B,
}

impl<B: BuildTool> BuildStageRunner<B> {
    /// Wraps a build tool.
    #[must_use]
    pub const fn new(tool: B) -> Self {
        Self { tool }
    }

    /// Builds `spec` and returns the artifact location alongside the report.
    ///
    /// The artifact is not inspected here; existence and size checks belong
    /// to the packager.
    ///
    /// # Errors
    ///
    /// Propagates the build tool's [`PipelineError`].
    pub fn run(&self, spec: &BuildSpec) -> Result<(Artifact, BuildReport), PipelineError> {
        debug!(
            target: BUILD_TARGET,
            source = %spec.source_path().display(),
            steps = spec.steps().len(),
            skip_tests = spec.skip_tests(),
            "running build"
        );
        let report = self.tool.build(spec)?;
        let artifact = Artifact::at(spec.artifact_location());
        Ok((artifact, report))
    }
}
