//! One-shot pipeline runs: build, package, launch.
//!
//! [`Pipeline::run`] drives the three stages in order and halts at the first
//! failure. Each run records the states it passed through; the resulting
//! [`PipelineRun`] carries either the running service or the terminal error
//! together with its exit code.

mod state;

use tracing::{debug, error};

pub use self::state::{InvalidTransition, PipelineState};

use shipyard_config::Config;

use crate::build::{BuildReport, BuildStageRunner, BuildTool, CommandBuildTool};
use crate::error::{ConfigError, PipelineError};
use crate::launch::{ProcessHandle, ProcessLauncher};
use crate::model::{BuildSpec, RuntimeConfig, StagedArtifact};
use crate::package::ArtifactPackager;
use crate::reporter::{PipelineReporter, StructuredPipelineReporter};

/// Build, package and launch stages bound to one configuration.
#[derive(Debug)]
pub struct Pipeline<B, R = StructuredPipelineReporter> {
    spec: BuildSpec,
    runtime: RuntimeConfig,
    builder: BuildStageRunner<B>,
    packager: ArtifactPackager,
    launcher: ProcessLauncher,
    reporter: R,
}

impl Pipeline<CommandBuildTool> {
    /// Builds the production pipeline from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration does not describe a
    /// complete build and launch.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let spec = BuildSpec::from_config(config)?;
        let runtime = RuntimeConfig::from_config(config)?;
        Ok(Self::new(spec, runtime, CommandBuildTool::new())
            .with_packager(ArtifactPackager::new(
                config.min_artifact_bytes,
                config.stage_mode,
            )))
    }
}

impl<B: BuildTool> Pipeline<B> {
    /// Creates a pipeline with the default packager, launcher and reporter.
    #[must_use]
    pub fn new(spec: BuildSpec, runtime: RuntimeConfig, tool: B) -> Self {
        Self {
            spec,
            runtime,
            builder: BuildStageRunner::new(tool),
            packager: ArtifactPackager::default(),
            launcher: ProcessLauncher::new(),
            reporter: StructuredPipelineReporter::new(),
        }
    }
}

impl<B: BuildTool, R: PipelineReporter> Pipeline<B, R> {
    /// Replaces the packager.
    #[must_use]
    pub fn with_packager(mut self, packager: ArtifactPackager) -> Self {
        self.packager = packager;
        self
    }

    /// Replaces the reporter.
    #[must_use]
    pub fn with_reporter<R2: PipelineReporter>(self, reporter: R2) -> Pipeline<B, R2> {
        Pipeline {
            spec: self.spec,
            runtime: self.runtime,
            builder: self.builder,
            packager: self.packager,
            launcher: self.launcher,
            reporter,
        }
    }

    /// Build description used by every run.
    #[must_use]
    pub const fn spec(&self) -> &BuildSpec {
        &self.spec
    }

    /// Runtime description used by every run.
    #[must_use]
    pub const fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Executes one run.
    ///
    /// Runs are independent: calling this twice builds, stages and launches
    /// twice. A run that fails never starts a later stage, so a build
    /// failure leaves the runtime root untouched.
    #[must_use]
    pub fn run(&self) -> PipelineRun {
        self.reporter.run_starting(&self.spec, &self.runtime);
        let mut tracker = StateTracker::new(&self.reporter);
        tracker.enter(PipelineState::Building);
        let outcome = self.execute(&mut tracker);
        match &outcome {
            Ok(_) => tracker.enter(PipelineState::Running),
            Err(err) => {
                debug_assert_eq!(tracker.current().stage(), Some(err.stage()));
                self.reporter.stage_failed(err);
                tracker.enter(PipelineState::Failed);
            }
        }
        PipelineRun {
            history: tracker.history,
            outcome,
        }
    }

    fn execute(&self, tracker: &mut StateTracker<'_, R>) -> Result<RunningService, PipelineError> {
        let (artifact, build) = self.builder.run(&self.spec)?;
        self.reporter.build_succeeded(&build);

        tracker.enter(PipelineState::Packaging);
        let staged = self.packager.stage(&artifact, self.runtime.runtime_root())?;
        self.reporter.artifact_staged(&staged);

        tracker.enter(PipelineState::Launching);
        let handle = self.launcher.launch(&self.runtime, &staged)?;
        self.reporter.service_running(&handle);

        Ok(RunningService {
            handle,
            staged,
            build,
        })
    }
}

struct StateTracker<'a, R> {
    reporter: &'a R,
    history: Vec<PipelineState>,
}

impl<'a, R: PipelineReporter> StateTracker<'a, R> {
    fn new(reporter: &'a R) -> Self {
        Self {
            reporter,
            history: vec![PipelineState::Pending],
        }
    }

    fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Pending)
    }

    fn enter(&mut self, next: PipelineState) {
        let from = self.current();
        match from.advance(next) {
            Ok(to) => {
                self.history.push(to);
                self.reporter.state_changed(from, to);
                if to.is_terminal() {
                    debug!(
                        target: "shipyard::pipeline",
                        state = %to,
                        transitions = self.history.len().saturating_sub(1),
                        "pipeline run finished"
                    );
                }
            }
            Err(err) => error!(target: "shipyard::pipeline", error = %err, "transition rejected"),
        }
    }
}

/// A service started by a successful run.
#[derive(Debug)]
pub struct RunningService {
    handle: ProcessHandle,
    staged: StagedArtifact,
    build: BuildReport,
}

impl RunningService {
    /// Supervision handle for the process.
    #[must_use]
    pub const fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Mutable supervision handle, for waiting on or stopping the process.
    pub const fn handle_mut(&mut self) -> &mut ProcessHandle {
        &mut self.handle
    }

    /// The artifact the service runs from.
    #[must_use]
    pub const fn staged(&self) -> &StagedArtifact {
        &self.staged
    }

    /// Report from the build stage.
    #[must_use]
    pub const fn build_report(&self) -> &BuildReport {
        &self.build
    }

    /// Releases the process handle.
    #[must_use]
    pub fn into_handle(self) -> ProcessHandle {
        self.handle
    }
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    history: Vec<PipelineState>,
    outcome: Result<RunningService, PipelineError>,
}

impl PipelineRun {
    /// Terminal state of the run.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Pending)
    }

    /// States visited, starting with `Pending`.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// `0` for a running service, otherwise the failing stage's code.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.outcome.as_ref().map_or_else(PipelineError::exit_code, |_| 0)
    }

    /// Terminal error, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&PipelineError> {
        self.outcome.as_ref().err()
    }

    /// Running service, if the run succeeded.
    #[must_use]
    pub fn service(&self) -> Option<&RunningService> {
        self.outcome.as_ref().ok()
    }

    /// Mutable access to the running service, for supervision.
    pub fn service_mut(&mut self) -> Option<&mut RunningService> {
        self.outcome.as_mut().ok()
    }

    /// Converts the run into its outcome.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`PipelineError`] of a failed run.
    pub fn into_result(self) -> Result<RunningService, PipelineError> {
        self.outcome
    }
}
