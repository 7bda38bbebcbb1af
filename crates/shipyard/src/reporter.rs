//! Structured reporting for pipeline lifecycle events.

use std::sync::Arc;

use crate::build::BuildReport;
use crate::error::PipelineError;
use crate::launch::ProcessHandle;
use crate::model::{BuildSpec, RuntimeConfig, StagedArtifact};
use crate::pipeline::PipelineState;

const PIPELINE_TARGET: &str = "shipyard::pipeline";

/// Observer trait used to surface pipeline events to telemetry sinks.
#[cfg_attr(test, mockall::automock)]
pub trait PipelineReporter: Send + Sync {
    /// Invoked once before the build starts.
    fn run_starting(&self, spec: &BuildSpec, runtime: &RuntimeConfig);

    /// Invoked after each state transition.
    fn state_changed(&self, from: PipelineState, to: PipelineState);

    /// Invoked after the build tool succeeds.
    fn build_succeeded(&self, report: &BuildReport);

    /// Invoked after the artifact is staged.
    fn artifact_staged(&self, staged: &StagedArtifact);

    /// Invoked once the service is running.
    fn service_running(&self, handle: &ProcessHandle);

    /// Invoked when a stage fails.
    fn stage_failed(&self, error: &PipelineError);
}

impl<T> PipelineReporter for Arc<T>
where
    T: PipelineReporter + ?Sized,
{
    fn run_starting(&self, spec: &BuildSpec, runtime: &RuntimeConfig) {
        (**self).run_starting(spec, runtime);
    }

    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        (**self).state_changed(from, to);
    }

    fn build_succeeded(&self, report: &BuildReport) {
        (**self).build_succeeded(report);
    }

    fn artifact_staged(&self, staged: &StagedArtifact) {
        (**self).artifact_staged(staged);
    }

    fn service_running(&self, handle: &ProcessHandle) {
        (**self).service_running(handle);
    }

    fn stage_failed(&self, error: &PipelineError) {
        (**self).stage_failed(error);
    }
}

/// Default reporter that records pipeline events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredPipelineReporter;

impl StructuredPipelineReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PipelineReporter for StructuredPipelineReporter {
    fn run_starting(&self, spec: &BuildSpec, runtime: &RuntimeConfig) {
        tracing::info!(
            target: PIPELINE_TARGET,
            event = "run_starting",
            source = %spec.source_path().display(),
            steps = spec.steps().len(),
            skip_tests = spec.skip_tests(),
            artifact = %spec.artifact_path().display(),
            runtime_root = %runtime.runtime_root().display(),
            port = runtime.port(),
            "starting pipeline run"
        );
    }

    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        tracing::debug!(
            target: PIPELINE_TARGET,
            event = "state_changed",
            %from,
            %to,
            "pipeline state changed"
        );
    }

    fn build_succeeded(&self, report: &BuildReport) {
        tracing::info!(
            target: PIPELINE_TARGET,
            event = "build_succeeded",
            steps = report.steps_run(),
            elapsed_ms = u64::try_from(report.elapsed().as_millis()).unwrap_or(u64::MAX),
            output_lines = report.log().total_lines(),
            "build completed"
        );
    }

    fn artifact_staged(&self, staged: &StagedArtifact) {
        tracing::info!(
            target: PIPELINE_TARGET,
            event = "artifact_staged",
            artifact = staged.artifact().name(),
            version = staged.artifact().version().unwrap_or("unversioned"),
            path = %staged.path().display(),
            size = staged.size(),
            "artifact staged"
        );
    }

    fn service_running(&self, handle: &ProcessHandle) {
        tracing::info!(
            target: PIPELINE_TARGET,
            event = "service_running",
            pid = handle.pid(),
            port = handle.port(),
            program = handle.program(),
            "service running"
        );
    }

    fn stage_failed(&self, error: &PipelineError) {
        tracing::error!(
            target: PIPELINE_TARGET,
            event = "stage_failed",
            stage = %error.stage(),
            exit_code = error.exit_code(),
            error = %error,
            "pipeline stage failed"
        );
    }
}
