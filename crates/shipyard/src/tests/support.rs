//! Test harness utilities: fake build scripts, a fake service and a
//! recording reporter.
//!
//! The fake service re-executes the current test binary, selecting only the
//! ignored [`fake_service`] test. Extra free arguments act as libtest filters
//! that match nothing, so they double as markers the service can read back.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::build::BuildReport;
use crate::error::PipelineError;
use crate::launch::ProcessHandle;
use crate::model::{BuildSpec, BuildStep, RuntimeConfig, StagedArtifact};
use crate::pipeline::PipelineState;
use crate::reporter::PipelineReporter;

const FAKE_SERVICE_TEST: &str = "tests::support::fake_service";
const FAKE_SERVICE_MARKER: &str = "shipyard-fake-service";
const ARTIFACT_PREFIX: &str = "artifact=";
const EXIT_PREFIX: &str = "exit=";

/// Launch template that starts a loopback listener on `$PORT`.
///
/// The service refuses to start unless `{artifact}` resolves to a file.
pub(crate) fn fake_service_entry() -> Vec<String> {
    let mut entry = fake_service_base();
    entry.push(format!("{ARTIFACT_PREFIX}{{artifact}}"));
    entry
}

/// Launch template for a service that exits with `code` before binding.
pub(crate) fn exiting_service_entry(code: i32) -> Vec<String> {
    let mut entry = fake_service_base();
    entry.push(format!("{EXIT_PREFIX}{code}"));
    entry
}

fn fake_service_base() -> Vec<String> {
    let binary = std::env::current_exe().expect("locate test binary");
    vec![
        binary.to_string_lossy().into_owned(),
        String::from(FAKE_SERVICE_TEST),
        String::from("--exact"),
        String::from("--ignored"),
        String::from("--nocapture"),
        String::from(FAKE_SERVICE_MARKER),
    ]
}

#[test]
#[ignore = "started as a child process by launch tests"]
fn fake_service() {
    let args: Vec<String> = std::env::args().collect();
    if !args.iter().any(|arg| arg == FAKE_SERVICE_MARKER) {
        return;
    }
    if let Some(code) = args.iter().find_map(|arg| arg.strip_prefix(EXIT_PREFIX)) {
        std::process::exit(code.parse().expect("exit code"));
    }
    if let Some(artifact) = args.iter().find_map(|arg| arg.strip_prefix(ARTIFACT_PREFIX)) {
        assert!(Path::new(artifact).is_file(), "missing artifact {artifact}");
    }
    let port: u16 = std::env::var("PORT")
        .expect("PORT is set")
        .parse()
        .expect("PORT is a number");
    let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind fake service");
    for stream in listener.incoming() {
        drop(stream);
    }
}

/// Reserves a loopback port that is free at the time of the call.
pub(crate) fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .expect("reserve port")
        .port()
}

/// Build step running `script` through `sh -c`.
pub(crate) fn shell_step(script: &str) -> BuildStep {
    BuildStep::new("sh", vec![String::from("-c"), script.to_owned()])
}

/// Script writing `size` zero bytes to `path`.
pub(crate) fn write_artifact_script(path: &str, size: u64) -> String {
    let parent = Path::new(path)
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| String::from("."));
    format!("mkdir -p {parent} && head -c {size} /dev/zero > {path}")
}

/// Build spec over `source` running one shell step.
pub(crate) fn shell_spec(source: &Path, script: &str, artifact: &str) -> BuildSpec {
    BuildSpec::new(source, vec![shell_step(script)], artifact).expect("build spec")
}

/// Loopback runtime for `entry` with a short readiness timeout.
pub(crate) fn loopback_runtime(port: u16, entry: Vec<String>, root: PathBuf) -> RuntimeConfig {
    RuntimeConfig::new("127.0.0.1", port, entry, root)
        .expect("runtime config")
        .with_ready_timeout(Duration::from_secs(20))
}

/// Stops a launched service and reaps it.
pub(crate) fn stop(handle: &mut ProcessHandle) {
    handle.terminate().expect("terminate service");
    handle.wait().expect("reap service");
}

/// Pipeline events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PipelineEvent {
    RunStarting,
    StateChanged(PipelineState, PipelineState),
    BuildSucceeded,
    ArtifactStaged(u64),
    ServiceRunning(u16),
    StageFailed(String),
}

/// Records pipeline events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: PipelineEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl PipelineReporter for RecordingReporter {
    fn run_starting(&self, _spec: &BuildSpec, _runtime: &RuntimeConfig) {
        self.record(PipelineEvent::RunStarting);
    }

    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        self.record(PipelineEvent::StateChanged(from, to));
    }

    fn build_succeeded(&self, _report: &BuildReport) {
        self.record(PipelineEvent::BuildSucceeded);
    }

    fn artifact_staged(&self, staged: &StagedArtifact) {
        self.record(PipelineEvent::ArtifactStaged(staged.size()));
    }

    fn service_running(&self, handle: &ProcessHandle) {
        self.record(PipelineEvent::ServiceRunning(handle.port()));
    }

    fn stage_failed(&self, error: &PipelineError) {
        self.record(PipelineEvent::StageFailed(error.stage().to_string()));
    }
}
