//! Error surface for pipeline runs.
//!
//! Every failure is terminal for the current run. Variants carry enough
//! context (log tail, path, exit code, port) to diagnose the failure without
//! rerunning. I/O errors are wrapped in `Arc` so the enum stays `Clone` and
//! satisfies the `result_large_err` Clippy lint.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shipyard_config::Toolchain;
use strum::Display;
use thiserror::Error;

use crate::build::LogTail;

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Dependency resolution and compilation.
    Build,
    /// Artifact validation and staging.
    Package,
    /// Port check and process start.
    Launch,
}

impl Stage {
    /// Process exit code reported when this stage fails.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Build => 1,
            Self::Package => 2,
            Self::Launch => 3,
        }
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A build step could not be started.
    #[error("failed to start build step `{step}`: {source}")]
    BuildSpawn {
        /// Command line of the step.
        step: String,
        /// Underlying spawn error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A build step returned a non-zero status.
    #[error("build step `{step}` {}{log}", describe_exit(.exit_code))]
    BuildFailure {
        /// Command line of the failing step.
        step: String,
        /// Exit code, absent when the step was killed by a signal.
        exit_code: Option<i32>,
        /// Tail of the combined build output.
        log: LogTail,
    },

    /// The build did not finish within the configured timeout.
    #[error("build step `{step}` timed out after {}s{log}", .timeout.as_secs())]
    BuildTimeout {
        /// Command line of the step that was killed.
        step: String,
        /// Configured build timeout.
        timeout: Duration,
        /// Tail of the combined build output.
        log: LogTail,
    },

    /// Waiting on a build step failed.
    #[error("failed to monitor build step `{step}`: {source}")]
    BuildMonitor {
        /// Command line of the step.
        step: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The artifact does not exist or is not a regular file.
    #[error("artifact not found at {}", .path.display())]
    ArtifactMissing {
        /// Expected artifact location.
        path: PathBuf,
    },

    /// The artifact is smaller than the configured minimum.
    #[error("artifact {} is {size} bytes; at least {minimum} bytes are required", .path.display())]
    ArtifactEmpty {
        /// Artifact location.
        path: PathBuf,
        /// Observed size in bytes.
        size: u64,
        /// Configured minimum size in bytes.
        minimum: u64,
    },

    /// Relocating the artifact into the runtime root failed.
    #[error("failed to stage artifact into {}: {source}", .path.display())]
    Staging {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Another process already holds the service port.
    #[error("port {port} on {host} is already in use")]
    PortUnavailable {
        /// Probed host.
        host: String,
        /// Probed port.
        port: u16,
    },

    /// The port check itself failed.
    #[error("failed to probe port {port} on {host}: {source}")]
    PortProbe {
        /// Probed host.
        host: String,
        /// Probed port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The service process could not be started.
    #[error("failed to start `{program}`: {source}")]
    ProcessStartFailure {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn or monitoring error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The service exited before it accepted connections.
    #[error("`{program}` {} before accepting connections", describe_exit(.exit_code))]
    ProcessExited {
        /// Program that exited.
        program: String,
        /// Exit code, absent when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// The service did not accept connections within the readiness timeout.
    #[error("service did not accept connections on port {port} within {}s", .timeout.as_secs())]
    StartupTimeout {
        /// Service port.
        port: u16,
        /// Configured readiness timeout.
        timeout: Duration,
    },
}

impl PipelineError {
    /// Stage the error belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::BuildSpawn { .. }
            | Self::BuildFailure { .. }
            | Self::BuildTimeout { .. }
            | Self::BuildMonitor { .. } => Stage::Build,
            Self::ArtifactMissing { .. } | Self::ArtifactEmpty { .. } | Self::Staging { .. } => {
                Stage::Package
            }
            Self::PortUnavailable { .. }
            | Self::PortProbe { .. }
            | Self::ProcessStartFailure { .. }
            | Self::ProcessExited { .. }
            | Self::StartupTimeout { .. } => Stage::Launch,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.stage().exit_code()
    }

    /// Captured build output, for build failures that have one.
    #[must_use]
    pub const fn log(&self) -> Option<&LogTail> {
        match self {
            Self::BuildFailure { log, .. } | Self::BuildTimeout { log, .. } => Some(log),
            _ => None,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with status {code}"),
        None => String::from("was terminated by a signal"),
    }
}

/// Errors raised while deriving build and runtime descriptions from
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No build steps were configured or provided by the toolchain preset.
    #[error("no build command configured for the {toolchain} toolchain; set build_command")]
    MissingBuildCommand {
        /// Selected toolchain.
        toolchain: Toolchain,
    },
    /// A build step has no program.
    #[error("build step {index} is empty")]
    EmptyBuildStep {
        /// Zero-based step index.
        index: usize,
    },
    /// No artifact path was configured or provided by the toolchain preset.
    #[error("no artifact path configured for the {toolchain} toolchain; set artifact_path")]
    MissingArtifactPath {
        /// Selected toolchain.
        toolchain: Toolchain,
    },
    /// No launch command was configured or provided by the toolchain preset.
    #[error("no launch command configured for the {toolchain} toolchain; set launch_command")]
    MissingLaunchCommand {
        /// Selected toolchain.
        toolchain: Toolchain,
    },
    /// Port zero cannot be declared as a service port.
    #[error("port 0 cannot be used as the service port")]
    ZeroPort,
    /// A build must have a deadline.
    #[error("build_timeout_secs must be greater than 0")]
    ZeroBuildTimeout,
}
