//! Shared configuration for the Shipyard build-and-run controller.
//!
//! [`Config`] is loaded through `ortho_config`, which layers command-line
//! flags over `SHIPYARD_*` environment variables over a TOML configuration
//! file over the defaults in [`defaults`]. The struct is immutable once
//! loaded; the pipeline derives its build and runtime descriptions from it.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod toolchain;

pub use defaults::{
    DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MIN_ARTIFACT_BYTES,
    DEFAULT_READY_TIMEOUT_SECS, default_log_filter, default_log_format, default_runtime_root,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use toolchain::{StageMode, Toolchain, ToolchainParseError, ToolchainPreset};

/// Static configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SHIPYARD")]
pub struct Config {
    /// Toolchain whose preset supplies unset build and launch settings.
    #[ortho_config(default = Toolchain::Maven)]
    pub toolchain: Toolchain,
    /// Project directory the build runs in.
    #[ortho_config(default = defaults::default_source_path())]
    pub source_path: Utf8PathBuf,
    /// Explicit build command; replaces the preset steps with a single step.
    #[serde(default)]
    pub build_command: Vec<String>,
    /// Skips test execution during the build.
    #[ortho_config(default = false)]
    pub skip_tests: bool,
    /// Flag appended to a custom build command when tests are skipped.
    #[serde(default)]
    pub skip_tests_flag: Option<String>,
    /// Artifact location relative to `source_path`.
    #[serde(default)]
    pub artifact_path: Option<Utf8PathBuf>,
    /// Directory the artifact is staged into and the service runs from.
    #[serde(default)]
    pub runtime_root: Option<Utf8PathBuf>,
    /// How the artifact is relocated into the runtime root.
    #[ortho_config(default = StageMode::Copy)]
    pub stage_mode: StageMode,
    /// Artifacts smaller than this are rejected as empty.
    #[ortho_config(default = DEFAULT_MIN_ARTIFACT_BYTES)]
    pub min_artifact_bytes: u64,
    /// Host the service port is probed on.
    #[ortho_config(default = defaults::default_host())]
    pub host: String,
    /// Port the service listens on.
    #[serde(default)]
    pub port: Option<u16>,
    /// Explicit launch command; supports `{artifact}` and `{port}`.
    #[serde(default)]
    pub launch_command: Vec<String>,
    /// Upper bound on the whole build, in seconds; must be greater than `0`.
    #[ortho_config(default = DEFAULT_BUILD_TIMEOUT_SECS)]
    pub build_timeout_secs: u64,
    /// Wait for the service to accept connections; `0` disables the wait.
    #[ortho_config(default = DEFAULT_READY_TIMEOUT_SECS)]
    pub ready_timeout_secs: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            source_path: defaults::default_source_path(),
            build_command: Vec::new(),
            skip_tests: false,
            skip_tests_flag: None,
            artifact_path: None,
            runtime_root: None,
            stage_mode: StageMode::default(),
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            host: defaults::default_host(),
            port: None,
            launch_command: Vec::new(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Preset for the configured toolchain.
    #[must_use]
    pub const fn preset(&self) -> ToolchainPreset {
        self.toolchain.preset()
    }

    /// Project directory the build runs in.
    #[must_use]
    pub fn source_path(&self) -> &Utf8Path {
        self.source_path.as_path()
    }

    /// Build steps after applying the explicit command and skip-tests flag.
    #[must_use]
    pub fn build_steps(&self) -> Vec<Vec<String>> {
        if self.build_command.is_empty() {
            return self.preset().build_steps(self.skip_tests);
        }
        let mut step = self.build_command.clone();
        let flag = self
            .skip_tests_flag
            .clone()
            .or_else(|| self.preset().skip_tests_flag().map(str::to_owned));
        if self.skip_tests
            && let Some(flag) = flag
        {
            step.push(flag);
        }
        vec![step]
    }

    /// Artifact location relative to the source path, if known.
    #[must_use]
    pub fn artifact_path(&self) -> Option<Utf8PathBuf> {
        self.artifact_path
            .clone()
            .or_else(|| self.preset().artifact().map(Utf8PathBuf::from))
    }

    /// Staging directory, defaulting to a directory under the source path.
    #[must_use]
    pub fn runtime_root(&self) -> Utf8PathBuf {
        self.runtime_root
            .clone()
            .unwrap_or_else(|| default_runtime_root(self.source_path()))
    }

    /// Service port, falling back to the toolchain's conventional port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.preset().port())
    }

    /// Launch command template.
    #[must_use]
    pub fn launch_command(&self) -> Vec<String> {
        if self.launch_command.is_empty() {
            self.preset().entry()
        } else {
            self.launch_command.clone()
        }
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
