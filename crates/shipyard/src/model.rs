//! Immutable descriptions of what to build, what was built, and how to run it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shipyard_config::{Config, Toolchain};

use crate::error::ConfigError;

/// One build tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    program: String,
    args: Vec<String>,
}

impl BuildStep {
    /// Creates a step running `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits an argument vector into program and arguments.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

/// How to compile a source tree into a single artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    source_path: PathBuf,
    steps: Vec<BuildStep>,
    skip_tests: bool,
    artifact_path: PathBuf,
    timeout: Duration,
}

impl BuildSpec {
    /// Creates a spec; `artifact_path` is resolved against `source_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBuildCommand`] when `steps` is empty.
    pub fn new(
        source_path: impl Into<PathBuf>,
        steps: Vec<BuildStep>,
        artifact_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::MissingBuildCommand {
                toolchain: Toolchain::Custom,
            });
        }
        Ok(Self {
            source_path: source_path.into(),
            steps,
            skip_tests: false,
            artifact_path: artifact_path.into(),
            timeout: Duration::from_secs(shipyard_config::DEFAULT_BUILD_TIMEOUT_SECS),
        })
    }

    /// Derives the build description from configuration and toolchain presets.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the toolchain preset and explicit
    /// settings leave the build command or artifact path undefined, or when
    /// the build timeout is zero.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.build_timeout_secs == 0 {
            return Err(ConfigError::ZeroBuildTimeout);
        }
        let toolchain = config.toolchain;
        let argv = config.build_steps();
        if argv.is_empty() {
            return Err(ConfigError::MissingBuildCommand { toolchain });
        }
        let steps = argv
            .iter()
            .enumerate()
            .map(|(index, step)| {
                BuildStep::from_argv(step).ok_or(ConfigError::EmptyBuildStep { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let artifact_path = config
            .artifact_path()
            .ok_or(ConfigError::MissingArtifactPath { toolchain })?;
        Ok(Self {
            source_path: config.source_path().as_std_path().to_path_buf(),
            steps,
            skip_tests: config.skip_tests,
            artifact_path: artifact_path.into_std_path_buf(),
            timeout: Duration::from_secs(config.build_timeout_secs),
        })
    }

    /// Records whether the steps were assembled with tests skipped.
    #[must_use]
    pub const fn with_skip_tests(mut self, skip_tests: bool) -> Self {
        self.skip_tests = skip_tests;
        self
    }

    /// Overrides the build timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory the build runs in.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Ordered build steps.
    #[must_use]
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Whether tests are skipped.
    #[must_use]
    pub const fn skip_tests(&self) -> bool {
        self.skip_tests
    }

    /// Artifact location as configured, relative to the source path.
    #[must_use]
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Artifact location resolved against the source path.
    #[must_use]
    pub fn artifact_location(&self) -> PathBuf {
        self.source_path.join(&self.artifact_path)
    }

    /// Upper bound on the whole build.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// A named, versioned build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    version: Option<String>,
    path: PathBuf,
}

impl Artifact {
    /// Describes the artifact at `path`, deriving its name and version from
    /// the file stem (`app-1.2.0.jar` is `app` at version `1.2.0`).
    #[must_use]
    pub fn at(location: impl Into<PathBuf>) -> Self {
        let path = location.into();
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, version) = split_version(&stem);
        Self {
            name,
            version,
            path,
        }
    }

    /// Artifact name without version.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version parsed from the file name, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name including extension.
    #[must_use]
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

fn split_version(stem: &str) -> (String, Option<String>) {
    let split = stem.match_indices('-').find_map(|(index, _)| {
        let (name, rest) = stem.split_at(index);
        let version = rest.strip_prefix('-')?;
        let starts_with_digit = version.chars().next().is_some_and(|c| c.is_ascii_digit());
        (starts_with_digit && !name.is_empty()).then(|| (name.to_owned(), version.to_owned()))
    });
    match split {
        Some((name, version)) => (name, Some(version)),
        None => (stem.to_owned(), None),
    }
}

/// An artifact that passed validation and now lives in the runtime root.
///
/// Only the packager constructs this type, so holding one proves the file
/// existed and met the minimum size when it was staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    artifact: Artifact,
    origin: PathBuf,
    size: u64,
}

impl StagedArtifact {
    pub(crate) const fn new(artifact: Artifact, origin: PathBuf, size: u64) -> Self {
        Self {
            artifact,
            origin,
            size,
        }
    }

    /// The staged artifact; its path points into the runtime root.
    #[must_use]
    pub const fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Staged location.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    /// Where the build produced the artifact.
    #[must_use]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// How to launch a staged artifact as a network service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    host: String,
    port: u16,
    entry: Vec<String>,
    runtime_root: PathBuf,
    ready_timeout: Duration,
}

impl RuntimeConfig {
    /// Creates a runtime description.
    ///
    /// `entry` is the launch argument vector; `{artifact}` and `{port}` are
    /// substituted when the process starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingLaunchCommand`] for an empty entry and
    /// [`ConfigError::ZeroPort`] for port `0`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        entry: Vec<String>,
        runtime_root: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::validate(Toolchain::Custom, port, &entry)?;
        Ok(Self {
            host: host.into(),
            port,
            entry,
            runtime_root: runtime_root.into(),
            ready_timeout: Duration::from_secs(shipyard_config::DEFAULT_READY_TIMEOUT_SECS),
        })
    }

    /// Derives the runtime description from configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no launch command is available or the
    /// port is `0`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let entry = config.launch_command();
        let port = config.port();
        Self::validate(config.toolchain, port, &entry)?;
        Ok(Self {
            host: config.host.clone(),
            port,
            entry,
            runtime_root: config.runtime_root().into_std_path_buf(),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
        })
    }

    fn validate(toolchain: Toolchain, port: u16, entry: &[String]) -> Result<(), ConfigError> {
        if entry.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(ConfigError::MissingLaunchCommand { toolchain });
        }
        if port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        Ok(())
    }

    /// Overrides the readiness timeout; zero disables the wait.
    #[must_use]
    pub const fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Host the port is probed on.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Service port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Launch template.
    #[must_use]
    pub fn entry(&self) -> &[String] {
        &self.entry
    }

    /// Directory the artifact is staged into and the service runs from.
    #[must_use]
    pub fn runtime_root(&self) -> &Path {
        &self.runtime_root
    }

    /// How long to wait for the service to accept connections.
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    /// Resolves the launch template against a staged artifact.
    #[must_use]
    pub fn command_line(&self, staged: &StagedArtifact) -> Vec<String> {
        let artifact = staged.path().to_string_lossy();
        let port = self.port.to_string();
        self.entry
            .iter()
            .map(|arg| {
                arg.replace("{artifact}", artifact.as_ref())
                    .replace("{port}", &port)
            })
            .collect()
    }
}
