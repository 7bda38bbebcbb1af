use camino::{Utf8Path, Utf8PathBuf};

/// Default source directory: the current working directory.
pub const DEFAULT_SOURCE_PATH: &str = ".";

/// Runtime root used when none is configured, relative to the source path.
pub const DEFAULT_RUNTIME_SUBDIR: &str = ".shipyard/runtime";

/// Default host probed and advertised for the service port.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Artifacts smaller than this many bytes are rejected as empty.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 1024;

/// Default upper bound on the whole build, in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;

/// Default wait for the launched service to accept connections, in seconds.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Owned default source path.
#[must_use]
pub fn default_source_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SOURCE_PATH)
}

/// Owned default host.
#[must_use]
pub fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

/// Runtime root derived from the source path when none is configured.
#[must_use]
pub fn default_runtime_root(source_path: &Utf8Path) -> Utf8PathBuf {
    source_path.join(DEFAULT_RUNTIME_SUBDIR)
}
