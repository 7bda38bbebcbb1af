//! CLI argument definitions for the `shipyard` binary.

use clap::Parser;

/// Builds a project, stages its artifact and runs it as a service.
///
/// Configuration flags (`--config-path`, `--log-filter`, `--log-format`)
/// are handled by the configuration loader and never reach this parser.
#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(name = "shipyard", version)]
pub(crate) struct Cli {
    /// Skips test execution during the build.
    #[arg(long)]
    pub(crate) skip_tests: bool,
    /// Overrides the service port.
    #[arg(long, value_name = "PORT")]
    pub(crate) port: Option<u16>,
    /// Returns as soon as the service is running instead of waiting for it.
    #[arg(long)]
    pub(crate) detach: bool,
}

impl Cli {
    /// Applies flag overrides to loaded configuration.
    pub(crate) fn apply(&self, config: &mut shipyard_config::Config) {
        if self.skip_tests {
            config.skip_tests = true;
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
    }
}
