//! CLI entrypoint for the Shipyard build-and-run controller.
//!
//! The binary delegates to [`shipyard_cli::run`], which loads configuration,
//! runs the build, package and launch pipeline, and maps the outcome to an
//! exit code.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    shipyard_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
