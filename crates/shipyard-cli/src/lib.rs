//! Command-line runtime for the Shipyard build-and-run controller.
//!
//! [`run`] parses arguments, loads layered configuration, initialises
//! telemetry and drives one pipeline run. The exit code is `0` when the
//! service is running (or ran and exited in the foreground), `1`, `2` or `3`
//! for build, packaging or launch failures, and `64` for usage and
//! configuration errors. Configuration loading and IO streams can be
//! substituted so the runtime is testable without touching the process
//! environment.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use shipyard::{Pipeline, RunningService, telemetry};
use tracing::info;

mod cli;
mod config;
mod errors;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.cli_arguments) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            drop(write!(stdout, "{error}"));
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    match execute(&cli, &split.config_arguments, loader, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn execute<L, W>(
    cli: &Cli,
    config_arguments: &[OsString],
    loader: &L,
    stdout: &mut W,
) -> Result<(), AppError>
where
    L: ConfigLoader,
    W: Write,
{
    let mut config = loader.load(config_arguments)?;
    cli.apply(&mut config);
    telemetry::initialise(&config)?;

    let pipeline = Pipeline::from_config(&config)?;
    let mut service = pipeline.run().into_result()?;
    let pid = service.handle().pid();
    drop(writeln!(
        stdout,
        "service running (pid {pid}) on port {}",
        service.handle().port()
    ));

    if cli.detach {
        return Ok(());
    }
    supervise(&mut service, stdout)
}

/// Stays attached to the service until it exits. The service's own exit
/// status is logged, not propagated.
fn supervise<W: Write>(service: &mut RunningService, stdout: &mut W) -> Result<(), AppError> {
    let pid = service.handle().pid();
    let status = service
        .handle_mut()
        .wait()
        .map_err(|source| AppError::Supervise { pid, source })?;
    info!(
        target: "shipyard::cli",
        pid,
        status = %status,
        "service exited"
    );
    drop(writeln!(stdout, "service exited ({status})"));
    Ok(())
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    drop(writeln!(stderr, "{error}"));
    error.exit_code()
}

#[cfg(test)]
mod tests;
