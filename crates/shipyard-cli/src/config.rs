//! Configuration loading helpers for the CLI.
//!
//! Arguments destined for `ortho_config` are split from the flags parsed by
//! [`Cli`](crate::cli::Cli) so each parser only sees what it understands.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use shipyard_config::Config;

use crate::errors::AppError;

/// Flags recognised by the configuration loader.
///
/// Keep in sync with the configuration fields exposed on the command line.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &["--config-path", "--log-filter", "--log-format"];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the given configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn process_config_flag(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, has_inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

/// Arguments partitioned between the configuration loader and the CLI
/// parser. Both keep the program name as their first element.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) cli_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ArgumentSplit {
    let mut split = ArgumentSplit::default();
    let mut iter = args.iter();
    if let Some(program) = iter.next() {
        split.config_arguments.push(program.clone());
        split.cli_arguments.push(program.clone());
    }

    while let Some(argument) = iter.next() {
        if argument == "--" {
            split.cli_arguments.push(argument.clone());
            split.cli_arguments.extend(iter.cloned());
            break;
        }
        match process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                split.config_arguments.push(argument.clone());
                if needs_value && let Some(value) = iter.next() {
                    split.config_arguments.push(value.clone());
                }
            }
            FlagAction::Skip => split.cli_arguments.push(argument.clone()),
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case::inline("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case::separate("--log-filter", FlagAction::Include { needs_value: true })]
    #[case::cli_flag("--port", FlagAction::Skip)]
    #[case::positional("extra", FlagAction::Skip)]
    fn classifies_flags(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(process_config_flag(OsStr::new(argument)), expected);
    }

    #[test]
    fn partitions_interleaved_arguments() {
        let split = split_config_arguments(&os_args(&[
            "shipyard",
            "--skip-tests",
            "--config-path",
            "shipyard.toml",
            "--port",
            "9000",
            "--log-format=json",
            "--detach",
        ]));

        assert_eq!(
            split.config_arguments,
            os_args(&["shipyard", "--config-path", "shipyard.toml", "--log-format=json"])
        );
        assert_eq!(
            split.cli_arguments,
            os_args(&["shipyard", "--skip-tests", "--port", "9000", "--detach"])
        );
    }

    #[test]
    fn empty_arguments_split_to_nothing() {
        assert_eq!(split_config_arguments(&[]), ArgumentSplit::default());
    }
}
