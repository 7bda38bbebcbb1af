//! Build toolchain presets.
//!
//! A preset captures the conventional build steps, artifact location, entry
//! point, and port for a toolchain so that a project following those
//! conventions needs no further configuration. Every value can be overridden
//! through [`Config`](crate::Config).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Build toolchains with a known preset.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Toolchain {
    /// Maven project producing a runnable jar.
    #[default]
    Maven,
    /// npm project producing a Node entry script.
    Npm,
    /// Fully operator-defined build and launch commands.
    Custom,
}

/// How the packager relocates an artifact into the runtime root.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StageMode {
    /// Copy the artifact bytes.
    #[default]
    Copy,
    /// Hard-link the artifact, copying when linking is not possible.
    Link,
}

/// Errors encountered while parsing a [`Toolchain`] or [`StageMode`].
pub type ToolchainParseError = strum::ParseError;

/// Conventional settings for a [`Toolchain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolchainPreset {
    steps: &'static [&'static [&'static str]],
    skip_tests_flag: Option<&'static str>,
    artifact: Option<&'static str>,
    entry: &'static [&'static str],
    port: u16,
}

const MAVEN: ToolchainPreset = ToolchainPreset {
    steps: &[&["mvn", "clean", "package"]],
    skip_tests_flag: Some("-DskipTests"),
    artifact: Some("target/app.jar"),
    entry: &["java", "-jar", "{artifact}"],
    port: 8080,
};

const NPM: ToolchainPreset = ToolchainPreset {
    steps: &[&["npm", "install"], &["npm", "run", "build"]],
    skip_tests_flag: None,
    artifact: Some("dist/index.js"),
    entry: &["node", "{artifact}"],
    port: 3000,
};

const CUSTOM: ToolchainPreset = ToolchainPreset {
    steps: &[],
    skip_tests_flag: None,
    artifact: None,
    entry: &[],
    port: 8080,
};

impl Toolchain {
    /// Returns the preset describing this toolchain's conventions.
    #[must_use]
    pub const fn preset(self) -> ToolchainPreset {
        match self {
            Self::Maven => MAVEN,
            Self::Npm => NPM,
            Self::Custom => CUSTOM,
        }
    }
}

impl ToolchainPreset {
    /// Build steps as owned argument vectors. The skip-tests flag, when the
    /// preset defines one, is appended to the final step.
    #[must_use]
    pub fn build_steps(&self, skip_tests: bool) -> Vec<Vec<String>> {
        let mut steps: Vec<Vec<String>> = self
            .steps
            .iter()
            .map(|step| step.iter().map(|arg| (*arg).to_owned()).collect())
            .collect();
        if skip_tests
            && let (Some(flag), Some(last)) = (self.skip_tests_flag, steps.last_mut())
        {
            last.push(flag.to_owned());
        }
        steps
    }

    /// Flag appended to the final build step when tests are skipped.
    #[must_use]
    pub const fn skip_tests_flag(&self) -> Option<&'static str> {
        self.skip_tests_flag
    }

    /// Conventional artifact location relative to the source directory.
    #[must_use]
    pub const fn artifact(&self) -> Option<&'static str> {
        self.artifact
    }

    /// Entry point template; `{artifact}` and `{port}` are substituted at launch.
    #[must_use]
    pub fn entry(&self) -> Vec<String> {
        self.entry.iter().map(|arg| (*arg).to_owned()).collect()
    }

    /// Conventional listening port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}
