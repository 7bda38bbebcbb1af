//! Pipeline run states and their legal transitions.

use strum::Display;
use thiserror::Error;

use crate::error::Stage;

/// Position of a run in the build, package, launch sequence.
///
/// `Running` and `Failed` are terminal; no state is entered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has run yet.
    Pending,
    /// The build tool is running.
    Building,
    /// The artifact is being validated and staged.
    Packaging,
    /// The service process is being started.
    Launching,
    /// The service is running.
    Running,
    /// A stage failed.
    Failed,
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal pipeline transition from {from} to {to}")]
pub struct InvalidTransition {
    /// State the run was in.
    pub from: PipelineState,
    /// State that was requested.
    pub to: PipelineState,
}

impl PipelineState {
    /// Returns `next` when the transition is legal.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any move outside
    /// `Pending → Building → Packaging → Launching → Running` or into
    /// `Failed` from an active stage.
    pub const fn advance(self, next: Self) -> Result<Self, InvalidTransition> {
        let legal = matches!(
            (self, next),
            (Self::Pending, Self::Building)
                | (Self::Building, Self::Packaging)
                | (Self::Packaging, Self::Launching)
                | (Self::Launching, Self::Running)
                | (Self::Building | Self::Packaging | Self::Launching, Self::Failed)
        );
        if legal {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns `true` for `Running` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }

    /// Stage active in this state, if any.
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Building => Some(Stage::Build),
            Self::Packaging => Some(Stage::Package),
            Self::Launching => Some(Stage::Launch),
            Self::Pending | Self::Running | Self::Failed => None,
        }
    }
}
