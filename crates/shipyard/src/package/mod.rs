//! Artifact validation and staging.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shipyard_config::StageMode;
use tracing::debug;

use crate::error::PipelineError;
use crate::model::{Artifact, StagedArtifact};

const PACKAGE_TARGET: &str = "shipyard::package";

/// Verifies build output and relocates it into the runtime root.
///
/// The file is copied or hard-linked byte for byte; its contents are never
/// transformed. Anything smaller than the configured minimum is rejected,
/// and a zero-byte file is always rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactPackager {
    min_bytes: u64,
    mode: StageMode,
}

impl Default for ArtifactPackager {
    fn default() -> Self {
        Self::new(shipyard_config::DEFAULT_MIN_ARTIFACT_BYTES, StageMode::Copy)
    }
}

impl ArtifactPackager {
    /// Creates a packager with a minimum size and staging mode.
    #[must_use]
    pub const fn new(min_bytes: u64, mode: StageMode) -> Self {
        Self { min_bytes, mode }
    }

    /// Minimum accepted artifact size in bytes.
    #[must_use]
    pub const fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    /// Validates `artifact` and stages it into `runtime_root`.
    ///
    /// The runtime root is created when absent and a staged file of the same
    /// name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArtifactMissing`] when the path is absent or
    /// not a regular file, [`PipelineError::ArtifactEmpty`] when it is below
    /// the minimum size, and [`PipelineError::Staging`] when relocation fails.
    pub fn stage(
        &self,
        artifact: &Artifact,
        runtime_root: &Path,
    ) -> Result<StagedArtifact, PipelineError> {
        let origin = artifact.path();
        let size = self.validate(origin)?;
        let file_name = artifact
            .file_name()
            .ok_or_else(|| PipelineError::ArtifactMissing {
                path: origin.to_path_buf(),
            })?;

        fs::create_dir_all(runtime_root).map_err(staging_error(runtime_root))?;
        let destination = std::path::absolute(runtime_root.join(file_name))
            .map_err(staging_error(runtime_root))?;

        if is_same_file(origin, &destination) {
            debug!(
                target: PACKAGE_TARGET,
                path = %destination.display(),
                "artifact already staged in place"
            );
        } else {
            replace_existing(&destination)?;
            self.relocate(origin, &destination)?;
        }

        debug!(
            target: PACKAGE_TARGET,
            origin = %origin.display(),
            staged = %destination.display(),
            size,
            mode = %self.mode,
            "artifact staged"
        );
        Ok(StagedArtifact::new(
            Artifact::at(destination),
            origin.to_path_buf(),
            size,
        ))
    }

    fn validate(&self, path: &Path) -> Result<u64, PipelineError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ArtifactMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(staging_error(path)(err)),
        };
        if !metadata.is_file() {
            return Err(PipelineError::ArtifactMissing {
                path: path.to_path_buf(),
            });
        }
        let size = metadata.len();
        if size == 0 || size < self.min_bytes {
            return Err(PipelineError::ArtifactEmpty {
                path: path.to_path_buf(),
                size,
                minimum: self.min_bytes,
            });
        }
        Ok(size)
    }

    fn relocate(&self, origin: &Path, destination: &Path) -> Result<(), PipelineError> {
        if self.mode == StageMode::Link {
            match fs::hard_link(origin, destination) {
                Ok(()) => return Ok(()),
                Err(err) => debug!(
                    target: PACKAGE_TARGET,
                    error = %err,
                    "hard link failed; copying artifact instead"
                ),
            }
        }
        fs::copy(origin, destination)
            .map(drop)
            .map_err(staging_error(destination))
    }
}

fn replace_existing(destination: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(destination) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(staging_error(destination)(err)),
        _ => Ok(()),
    }
}

fn is_same_file(origin: &Path, destination: &Path) -> bool {
    match (fs::canonicalize(origin), fs::canonicalize(destination)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn staging_error(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |err| PipelineError::Staging {
        path: PathBuf::from(path),
        source: Arc::new(err),
    }
}
