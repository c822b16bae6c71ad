//! Errors that stop a simulation before it can produce a tagged result.

use std::path::PathBuf;
use std::time::Duration;

use simbox_common::RequestError;
use simbox_sandbox::SandboxError;

/// Failures outside the compile, build, and run stages.
///
/// Stage failures are not errors: they are reported in the
/// [`SimulationResult`](simbox_common::SimulationResult).
#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    /// The request was rejected before a sandbox was created.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The sandbox could not be created or populated.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Every pipeline slot stayed taken for the configured admission wait.
    #[error("no simulation slot became free within {}s", waited.as_secs())]
    Busy {
        /// How long the request waited.
        waited: Duration,
    },

    /// Reading or rewriting staged files failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

impl SimulateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller supplied an invalid request, as opposed to a service fault.
    pub fn is_request_error(&self) -> bool {
        matches!(self, SimulateError::Request(_))
    }
}
