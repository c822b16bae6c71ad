//! Error types for sandbox creation and staging.

use std::path::PathBuf;

use simbox_common::RequestError;

/// Errors that can occur while creating or populating a sandbox.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// A filesystem operation failed.
    #[error("sandbox I/O error at {}: {source}", path.display())]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Every generated identifier named an existing directory.
    #[error(
        "could not create a unique sandbox under {} after {attempts} attempts",
        root.display()
    )]
    Collision {
        /// The sandbox root directory.
        root: PathBuf,
        /// Number of identifiers tried.
        attempts: u32,
    },

    /// A file name would escape the sandbox.
    #[error(transparent)]
    InvalidName(#[from] RequestError),
}

impl SandboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
