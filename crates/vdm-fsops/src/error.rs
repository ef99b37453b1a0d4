//! # Design
//!
//! - Provide structured, constant-message errors for template walking and transports.
//! - Capture operation context (paths, fields, programs) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for provisioning filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while walking templates or driving transports.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the local filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A placeholder could not be substituted because its identifier is absent.
    #[error("fsops unresolved placeholder")]
    UnresolvedPlaceholder {
        /// Placeholder left in the pattern.
        placeholder: &'static str,
        /// Pattern that required substitution.
        pattern: String,
    },
    /// A remote-share command reported a failure.
    #[error("fsops remote transport failure")]
    RemoteTransport {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Remote path involved in the failure.
        path: PathBuf,
        /// Exit status of the remote-share command, when it exited normally.
        status: Option<i32>,
        /// Error output reported by the command.
        detail: String,
    },
    /// An external command could not be started.
    #[error("fsops command spawn failure")]
    CommandSpawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// An external command exceeded its wall-clock budget and was killed.
    #[error("fsops command timed out")]
    CommandTimeout {
        /// Program that timed out.
        program: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },
    /// User lookup failed when applying ownership changes.
    #[error("fsops user lookup failed")]
    UserLookup {
        /// Username that failed lookup.
        user: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Nix syscall failures.
    #[error("fsops nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Unsupported operation on this platform.
    #[error("fsops unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(
        field: &'static str,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: Some(value.into()),
        }
    }
}
