//! # Design
//!
//! - Centralize run-level errors for bootstrap, eligibility and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Only configuration-level failures live here; per-transfer failures,
//!   including worker panics, are reported as outcomes, not errors.

use std::path::PathBuf;

use thiserror::Error;
use vdm_config::{ConfigError, TransferType};

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for transfer selection.
pub type EligibilityResult<T> = Result<T, EligibilityError>;

/// Reasons a requested working set cannot be built.
#[derive(Debug, Error)]
pub enum EligibilityError {
    /// No transfer carries the requested name.
    #[error("collection system transfer not found")]
    NotFound {
        /// Requested transfer name.
        name: String,
    },
    /// The explicitly requested transfer uses a transport that cannot be provisioned.
    #[error("unsupported transport for provisioning")]
    UnsupportedTransport {
        /// Transfer name.
        name: String,
        /// Transport kind of the transfer.
        transfer_type: TransferType,
    },
    /// Lowering-scoped work was requested while no lowering is defined.
    #[error("lowering identifier required")]
    MissingLowering {
        /// Transfer name when a single transfer was requested.
        name: Option<String>,
    },
    /// Configuration lookups failed.
    #[error("configuration lookup failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
}

impl EligibilityError {
    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// The template root directory does not exist.
    #[error("template root missing")]
    TemplateRootMissing {
        /// Configured template root.
        path: PathBuf,
    },
    /// The working set could not be built.
    #[error("transfer selection failed")]
    Eligibility {
        /// Source eligibility error.
        #[from]
        source: EligibilityError,
    },
    /// Loading configuration failed during bootstrap.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }
}
