//! Error types for configuration operations.
//!
//! # Design
//! - Constant error messages; offending values travel in context fields.
//! - Every failure here is fatal for a provisioning run: nothing has been
//!   created yet when configuration is resolved.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration service has no current cruise identifier.
    #[error("cruise identifier is not set")]
    CruiseIdMissing,
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: String,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Two collection system transfers share the same name.
    #[error("duplicate collection system transfer name")]
    DuplicateTransfer {
        /// Name shared by more than one transfer.
        name: String,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Settings document could not be parsed.
    #[error("settings document parse failed")]
    Json {
        /// Operation identifier.
        operation: &'static str,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// HTTP request to the configuration service failed.
    #[error("configuration service request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// Configuration service returned a non-success status.
    #[error("configuration service returned an error status")]
    HttpStatus {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code returned by the service.
        status: u16,
    },
}

impl ConfigError {
    pub(crate) fn invalid_field(
        section: &str,
        field: &str,
        value: Option<&str>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section: section.to_string(),
            field: field.to_string(),
            value: value.map(str::to_string),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
