//! CLI errors and the configuration source selected by global flags.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use url::Url;
use vdm_app::{AppError, Provisioner, RuntimeSettings, bootstrap};
use vdm_config::{FileSettingsSource, HttpSettingsSource, SettingsSource};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Wrap a run-level error with a human-readable headline.
pub(crate) fn app_failure(context: &'static str, error: AppError) -> CliError {
    CliError::failure(anyhow::Error::new(error).context(context))
}

/// Where configuration is read from, chosen by `--config` / `--api-url`.
pub(crate) struct CliContext {
    source: Box<dyn SettingsSource>,
}

impl CliContext {
    pub(crate) fn from_flags(config: Option<PathBuf>, api_url: Option<Url>) -> CliResult<Self> {
        let source: Box<dyn SettingsSource> = match (config, api_url) {
            (Some(_), Some(_)) => {
                return Err(CliError::validation(
                    "pass either --config or --api-url, not both",
                ));
            }
            (Some(path), None) => Box::new(FileSettingsSource::new(path)),
            (None, Some(url)) => Box::new(HttpSettingsSource::new(url).map_err(|err| {
                CliError::failure(
                    anyhow::Error::new(err).context("failed to build configuration client"),
                )
            })?),
            (None, None) => {
                return Err(CliError::validation(
                    "configuration source required (pass --config or --api-url, or set VDM_CONFIG / VDM_API_URL)",
                ));
            }
        };
        Ok(Self { source })
    }

    pub(crate) fn describe(&self) -> String {
        self.source.describe()
    }

    /// Load configuration and assemble a provisioner.
    pub(crate) async fn provisioner(&self, settings: RuntimeSettings) -> CliResult<Provisioner> {
        bootstrap(self.source.as_ref(), settings)
            .await
            .map_err(|err| app_failure("failed to load configuration", err))
    }
}
