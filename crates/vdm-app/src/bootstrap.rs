//! Production wiring from a settings source to a ready [`Provisioner`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use vdm_config::{ConfigGateway, SettingsSource, load_snapshot};
use vdm_fsops::{CommandRunner, DEFAULT_COMMAND_TIMEOUT, TokioCommandRunner, WarehousePermissions};

use crate::error::{AppError, AppResult};
use crate::orchestrator::{DefaultAdapters, Provisioner};

/// Process-level settings that do not come from the configuration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Wall-clock budget for each remote-share command.
    pub smb_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            smb_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Load configuration once and assemble production collaborators.
///
/// # Errors
///
/// Returns [`AppError::Config`] when the settings cannot be fetched or validated.
pub async fn bootstrap(
    source: &dyn SettingsSource,
    settings: RuntimeSettings,
) -> AppResult<Provisioner> {
    let snapshot = load_snapshot(source)
        .await
        .map_err(|err| AppError::config("bootstrap.load_snapshot", err))?;
    let warehouse = snapshot.warehouse_config();
    let permissions = Arc::new(WarehousePermissions::new(
        warehouse.dir_mode,
        warehouse.file_mode,
    ));
    info!(
        owner = %warehouse.username,
        smb_protocol = %warehouse.smb_protocol,
        smb_timeout_secs = settings.smb_timeout.as_secs(),
        "provisioner ready"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new(settings.smb_timeout));
    Ok(Provisioner::new(
        Arc::new(snapshot),
        Arc::new(DefaultAdapters::new(runner)),
        permissions,
    ))
}
