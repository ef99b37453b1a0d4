//! Read-only configuration gateway.
//!
//! # Design
//! - `ConfigGateway` is the only view of configuration the provisioning core sees.
//! - Queries never mutate state; the backing snapshot is loaded once per run.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    CollectionSystemTransfer, ConfigSnapshot, CruiseContext, TransferScope, WarehouseConfig,
};

/// Read-only queries against the configuration service.
pub trait ConfigGateway: Send + Sync {
    /// Warehouse-wide settings.
    fn warehouse_config(&self) -> &WarehouseConfig;
    /// Current cruise identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CruiseIdMissing`] when no cruise is set.
    fn cruise_id(&self) -> ConfigResult<&str>;
    /// Current lowering identifier, if a lowering has been defined.
    fn lowering_id(&self) -> Option<&str>;
    /// Look up a transfer by its unique name, active or not.
    fn transfer_by_name(&self, name: &str) -> Option<&CollectionSystemTransfer>;
    /// Enabled transfers whose scope matches `scope`.
    fn active_transfers(&self, scope: TransferScope) -> Vec<&CollectionSystemTransfer>;

    /// Build the immutable cruise context for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CruiseIdMissing`] when no cruise is set.
    fn cruise_context(&self) -> ConfigResult<CruiseContext> {
        CruiseContext::new(self.cruise_id()?, self.lowering_id())
    }
}

impl ConfigGateway for ConfigSnapshot {
    fn warehouse_config(&self) -> &WarehouseConfig {
        &self.warehouse
    }

    fn cruise_id(&self) -> ConfigResult<&str> {
        self.cruise_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::CruiseIdMissing)
    }

    fn lowering_id(&self) -> Option<&str> {
        self.lowering_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    fn transfer_by_name(&self, name: &str) -> Option<&CollectionSystemTransfer> {
        self.transfers.iter().find(|transfer| transfer.name == name)
    }

    fn active_transfers(&self, scope: TransferScope) -> Vec<&CollectionSystemTransfer> {
        self.transfers
            .iter()
            .filter(|transfer| transfer.enabled && transfer.scope == scope)
            .collect()
    }
}
