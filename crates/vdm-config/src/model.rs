//! Typed configuration models consumed by the provisioning engine.
//!
//! # Design
//! - Pure data carriers; every loosely typed setting has already been resolved
//!   into a closed enum by `validate.rs` before a model value exists.
//! - Models are read-only to the provisioning core.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};

/// Placeholder replaced by the current cruise identifier.
pub const CRUISE_PLACEHOLDER: &str = "{cruiseID}";
/// Placeholder replaced by the current lowering identifier.
pub const LOWERING_PLACEHOLDER: &str = "{loweringID}";

/// Transport used to reach a collection system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    /// Directory on the warehouse's local filesystem (usually a mount).
    LocalDirectory,
    /// Rsync daemon.
    RsyncServer,
    /// SMB/CIFS share reached through `smbclient`.
    SambaShare,
    /// SSH server.
    SshServer,
}

impl TransferType {
    /// Render the transport as its canonical lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalDirectory => "local",
            Self::RsyncServer => "rsync",
            Self::SambaShare => "smb",
            Self::SshServer => "ssh",
        }
    }

    /// Whether the provisioning engine has an adapter for this transport.
    #[must_use]
    pub const fn is_provisionable(self) -> bool {
        matches!(self, Self::LocalDirectory | Self::SambaShare)
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferType {
    type Err = ConfigError;

    /// Accepts the numeric identifiers used by the configuration service
    /// (`1`..`4`) as well as the canonical labels.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "local" | "local_directory" => Ok(Self::LocalDirectory),
            "2" | "rsync" | "rsync_server" => Ok(Self::RsyncServer),
            "3" | "smb" | "samba" | "samba_share" => Ok(Self::SambaShare),
            "4" | "ssh" | "ssh_server" => Ok(Self::SshServer),
            _ => Err(ConfigError::invalid_field(
                "collection_system_transfers",
                "transferType",
                Some(value),
                "unknown_transfer_type",
            )),
        }
    }
}

/// Whether a transfer is provisioned once per cruise or once per lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferScope {
    /// Provisioned for the cruise as a whole.
    Cruise,
    /// Provisioned for each lowering within the cruise.
    Lowering,
}

impl TransferScope {
    /// Render the scope as its lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cruise => "cruise",
            Self::Lowering => "lowering",
        }
    }
}

impl fmt::Display for TransferScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferScope {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "cruise" => Ok(Self::Cruise),
            "1" | "lowering" => Ok(Self::Lowering),
            _ => Err(ConfigError::invalid_field(
                "collection_system_transfers",
                "cruiseOrLowering",
                Some(value),
                "unknown_scope",
            )),
        }
    }
}

/// Credentials used to reach a Samba share.
#[derive(Clone, PartialEq, Eq)]
pub struct SambaCredentials {
    /// Share address in `//host/share` form.
    pub server: String,
    /// Optional workgroup or domain.
    pub domain: Option<String>,
    /// Optional username; blank or `guest` means anonymous access.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
}

impl SambaCredentials {
    /// Whether the share should be accessed without credentials.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username
            .as_deref()
            .is_none_or(|user| user.is_empty() || user.eq_ignore_ascii_case("guest"))
    }
}

impl fmt::Debug for SambaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SambaCredentials")
            .field("server", &self.server)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A configured remote endpoint and the transport used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSystemTransfer {
    /// Identifier assigned by the configuration service.
    pub id: String,
    /// Unique name; also the template tree's top-level directory name.
    pub name: String,
    /// Optional human-readable label.
    pub long_name: Option<String>,
    /// Transport used to reach the endpoint.
    pub transfer_type: TransferType,
    /// Cruise-wide or lowering-scoped.
    pub scope: TransferScope,
    /// Source directory pattern (may contain placeholders).
    pub source_dir: String,
    /// Whether the transfer is active.
    pub enabled: bool,
    /// Samba credentials when `transfer_type` is [`TransferType::SambaShare`].
    pub samba: Option<SambaCredentials>,
}

/// Warehouse-wide settings relevant to provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Account that should own entries created on the warehouse.
    pub username: String,
    /// Mode applied to created directories.
    pub dir_mode: u32,
    /// Mode applied to copied files.
    pub file_mode: u32,
    /// Protocol level passed to `smbclient -m`.
    pub smb_protocol: String,
}

/// Identifiers for the cruise (and optional lowering) being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CruiseContext {
    cruise_id: String,
    lowering_id: Option<String>,
}

impl CruiseContext {
    /// Build a context, rejecting a blank cruise identifier.
    ///
    /// A blank lowering identifier is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CruiseIdMissing`] when `cruise_id` is blank.
    pub fn new(
        cruise_id: impl Into<String>,
        lowering_id: Option<impl Into<String>>,
    ) -> ConfigResult<Self> {
        let cruise_id = cruise_id.into().trim().to_string();
        if cruise_id.is_empty() {
            return Err(ConfigError::CruiseIdMissing);
        }
        let lowering_id = lowering_id
            .map(|value| value.into().trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(Self {
            cruise_id,
            lowering_id,
        })
    }

    /// Current cruise identifier.
    #[must_use]
    pub fn cruise_id(&self) -> &str {
        &self.cruise_id
    }

    /// Current lowering identifier, if a lowering has been defined.
    #[must_use]
    pub fn lowering_id(&self) -> Option<&str> {
        self.lowering_id.as_deref()
    }
}

/// Immutable view of the configuration service for the duration of a run.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Warehouse settings.
    pub warehouse: WarehouseConfig,
    /// Current cruise identifier, if set.
    pub cruise_id: Option<String>,
    /// Current lowering identifier, if set.
    pub lowering_id: Option<String>,
    /// All configured transfers, active or not.
    pub transfers: Vec<CollectionSystemTransfer>,
}
