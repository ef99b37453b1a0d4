//! Validation helpers that resolve raw settings into typed models.

use std::collections::HashSet;

use serde_json::Value;

use crate::defaults::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_SMB_PROTOCOL};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{RawTransfer, RawWarehouse, SettingsDocument};
use crate::model::{
    CollectionSystemTransfer, ConfigSnapshot, SambaCredentials, TransferScope, TransferType,
    WarehouseConfig,
};

const TRANSFERS_SECTION: &str = "collection_system_transfers";
const WAREHOUSE_SECTION: &str = "warehouse";

impl ConfigSnapshot {
    /// Resolve a raw settings document into a validated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unknown transfer types, scopes,
    /// flags or modes, and [`ConfigError::DuplicateTransfer`] when two transfers
    /// share a name.
    pub fn from_document(document: SettingsDocument) -> ConfigResult<Self> {
        let warehouse = parse_warehouse(&document.warehouse)?;
        let mut seen = HashSet::new();
        let mut transfers = Vec::with_capacity(document.transfers.len());
        for raw in &document.transfers {
            let transfer = parse_transfer(raw)?;
            if !seen.insert(transfer.name.clone()) {
                return Err(ConfigError::DuplicateTransfer {
                    name: transfer.name,
                });
            }
            transfers.push(transfer);
        }
        Ok(Self {
            warehouse,
            cruise_id: non_blank(document.cruise_id.as_deref()),
            lowering_id: non_blank(document.lowering_id.as_deref()),
            transfers,
        })
    }
}

pub(crate) fn parse_warehouse(raw: &RawWarehouse) -> ConfigResult<WarehouseConfig> {
    let username = raw.username.trim();
    if username.is_empty() {
        return Err(ConfigError::invalid_field(
            WAREHOUSE_SECTION,
            "shipboardDataWarehouseUsername",
            None,
            "empty",
        ));
    }
    Ok(WarehouseConfig {
        username: username.to_string(),
        dir_mode: parse_mode(&raw.dir_mode, "dirMode")?.unwrap_or(DEFAULT_DIR_MODE),
        file_mode: parse_mode(&raw.file_mode, "fileMode")?.unwrap_or(DEFAULT_FILE_MODE),
        smb_protocol: non_blank(raw.smb_protocol.as_deref())
            .unwrap_or_else(|| DEFAULT_SMB_PROTOCOL.to_string()),
    })
}

pub(crate) fn parse_transfer(raw: &RawTransfer) -> ConfigResult<CollectionSystemTransfer> {
    let name = raw.name.trim();
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(ConfigError::invalid_field(
            TRANSFERS_SECTION,
            "name",
            Some(&raw.name),
            "invalid_name",
        ));
    }
    let transfer_type: TransferType = scalar_text(&raw.transfer_type)
        .ok_or_else(|| {
            ConfigError::invalid_field(TRANSFERS_SECTION, "transferType", None, "missing")
        })?
        .parse()?;
    let scope = match scalar_text(&raw.cruise_or_lowering) {
        Some(text) => text.parse()?,
        None => TransferScope::Cruise,
    };
    let source_dir = raw.source_dir.trim();
    if source_dir.is_empty() {
        return Err(ConfigError::invalid_field(
            TRANSFERS_SECTION,
            "sourceDir",
            None,
            "empty",
        ));
    }
    let samba = if transfer_type == TransferType::SambaShare {
        let server = non_blank(raw.smb_server.as_deref()).ok_or_else(|| {
            ConfigError::invalid_field(TRANSFERS_SECTION, "smbServer", None, "missing")
        })?;
        Some(SambaCredentials {
            server,
            domain: non_blank(raw.smb_domain.as_deref()),
            username: non_blank(raw.smb_user.as_deref()),
            password: raw.smb_pass.clone().filter(|pass| !pass.is_empty()),
        })
    } else {
        None
    };

    Ok(CollectionSystemTransfer {
        id: scalar_text(&raw.id).unwrap_or_default(),
        name: name.to_string(),
        long_name: non_blank(raw.long_name.as_deref()),
        transfer_type,
        scope,
        source_dir: source_dir.to_string(),
        enabled: parse_flag(&raw.enable, TRANSFERS_SECTION, "enable")?,
        samba,
    })
}

/// Interpret a `0`/`1`/boolean flag. Missing flags are `false`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a recognised flag.
pub fn parse_flag(value: &Value, section: &str, field: &str) -> ConfigResult<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ConfigError::invalid_field(
                section,
                field,
                Some(&number.to_string()),
                "not_a_flag",
            )),
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "0" | "false" | "off" | "" => Ok(false),
            "1" | "true" | "on" => Ok(true),
            _ => Err(ConfigError::invalid_field(
                section,
                field,
                Some(text),
                "not_a_flag",
            )),
        },
        other => Err(ConfigError::invalid_field(
            section,
            field,
            Some(&other.to_string()),
            "not_a_flag",
        )),
    }
}

/// Interpret a permission mode given as an octal string (`"0o755"`, `"0755"`,
/// `"755"`) or an integer already in decimal form (`493`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-octal strings or modes above `0o7777`.
pub fn parse_mode(value: &Value, field: &str) -> ConfigResult<Option<u32>> {
    let mode = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number
            .as_u64()
            .and_then(|raw| u32::try_from(raw).ok())
            .ok_or_else(|| {
                ConfigError::invalid_field(
                    WAREHOUSE_SECTION,
                    field,
                    Some(&number.to_string()),
                    "not_a_mode",
                )
            })?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
            u32::from_str_radix(digits, 8).map_err(|_| {
                ConfigError::invalid_field(WAREHOUSE_SECTION, field, Some(text), "not_octal")
            })?
        }
        other => {
            return Err(ConfigError::invalid_field(
                WAREHOUSE_SECTION,
                field,
                Some(&other.to_string()),
                "not_a_mode",
            ));
        }
    };
    if mode > 0o7777 {
        return Err(ConfigError::invalid_field(
            WAREHOUSE_SECTION,
            field,
            Some(&format!("{mode:o}")),
            "out_of_range",
        ));
    }
    Ok(Some(mode))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_blank(Some(text)),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
