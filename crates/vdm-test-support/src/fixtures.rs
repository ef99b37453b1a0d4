//! Test fixtures: on-disk template trees and configuration snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use vdm_config::{
    CollectionSystemTransfer, ConfigSnapshot, SambaCredentials, TransferScope, TransferType,
    WarehouseConfig,
};

/// Cruise identifier used by fixtures unless overridden.
pub const CRUISE_ID: &str = "RV1001";

/// A template root living in a temporary directory.
pub struct TemplateTree {
    temp: TempDir,
    root: PathBuf,
}

impl TemplateTree {
    /// Create an empty template root.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().join("templates");
        fs::create_dir_all(&root)?;
        Ok(Self { temp, root })
    }

    /// Create a directory (and its parents) relative to the template root.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn dir(self, relative: &str) -> Result<Self> {
        fs::create_dir_all(self.root.join(relative))?;
        Ok(self)
    }

    /// Create a file with `contents` relative to the template root.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn file(self, relative: &str, contents: &[u8]) -> Result<Self> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(self)
    }

    /// The template root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A scratch directory next to the template root, created on demand.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn scratch(&self, name: &str) -> Result<PathBuf> {
        let path = self.temp.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Warehouse settings with default modes owned by `username`.
#[must_use]
pub fn warehouse(username: &str) -> WarehouseConfig {
    WarehouseConfig {
        username: username.to_string(),
        dir_mode: vdm_config::DEFAULT_DIR_MODE,
        file_mode: vdm_config::DEFAULT_FILE_MODE,
        smb_protocol: vdm_config::DEFAULT_SMB_PROTOCOL.to_string(),
    }
}

/// An enabled cruise-scoped local-directory transfer.
#[must_use]
pub fn local_transfer(name: &str, source_dir: &str) -> CollectionSystemTransfer {
    transfer(name, TransferType::LocalDirectory, source_dir)
}

/// An enabled cruise-scoped anonymous Samba transfer.
#[must_use]
pub fn samba_transfer(name: &str, source_dir: &str) -> CollectionSystemTransfer {
    CollectionSystemTransfer {
        samba: Some(SambaCredentials {
            server: format!("//{}/data", name.to_lowercase()),
            domain: None,
            username: None,
            password: None,
        }),
        ..transfer(name, TransferType::SambaShare, source_dir)
    }
}

/// An enabled cruise-scoped transfer of any kind.
#[must_use]
pub fn transfer(
    name: &str,
    transfer_type: TransferType,
    source_dir: &str,
) -> CollectionSystemTransfer {
    CollectionSystemTransfer {
        id: name.to_lowercase(),
        name: name.to_string(),
        long_name: None,
        transfer_type,
        scope: TransferScope::Cruise,
        source_dir: source_dir.to_string(),
        enabled: true,
        samba: None,
    }
}

/// Builder for [`ConfigSnapshot`] values.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: ConfigSnapshot,
}

impl SnapshotBuilder {
    /// Snapshot for [`CRUISE_ID`] with no lowering and no transfers.
    #[must_use]
    pub fn new(username: &str) -> Self {
        Self {
            snapshot: ConfigSnapshot {
                warehouse: warehouse(username),
                cruise_id: Some(CRUISE_ID.to_string()),
                lowering_id: None,
                transfers: Vec::new(),
            },
        }
    }

    /// Override the cruise identifier (`None` clears it).
    #[must_use]
    pub fn cruise(mut self, cruise_id: Option<&str>) -> Self {
        self.snapshot.cruise_id = cruise_id.map(str::to_string);
        self
    }

    /// Set the lowering identifier.
    #[must_use]
    pub fn lowering(mut self, lowering_id: &str) -> Self {
        self.snapshot.lowering_id = Some(lowering_id.to_string());
        self
    }

    /// Append a transfer.
    #[must_use]
    pub fn with(mut self, transfer: CollectionSystemTransfer) -> Self {
        self.snapshot.transfers.push(transfer);
        self
    }

    /// Finish the snapshot.
    #[must_use]
    pub fn build(self) -> ConfigSnapshot {
        self.snapshot
    }
}
