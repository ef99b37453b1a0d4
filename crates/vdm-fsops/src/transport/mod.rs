//! Transport adapters that materialize instructions on a destination.
//!
//! # Design
//! - One adapter per transfer, chosen from its [`TransferType`].
//! - Adapters are idempotent: existing directories and files are reported as
//!   [`DirOutcome::AlreadyPresent`] / [`PutOutcome::AlreadyPresent`], never overwritten.
//! - Each adapter declares how its errors affect the rest of a transfer via [`FailureMode`].

mod local;
mod samba;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use vdm_config::{CollectionSystemTransfer, TransferType, WarehouseConfig};

use crate::command::CommandRunner;
use crate::error::{FsOpsError, FsOpsResult};

pub use local::LocalTransport;
pub use samba::{SMBCLIENT_PROGRAM, SambaTransport};

/// Result of an `ensure_directory` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    /// The directory was created by this call.
    Created,
    /// The directory already existed.
    AlreadyPresent,
}

/// Result of a `put_file` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The template file was copied to the destination.
    Copied,
    /// A file already existed at the destination and was left untouched.
    AlreadyPresent,
}

/// How an adapter error affects the remaining instructions of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop the transfer at the first failed instruction.
    Abort,
    /// Record the failure and continue with the next instruction.
    Isolate,
}

/// Creates directories and copies files on one transfer's destination.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Transport kind this adapter speaks.
    fn kind(&self) -> TransferType;

    /// How errors from this adapter propagate within a transfer.
    fn failure_mode(&self) -> FailureMode;

    /// Create `path` if absent. With `recursive`, missing ancestors are created too.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination refuses the operation.
    async fn ensure_directory(&self, path: &Path, recursive: bool) -> FsOpsResult<DirOutcome>;

    /// Copy `template` to `destination` unless a file already exists there.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination refuses the copy.
    async fn put_file(&self, template: &Path, destination: &Path) -> FsOpsResult<PutOutcome>;

    /// Whether `path` exists on the destination.
    ///
    /// # Errors
    ///
    /// Returns an error when existence cannot be determined.
    async fn exists(&self, path: &Path) -> FsOpsResult<bool>;
}

/// Build the adapter for a transfer.
///
/// # Errors
///
/// Returns [`FsOpsError::Unsupported`] for transport kinds that cannot be
/// provisioned and [`FsOpsError::InvalidInput`] when a Samba transfer carries
/// no credentials.
pub fn adapter_for(
    transfer: &CollectionSystemTransfer,
    warehouse: &WarehouseConfig,
    runner: Arc<dyn CommandRunner>,
) -> FsOpsResult<Arc<dyn TransportAdapter>> {
    match transfer.transfer_type {
        TransferType::LocalDirectory => Ok(Arc::new(LocalTransport::new(
            warehouse.dir_mode,
            warehouse.file_mode,
        ))),
        TransferType::SambaShare => {
            let credentials = transfer.samba.clone().ok_or_else(|| {
                FsOpsError::invalid_input("smb_server", "missing", transfer.name.clone())
            })?;
            Ok(Arc::new(SambaTransport::new(
                credentials,
                warehouse.smb_protocol.clone(),
                runner,
            )))
        }
        other @ (TransferType::RsyncServer | TransferType::SshServer) => {
            Err(FsOpsError::Unsupported {
                operation: "adapter_for",
                value: Some(other.as_str().to_string()),
            })
        }
    }
}
