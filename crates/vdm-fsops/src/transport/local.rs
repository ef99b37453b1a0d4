//! Local-directory transport backed by `tokio::fs`.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use vdm_config::TransferType;

use super::{DirOutcome, FailureMode, PutOutcome, TransportAdapter};
use crate::error::{FsOpsError, FsOpsResult};

/// Writes directly to a path on the warehouse host.
#[derive(Debug, Clone, Copy)]
pub struct LocalTransport {
    dir_mode: u32,
    file_mode: u32,
}

impl LocalTransport {
    /// Build a transport that creates entries with the given modes.
    #[must_use]
    pub const fn new(dir_mode: u32, file_mode: u32) -> Self {
        Self {
            dir_mode,
            file_mode,
        }
    }

    async fn existing_directory(path: &Path) -> FsOpsResult<bool> {
        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(true),
            Ok(_) => Err(FsOpsError::invalid_input(
                "path",
                "not_a_directory",
                path.display().to_string(),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(FsOpsError::io("local.stat", path, err)),
        }
    }
}

#[async_trait]
impl TransportAdapter for LocalTransport {
    fn kind(&self) -> TransferType {
        TransferType::LocalDirectory
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Abort
    }

    async fn ensure_directory(&self, path: &Path, recursive: bool) -> FsOpsResult<DirOutcome> {
        if Self::existing_directory(path).await? {
            return Ok(DirOutcome::AlreadyPresent);
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(recursive);
        #[cfg(unix)]
        builder.mode(self.dir_mode);
        match builder.create(path).await {
            Ok(()) => Ok(DirOutcome::Created),
            // Lost a race with another writer; only a directory counts as present.
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if Self::existing_directory(path).await? {
                    Ok(DirOutcome::AlreadyPresent)
                } else {
                    Err(FsOpsError::io("local.mkdir", path, err))
                }
            }
            Err(err) => Err(FsOpsError::io("local.mkdir", path, err)),
        }
    }

    async fn put_file(&self, template: &Path, destination: &Path) -> FsOpsResult<PutOutcome> {
        let mut source = fs::File::open(template)
            .await
            .map_err(|err| FsOpsError::io("local.open_template", template, err))?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(self.file_mode);
        let mut target = match options.open(destination).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(PutOutcome::AlreadyPresent);
            }
            Err(err) => return Err(FsOpsError::io("local.create_file", destination, err)),
        };
        tokio::io::copy(&mut source, &mut target)
            .await
            .map_err(|err| FsOpsError::io("local.copy", destination, err))?;
        target
            .sync_all()
            .await
            .map_err(|err| FsOpsError::io("local.sync", destination, err))?;
        Ok(PutOutcome::Copied)
    }

    async fn exists(&self, path: &Path) -> FsOpsResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|err| FsOpsError::io("local.exists", path, err))
    }
}
