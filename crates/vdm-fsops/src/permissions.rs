//! Ownership and mode fix-up for entries created on the local warehouse.

use std::path::Path;

use crate::error::{FsOpsError, FsOpsResult};

/// Applies warehouse ownership and permission policy to a single path.
pub trait PermissionManager: Send + Sync {
    /// Make `path` owned by `username` (and its primary group) with the
    /// warehouse mode for its kind.
    ///
    /// # Errors
    ///
    /// Returns an error when the user cannot be resolved or the change is refused.
    fn set_owner_group_permissions(&self, username: &str, path: &Path) -> FsOpsResult<()>;
}

/// `chown` + `chmod` against the local filesystem.
#[derive(Debug, Clone, Copy)]
pub struct WarehousePermissions {
    dir_mode: u32,
    file_mode: u32,
}

impl WarehousePermissions {
    /// Build a manager applying `dir_mode` to directories and `file_mode` to files.
    #[must_use]
    pub const fn new(dir_mode: u32, file_mode: u32) -> Self {
        Self {
            dir_mode,
            file_mode,
        }
    }
}

impl PermissionManager for WarehousePermissions {
    #[cfg(unix)]
    fn set_owner_group_permissions(&self, username: &str, path: &Path) -> FsOpsResult<()> {
        use nix::unistd::chown;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let (uid, gid) = resolve_user(username)?;
        chown(path, Some(uid), Some(gid)).map_err(|source| FsOpsError::Nix {
            operation: "permissions.chown",
            path: path.to_path_buf(),
            source,
        })?;

        let metadata =
            fs::symlink_metadata(path).map_err(|err| FsOpsError::io("permissions.stat", path, err))?;
        let mode = if metadata.is_dir() {
            self.dir_mode
        } else {
            self.file_mode
        };
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|err| FsOpsError::io("permissions.chmod", path, err))?;
        tracing::debug!(path = %path.display(), user = username, mode = format!("{mode:o}"), "applied ownership");
        Ok(())
    }

    #[cfg(not(unix))]
    fn set_owner_group_permissions(&self, username: &str, _path: &Path) -> FsOpsResult<()> {
        Err(FsOpsError::Unsupported {
            operation: "set_owner_group_permissions",
            value: Some(username.to_string()),
        })
    }
}

#[cfg(unix)]
fn resolve_user(username: &str) -> FsOpsResult<(nix::unistd::Uid, nix::unistd::Gid)> {
    use nix::unistd::User;

    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "owner",
            reason: "empty",
            value: Some(username.to_string()),
        });
    }
    let user = User::from_name(trimmed)
        .map_err(|source| FsOpsError::UserLookup {
            user: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| FsOpsError::invalid_input("owner", "not_found", trimmed))?;
    Ok((user.uid, user.gid))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use anyhow::Result;
    use nix::unistd::{Uid, User};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn current_username() -> Result<String> {
        let user = User::from_uid(Uid::current())?
            .ok_or_else(|| anyhow::anyhow!("current user has no passwd entry"))?;
        Ok(user.name)
    }

    #[test]
    fn applies_mode_by_entry_kind() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("RV1001");
        fs::create_dir(&dir)?;
        let file = dir.join("log.csv");
        fs::write(&file, b"x")?;

        let manager = WarehousePermissions::new(0o750, 0o640);
        let username = current_username()?;
        manager.set_owner_group_permissions(&username, &dir)?;
        manager.set_owner_group_permissions(&username, &file)?;

        assert_eq!(fs::metadata(&dir)?.permissions().mode() & 0o7777, 0o750);
        assert_eq!(fs::metadata(&file)?.permissions().mode() & 0o7777, 0o640);
        Ok(())
    }

    #[test]
    fn unknown_user_is_reported() -> Result<()> {
        let temp = TempDir::new()?;
        let manager = WarehousePermissions::new(0o755, 0o644);
        let result = manager.set_owner_group_permissions("vdm-no-such-user-42", temp.path());
        assert!(matches!(
            result,
            Err(FsOpsError::InvalidInput {
                reason: "not_found",
                ..
            })
        ));
        assert!(matches!(
            manager.set_owner_group_permissions("  ", temp.path()),
            Err(FsOpsError::InvalidInput { reason: "empty", .. })
        ));
        Ok(())
    }
}
