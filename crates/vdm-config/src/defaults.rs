//! Default warehouse policy values applied when the configuration service
//! leaves them unset.

/// Mode applied to directories created on the warehouse filesystem.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Mode applied to files copied onto the warehouse filesystem.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Protocol level requested from `smbclient` when none is configured.
pub const DEFAULT_SMB_PROTOCOL: &str = "SMB2";
/// Timeout applied to configuration service HTTP requests.
pub(crate) const HTTP_TIMEOUT_SECS: u64 = 10;
