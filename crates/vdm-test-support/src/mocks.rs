//! Recording fakes for the provisioning ports.
//!
//! Each fake records every call so tests can assert on ordering and can be
//! told to fail for specific paths.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use vdm_config::TransferType;
use vdm_fsops::{
    CommandOutput, CommandRunner, CommandSpec, DirOutcome, FailureMode, FsOpsError, FsOpsResult,
    PermissionManager, PutOutcome, TransportAdapter,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Command runner that records specs and replays queued outputs.
///
/// When the queue is empty every command succeeds with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    replies: Mutex<VecDeque<CommandOutput>>,
}

impl RecordingRunner {
    /// Queue the output returned by the next unanswered call.
    #[must_use]
    pub fn reply(self, status: i32, stdout: &str, stderr: &str) -> Self {
        locked(&self.replies).push_back(CommandOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Every command run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> FsOpsResult<CommandOutput> {
        locked(&self.calls).push(spec.clone());
        Ok(locked(&self.replies)
            .pop_front()
            .unwrap_or_else(|| CommandOutput {
                status: Some(0),
                ..CommandOutput::default()
            }))
    }
}

/// Permission manager that records `(username, path)` pairs.
#[derive(Debug, Default)]
pub struct RecordingPermissions {
    calls: Mutex<Vec<(String, PathBuf)>>,
    fail: bool,
}

impl RecordingPermissions {
    /// A manager whose every call fails after being recorded.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every fix-up requested so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        locked(&self.calls).clone()
    }
}

impl PermissionManager for RecordingPermissions {
    fn set_owner_group_permissions(&self, username: &str, path: &Path) -> FsOpsResult<()> {
        locked(&self.calls).push((username.to_string(), path.to_path_buf()));
        if self.fail {
            return Err(FsOpsError::Unsupported {
                operation: "set_owner_group_permissions",
                value: Some(username.to_string()),
            });
        }
        Ok(())
    }
}

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `ensure_directory(path, recursive)`.
    EnsureDirectory {
        /// Target path.
        path: PathBuf,
        /// Whether ancestors were requested too.
        recursive: bool,
    },
    /// `put_file(template, destination)`.
    PutFile {
        /// Template file.
        template: PathBuf,
        /// Destination path.
        destination: PathBuf,
    },
    /// `exists(path)`.
    Exists {
        /// Queried path.
        path: PathBuf,
    },
}

#[derive(Debug, Default)]
struct Destination {
    directories: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

/// In-memory transport that records calls and remembers what it created,
/// so re-running a walk reports entries as already present.
#[derive(Debug)]
pub struct RecordingTransport {
    kind: TransferType,
    failure_mode: FailureMode,
    failing: HashSet<PathBuf>,
    calls: Mutex<Vec<TransportCall>>,
    state: Mutex<Destination>,
}

impl RecordingTransport {
    /// Behaves like the local adapter: errors abort the transfer.
    #[must_use]
    pub fn local() -> Self {
        Self::new(TransferType::LocalDirectory, FailureMode::Abort)
    }

    /// Behaves like the Samba adapter: errors are isolated.
    #[must_use]
    pub fn samba() -> Self {
        Self::new(TransferType::SambaShare, FailureMode::Isolate)
    }

    fn new(kind: TransferType, failure_mode: FailureMode) -> Self {
        Self {
            kind,
            failure_mode,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(Destination::default()),
        }
    }

    /// Fail every operation targeting `path`.
    #[must_use]
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Every call observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        locked(&self.calls).clone()
    }

    /// Forget recorded calls while keeping created entries.
    pub fn clear_calls(&self) {
        locked(&self.calls).clear();
    }

    fn check(&self, operation: &'static str, path: &Path) -> FsOpsResult<()> {
        if self.failing.contains(path) {
            return Err(FsOpsError::RemoteTransport {
                operation,
                path: path.to_path_buf(),
                status: Some(1),
                detail: "NT_STATUS_ACCESS_DENIED".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for RecordingTransport {
    fn kind(&self) -> TransferType {
        self.kind
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    async fn ensure_directory(&self, path: &Path, recursive: bool) -> FsOpsResult<DirOutcome> {
        locked(&self.calls).push(TransportCall::EnsureDirectory {
            path: path.to_path_buf(),
            recursive,
        });
        self.check("recording.ensure_directory", path)?;
        if locked(&self.state).directories.insert(path.to_path_buf()) {
            Ok(DirOutcome::Created)
        } else {
            Ok(DirOutcome::AlreadyPresent)
        }
    }

    async fn put_file(&self, template: &Path, destination: &Path) -> FsOpsResult<PutOutcome> {
        locked(&self.calls).push(TransportCall::PutFile {
            template: template.to_path_buf(),
            destination: destination.to_path_buf(),
        });
        self.check("recording.put_file", destination)?;
        if locked(&self.state).files.insert(destination.to_path_buf()) {
            Ok(PutOutcome::Copied)
        } else {
            Ok(PutOutcome::AlreadyPresent)
        }
    }

    async fn exists(&self, path: &Path) -> FsOpsResult<bool> {
        locked(&self.calls).push(TransportCall::Exists {
            path: path.to_path_buf(),
        });
        let state = locked(&self.state);
        Ok(state.directories.contains(path) || state.files.contains(path))
    }
}
