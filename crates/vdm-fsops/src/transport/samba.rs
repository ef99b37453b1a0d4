//! Samba-share transport driven through `smbclient`.
//!
//! Every operation is one `smbclient -c` invocation. Failures are reported per
//! call; the orchestrator isolates them so siblings are still attempted.

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use vdm_config::{SambaCredentials, TransferType};

use super::{DirOutcome, FailureMode, PutOutcome, TransportAdapter};
use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{FsOpsError, FsOpsResult};

/// Program invoked for every share operation.
pub const SMBCLIENT_PROGRAM: &str = "smbclient";

const PASSWORD_ENV: &str = "PASSWD";
const COLLISION_STATUS: &str = "NT_STATUS_OBJECT_NAME_COLLISION";
const NOT_FOUND_STATUSES: [&str; 3] = [
    "NT_STATUS_NO_SUCH_FILE",
    "NT_STATUS_OBJECT_NAME_NOT_FOUND",
    "NT_STATUS_OBJECT_PATH_NOT_FOUND",
];

/// Creates directories and uploads files on a remote share.
pub struct SambaTransport {
    credentials: SambaCredentials,
    protocol: String,
    runner: Arc<dyn CommandRunner>,
}

impl SambaTransport {
    /// Build a transport for one share.
    #[must_use]
    pub fn new(
        credentials: SambaCredentials,
        protocol: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            credentials,
            protocol: protocol.into(),
            runner,
        }
    }

    fn command(&self, script: String) -> CommandSpec {
        let mut spec = CommandSpec::new(SMBCLIENT_PROGRAM)
            .arg(self.credentials.server.clone())
            .arg("-m")
            .arg(self.protocol.clone());
        if let Some(domain) = &self.credentials.domain {
            spec = spec.arg("-W").arg(domain.clone());
        }
        match (&self.credentials.username, &self.credentials.password) {
            (Some(user), Some(password)) if !self.credentials.is_anonymous() => {
                spec = spec
                    .arg("-U")
                    .arg(user.clone())
                    .env(PASSWORD_ENV, password.clone());
            }
            (Some(user), None) if !self.credentials.is_anonymous() => {
                spec = spec.arg("-U").arg(user.clone()).arg("-N");
            }
            _ => spec = spec.arg("-N"),
        }
        spec.arg("-c").arg(script)
    }

    async fn invoke(&self, script: String) -> FsOpsResult<CommandOutput> {
        let spec = self.command(script);
        let output = self.runner.run(&spec).await?;
        if !output.stdout.trim().is_empty() {
            debug!(server = %self.credentials.server, stdout = %output.stdout.trim(), "smbclient output");
        }
        Ok(output)
    }

    async fn mkdir(&self, remote: &str) -> FsOpsResult<DirOutcome> {
        let output = self.invoke(format!("mkdir \"{remote}\"")).await?;
        if mentions(&output, COLLISION_STATUS) {
            return Ok(DirOutcome::AlreadyPresent);
        }
        check("samba.mkdir", remote, &output)?;
        Ok(DirOutcome::Created)
    }
}

#[async_trait]
impl TransportAdapter for SambaTransport {
    fn kind(&self) -> TransferType {
        TransferType::SambaShare
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Isolate
    }

    async fn ensure_directory(&self, path: &Path, recursive: bool) -> FsOpsResult<DirOutcome> {
        let segments = remote_segments(path)?;
        if segments.is_empty() {
            return Ok(DirOutcome::AlreadyPresent);
        }
        if !recursive {
            return self.mkdir(&segments.join("/")).await;
        }
        let mut outcome = DirOutcome::AlreadyPresent;
        for depth in 1..=segments.len() {
            outcome = self.mkdir(&segments[..depth].join("/")).await?;
        }
        Ok(outcome)
    }

    async fn put_file(&self, template: &Path, destination: &Path) -> FsOpsResult<PutOutcome> {
        if self.exists(destination).await? {
            return Ok(PutOutcome::AlreadyPresent);
        }
        let mut segments = remote_segments(destination)?;
        let final_name = segments.pop().ok_or_else(|| {
            FsOpsError::invalid_input("destination", "empty", destination.display().to_string())
        })?;
        let template_name = template
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FsOpsError::invalid_input("template", "no_file_name", template.display().to_string())
            })?;
        let template_dir = template
            .parent()
            .and_then(Path::to_str)
            .ok_or_else(|| {
                FsOpsError::invalid_input("template", "non_utf8_path", template.display().to_string())
            })?;
        ensure_quotable("template", template_dir)?;
        ensure_quotable("template", template_name)?;

        let mut script = if segments.is_empty() {
            String::new()
        } else {
            format!("cd \"{}\"; ", segments.join("/"))
        };
        script.push_str(&format!("lcd \"{template_dir}\"; put \"{template_name}\""));
        if template_name != final_name {
            script.push_str(&format!("; rename \"{template_name}\" \"{final_name}\""));
        }

        let output = self.invoke(script).await?;
        let remote = join_remote(&segments, &final_name);
        check("samba.put", &remote, &output)?;
        Ok(PutOutcome::Copied)
    }

    async fn exists(&self, path: &Path) -> FsOpsResult<bool> {
        let segments = remote_segments(path)?;
        if segments.is_empty() {
            return Ok(true);
        }
        let remote = segments.join("/");
        let output = self.invoke(format!("ls \"{remote}\"")).await?;
        if NOT_FOUND_STATUSES
            .iter()
            .any(|status| mentions(&output, status))
        {
            return Ok(false);
        }
        check("samba.ls", &remote, &output)?;
        Ok(true)
    }
}

fn mentions(output: &CommandOutput, needle: &str) -> bool {
    output.stdout.contains(needle) || output.stderr.contains(needle)
}

fn check(operation: &'static str, remote: &str, output: &CommandOutput) -> FsOpsResult<()> {
    let status_line = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .find(|line| line.contains("NT_STATUS_"));
    let stderr = output.stderr.trim();
    if status_line.is_none() && stderr.is_empty() && output.success() {
        return Ok(());
    }
    let detail = status_line.map_or_else(|| stderr.to_string(), |line| line.trim().to_string());
    Err(FsOpsError::RemoteTransport {
        operation,
        path: remote.into(),
        status: output.status,
        detail,
    })
}

fn remote_segments(path: &Path) -> FsOpsResult<Vec<String>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    FsOpsError::invalid_input("remote_path", "non_utf8_path", path.display().to_string())
                })?;
                ensure_quotable("remote_path", segment)?;
                segments.push(segment.to_string());
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(FsOpsError::invalid_input(
                    "remote_path",
                    "unsafe_segment",
                    path.display().to_string(),
                ));
            }
        }
    }
    Ok(segments)
}

fn ensure_quotable(field: &'static str, value: &str) -> FsOpsResult<()> {
    if value.contains(['"', ';', '\n', '\r']) {
        return Err(FsOpsError::invalid_input(field, "unquotable", value));
    }
    Ok(())
}

fn join_remote(segments: &[String], name: &str) -> String {
    if segments.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<CommandSpec>>,
        replies: Mutex<VecDeque<CommandOutput>>,
    }

    impl ScriptedRunner {
        fn reply(self, stdout: &str, stderr: &str, status: i32) -> Self {
            if let Ok(mut replies) = self.replies.lock() {
                replies.push_back(CommandOutput {
                    status: Some(status),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                });
            }
            self
        }

        fn scripts(&self) -> Vec<String> {
            self.calls
                .lock()
                .map(|calls| {
                    calls
                        .iter()
                        .filter_map(|spec| spec.args.last().cloned())
                        .collect()
                })
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> FsOpsResult<CommandOutput> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(spec.clone());
            }
            Ok(self
                .replies
                .lock()
                .ok()
                .and_then(|mut replies| replies.pop_front())
                .unwrap_or(CommandOutput {
                    status: Some(0),
                    ..CommandOutput::default()
                }))
        }
    }

    fn credentials(user: Option<&str>, password: Option<&str>) -> SambaCredentials {
        SambaCredentials {
            server: "//nas/survey".into(),
            domain: Some("SHIP".into()),
            username: user.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    fn transport(runner: &Arc<ScriptedRunner>, creds: SambaCredentials) -> SambaTransport {
        let runner: Arc<dyn CommandRunner> = runner.clone();
        SambaTransport::new(creds, "SMB3", runner)
    }

    #[tokio::test]
    async fn password_travels_through_environment() -> FsOpsResult<()> {
        let runner = Arc::new(ScriptedRunner::default());
        let samba = transport(&runner, credentials(Some("survey"), Some("s3cret")));
        samba.ensure_directory(Path::new("RV1001"), false).await?;

        let calls = runner.calls.lock().map(|calls| calls.clone()).unwrap_or_default();
        let spec = &calls[0];
        assert_eq!(spec.program, SMBCLIENT_PROGRAM);
        assert_eq!(
            spec.args,
            vec!["//nas/survey", "-m", "SMB3", "-W", "SHIP", "-U", "survey", "-c", "mkdir \"RV1001\""]
        );
        assert!(!spec.args.iter().any(|arg| arg.contains("s3cret")));
        assert_eq!(spec.env, vec![("PASSWD".to_string(), "s3cret".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn guest_access_is_anonymous() -> FsOpsResult<()> {
        let runner = Arc::new(ScriptedRunner::default());
        let samba = transport(&runner, credentials(Some("guest"), Some("ignored")));
        samba.ensure_directory(Path::new("RV1001"), false).await?;
        let calls = runner.calls.lock().map(|calls| calls.clone()).unwrap_or_default();
        assert!(calls[0].args.contains(&"-N".to_string()));
        assert!(!calls[0].args.contains(&"-U".to_string()));
        assert!(calls[0].env.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn recursive_mkdir_walks_each_prefix_and_tolerates_collisions() -> FsOpsResult<()> {
        let runner = Arc::new(
            ScriptedRunner::default()
                .reply("", "NT_STATUS_OBJECT_NAME_COLLISION making remote directory \\data", 1)
                .reply("", "", 0),
        );
        let samba = transport(&runner, credentials(None, None));
        let outcome = samba
            .ensure_directory(Path::new("/data/RV1001"), true)
            .await?;
        assert_eq!(outcome, DirOutcome::Created);
        assert_eq!(
            runner.scripts(),
            vec!["mkdir \"data\"", "mkdir \"data/RV1001\""]
        );
        Ok(())
    }

    #[tokio::test]
    async fn stderr_output_is_a_remote_failure() {
        let runner = Arc::new(
            ScriptedRunner::default().reply("", "NT_STATUS_ACCESS_DENIED making remote directory", 1),
        );
        let samba = transport(&runner, credentials(None, None));
        let result = samba.ensure_directory(Path::new("locked"), false).await;
        assert!(matches!(
            result,
            Err(FsOpsError::RemoteTransport { operation: "samba.mkdir", ref detail, .. })
                if detail.contains("NT_STATUS_ACCESS_DENIED")
        ));
    }

    #[tokio::test]
    async fn put_uploads_then_renames_to_substituted_name() -> FsOpsResult<()> {
        let runner = Arc::new(
            ScriptedRunner::default()
                .reply("", "NT_STATUS_NO_SUCH_FILE listing \\RV1001\\RV1001_XBT_log.csv", 1)
                .reply("putting file {cruiseID}_XBT_log.csv", "", 0),
        );
        let samba = transport(&runner, credentials(None, None));
        let outcome = samba
            .put_file(
                Path::new("/opt/vdm/templates/XBT/{cruiseID}/{cruiseID}_XBT_log.csv"),
                Path::new("RV1001/RV1001_XBT_log.csv"),
            )
            .await?;
        assert_eq!(outcome, PutOutcome::Copied);
        assert_eq!(
            runner.scripts(),
            vec![
                "ls \"RV1001/RV1001_XBT_log.csv\"".to_string(),
                "cd \"RV1001\"; lcd \"/opt/vdm/templates/XBT/{cruiseID}\"; put \"{cruiseID}_XBT_log.csv\"; rename \"{cruiseID}_XBT_log.csv\" \"RV1001_XBT_log.csv\"".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn put_at_share_root_keeps_template_name() -> FsOpsResult<()> {
        let runner = Arc::new(ScriptedRunner::default().reply(
            "",
            "NT_STATUS_OBJECT_NAME_NOT_FOUND listing \\notes.txt",
            1,
        ));
        let samba = transport(&runner, credentials(None, None));
        let outcome = samba
            .put_file(Path::new("/templates/XBT/notes.txt"), Path::new("notes.txt"))
            .await?;
        assert_eq!(outcome, PutOutcome::Copied);
        assert_eq!(
            runner.scripts(),
            vec![
                "ls \"notes.txt\"".to_string(),
                "lcd \"/templates/XBT\"; put \"notes.txt\"".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn put_skips_existing_remote_file() -> FsOpsResult<()> {
        let runner = Arc::new(
            ScriptedRunner::default().reply("  notes.txt   A   10  Mon Jan  1 00:00:00 2024", "", 0),
        );
        let samba = transport(&runner, credentials(None, None));
        let outcome = samba
            .put_file(Path::new("/templates/notes.txt"), Path::new("RV1001/notes.txt"))
            .await?;
        assert_eq!(outcome, PutOutcome::AlreadyPresent);
        assert_eq!(runner.scripts().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn quote_breaking_paths_are_rejected_before_any_call() {
        let runner = Arc::new(ScriptedRunner::default());
        let samba = transport(&runner, credentials(None, None));
        let result = samba
            .ensure_directory(Path::new("RV1001/evil\"; rm x"), false)
            .await;
        assert!(matches!(
            result,
            Err(FsOpsError::InvalidInput { reason: "unquotable", .. })
        ));
        assert!(samba.exists(Path::new("../outside")).await.is_err());
        assert!(runner.scripts().is_empty());
    }
}
