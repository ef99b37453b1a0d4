use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use vdm_app::{
    AdapterFactory, AppError, DefaultAdapters, EligibilityError, PlannedTransfer,
    ProvisionOptions, Provisioner, Selection, SkipReason, TransferOutcome,
};
use vdm_config::{
    CollectionSystemTransfer, ConfigSnapshot, TransferScope, TransferType, WarehouseConfig,
};
use vdm_fsops::{DirOutcome, FailureMode, FsOpsResult, PutOutcome, TransportAdapter};
use vdm_test_support::fixtures::{
    SnapshotBuilder, TemplateTree, local_transfer, samba_transfer, transfer,
};
use vdm_test_support::mocks::{
    RecordingPermissions, RecordingRunner, RecordingTransport, TransportCall,
};

/// Hands out pre-built transports by transfer name.
#[derive(Default)]
struct FakeAdapters {
    transports: HashMap<String, Arc<dyn TransportAdapter>>,
}

impl FakeAdapters {
    fn with(self, name: &str, transport: &Arc<RecordingTransport>) -> Self {
        let adapter: Arc<dyn TransportAdapter> = transport.clone();
        self.with_adapter(name, adapter)
    }

    fn with_adapter(mut self, name: &str, adapter: Arc<dyn TransportAdapter>) -> Self {
        self.transports.insert(name.to_string(), adapter);
        self
    }
}

/// Local-style transport whose every operation panics.
struct PanickingTransport;

#[async_trait]
impl TransportAdapter for PanickingTransport {
    fn kind(&self) -> TransferType {
        TransferType::LocalDirectory
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Abort
    }

    async fn ensure_directory(&self, path: &Path, _recursive: bool) -> FsOpsResult<DirOutcome> {
        panic!("controller vanished while creating {}", path.display());
    }

    async fn put_file(&self, _template: &Path, destination: &Path) -> FsOpsResult<PutOutcome> {
        panic!("controller vanished while writing {}", destination.display());
    }

    async fn exists(&self, _path: &Path) -> FsOpsResult<bool> {
        Ok(false)
    }
}

impl AdapterFactory for FakeAdapters {
    fn adapter_for(
        &self,
        transfer: &CollectionSystemTransfer,
        _warehouse: &WarehouseConfig,
    ) -> FsOpsResult<Arc<dyn TransportAdapter>> {
        let adapter = self.transports.get(&transfer.name).ok_or_else(|| {
            vdm_fsops::FsOpsError::Unsupported {
                operation: "fake_adapter_for",
                value: Some(transfer.name.clone()),
            }
        })?;
        Ok(Arc::clone(adapter))
    }
}

fn provisioner(
    snapshot: ConfigSnapshot,
    adapters: impl AdapterFactory + 'static,
    permissions: &Arc<RecordingPermissions>,
) -> Provisioner {
    let permissions: Arc<RecordingPermissions> = Arc::clone(permissions);
    Provisioner::new(Arc::new(snapshot), Arc::new(adapters), permissions)
}

fn options(tree: &TemplateTree) -> ProvisionOptions {
    ProvisionOptions {
        template_root: tree.root().to_path_buf(),
        ..ProvisionOptions::default()
    }
}

fn xbt_tree() -> Result<TemplateTree> {
    TemplateTree::new()?
        .dir("XBT/{cruiseID}/raw_data")?
        .file("XBT/{cruiseID}/{cruiseID}_XBT_log.csv", b"time,depth\n")
}

fn rendered(calls: &[TransportCall]) -> Vec<String> {
    calls
        .iter()
        .map(|call| match call {
            TransportCall::EnsureDirectory { path, recursive } => {
                format!("mkdir{} {}", if *recursive { " -p" } else { "" }, path.display())
            }
            TransportCall::PutFile { destination, .. } => {
                format!("put {}", destination.display())
            }
            TransportCall::Exists { path } => format!("exists {}", path.display()),
        })
        .collect()
}

#[tokio::test]
async fn xbt_scenario_creates_cruise_tree_on_local_disk() -> Result<()> {
    let tree = xbt_tree()?;
    let dest = tree.scratch("mnt/xbt")?;
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", &dest.display().to_string()))
        .build();
    let permissions = Arc::new(RecordingPermissions::default());
    let runner = Arc::new(RecordingRunner::default());
    let provisioner = provisioner(snapshot, DefaultAdapters::new(runner.clone()), &permissions);

    let report = provisioner
        .provision(&Selection::Named("XBT".into()), &options(&tree))
        .await?;

    assert!(dest.join("RV1001").is_dir());
    assert!(dest.join("RV1001/raw_data").is_dir());
    assert_eq!(
        fs::read(dest.join("RV1001/RV1001_XBT_log.csv"))?,
        b"time,depth\n"
    );
    let outcome = report.transfer("XBT").map(|r| &r.outcome);
    assert!(matches!(
        outcome,
        Some(TransferOutcome::Completed { progress, soft_failures })
            if progress.directories_created == 2 && progress.files_copied == 1 && soft_failures.is_empty()
    ));
    let calls = permissions.calls();
    assert!(calls.iter().all(|(user, _)| user == "survey"));
    let fixed: Vec<PathBuf> = calls.into_iter().map(|(_, path)| path).collect();
    assert_eq!(
        fixed,
        vec![
            dest.join("RV1001"),
            dest.join("RV1001/raw_data"),
            dest.join("RV1001/RV1001_XBT_log.csv"),
        ]
    );
    assert!(runner.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn rerun_is_idempotent_and_preserves_edits() -> Result<()> {
    let tree = xbt_tree()?;
    let dest = tree.scratch("mnt/xbt")?;
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", &dest.display().to_string()))
        .build();
    let permissions = Arc::new(RecordingPermissions::default());
    let provisioner = provisioner(
        snapshot,
        DefaultAdapters::new(Arc::new(RecordingRunner::default())),
        &permissions,
    );
    let selection = Selection::Scope(TransferScope::Cruise);

    provisioner.provision(&selection, &options(&tree)).await?;
    fs::write(dest.join("RV1001/RV1001_XBT_log.csv"), b"operator notes")?;
    let fixups_after_first = permissions.calls().len();

    let report = provisioner.provision(&selection, &options(&tree)).await?;

    assert_eq!(
        fs::read(dest.join("RV1001/RV1001_XBT_log.csv"))?,
        b"operator notes"
    );
    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { progress, .. })
            if progress.directories_created == 0
                && progress.files_copied == 0
                && progress.directories_present == 2
                && progress.files_present == 1
    ));
    assert_eq!(permissions.calls().len(), fixups_after_first);
    Ok(())
}

#[tokio::test]
async fn instructions_arrive_in_walk_order_with_source_dir_first() -> Result<()> {
    let tree = xbt_tree()?;
    let transport = Arc::new(RecordingTransport::samba());
    let snapshot = SnapshotBuilder::new("survey")
        .with(samba_transfer("XBT", "/XBT/{cruiseID}_data"))
        .build();
    let permissions = Arc::new(RecordingPermissions::default());
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("XBT", &transport),
        &permissions,
    );

    let mut opts = options(&tree);
    opts.create_source_dir = true;
    provisioner
        .provision(&Selection::Named("XBT".into()), &opts)
        .await?;

    assert_eq!(
        rendered(&transport.calls()),
        vec![
            "mkdir -p /XBT/RV1001_data",
            "mkdir /XBT/RV1001_data/RV1001",
            "mkdir /XBT/RV1001_data/RV1001/raw_data",
            "put /XBT/RV1001_data/RV1001/RV1001_XBT_log.csv",
        ]
    );
    assert!(
        permissions.calls().is_empty(),
        "remote entries never get local permission fix-up"
    );
    Ok(())
}

#[tokio::test]
async fn samba_failures_are_isolated_per_instruction() -> Result<()> {
    let tree = TemplateTree::new()?
        .dir("Sonar/{cruiseID}/raw")?
        .dir("Sonar/{cruiseID}/proc")?
        .file("Sonar/{cruiseID}/README.txt", b"sonar")?;
    let transport = Arc::new(RecordingTransport::samba().failing_on("share/RV1001/proc"));
    let snapshot = SnapshotBuilder::new("survey")
        .with(samba_transfer("Sonar", "share"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("Sonar", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    let report = provisioner
        .provision(&Selection::Scope(TransferScope::Cruise), &options(&tree))
        .await?;

    match report.transfer("Sonar").map(|r| &r.outcome) {
        Some(TransferOutcome::Completed {
            progress,
            soft_failures,
        }) => {
            assert_eq!(soft_failures.len(), 1);
            assert_eq!(soft_failures[0].destination, Path::new("share/RV1001/proc"));
            assert_eq!(progress.directories_created, 2);
            assert_eq!(progress.files_copied, 1);
        }
        other => anyhow::bail!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.soft_failures(), 1);
    Ok(())
}

#[tokio::test]
async fn local_failure_aborts_only_that_transfer() -> Result<()> {
    let tree = TemplateTree::new()?
        .dir("CTD/{cruiseID}/casts")?
        .file("CTD/{cruiseID}/notes.txt", b"")?
        .dir("XBT/{cruiseID}")?;
    let ctd = Arc::new(RecordingTransport::local().failing_on("/ctd/RV1001/casts"));
    let xbt = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("CTD", "/ctd"))
        .with(local_transfer("XBT", "/xbt"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("CTD", &ctd).with("XBT", &xbt),
        &Arc::new(RecordingPermissions::default()),
    );

    let mut opts = options(&tree);
    opts.concurrency = std::num::NonZeroUsize::new(2).ok_or_else(|| anyhow::anyhow!("nonzero"))?;
    let report = provisioner
        .provision(&Selection::Scope(TransferScope::Cruise), &opts)
        .await?;

    assert!(matches!(
        report.transfer("CTD").map(|r| &r.outcome),
        Some(TransferOutcome::Aborted { progress, .. }) if progress.directories_created == 1
    ));
    assert!(
        !rendered(&ctd.calls()).contains(&"put /ctd/RV1001/notes.txt".to_string()),
        "no instruction runs after a local failure"
    );
    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { .. })
    ));
    assert_eq!(report.aborted(), 1);
    Ok(())
}

#[tokio::test]
async fn panicking_worker_fails_only_its_transfer() -> Result<()> {
    let tree = TemplateTree::new()?
        .dir("CTD/{cruiseID}/casts")?
        .dir("XBT/{cruiseID}/raw_data")?
        .file("XBT/{cruiseID}/notes.txt", b"")?;
    let xbt = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("CTD", "/ctd"))
        .with(local_transfer("XBT", "/xbt"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default()
            .with_adapter("CTD", Arc::new(PanickingTransport))
            .with("XBT", &xbt),
        &Arc::new(RecordingPermissions::default()),
    );

    let mut opts = options(&tree);
    opts.concurrency = std::num::NonZeroUsize::new(2).ok_or_else(|| anyhow::anyhow!("nonzero"))?;
    let report = provisioner
        .provision(&Selection::Scope(TransferScope::Cruise), &opts)
        .await?;

    assert!(matches!(
        report.transfer("CTD").map(|r| &r.outcome),
        Some(TransferOutcome::WorkerFailed { detail }) if detail.contains("panicked")
    ));
    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { progress, soft_failures })
            if progress.directories_created == 2 && progress.files_copied == 1 && soft_failures.is_empty()
    ));
    assert_eq!(
        rendered(&xbt.calls()),
        vec!["mkdir /xbt/RV1001", "mkdir /xbt/RV1001/raw_data", "put /xbt/RV1001/notes.txt"]
    );
    assert_eq!(report.transfers.len(), 2);
    assert_eq!(report.aborted(), 1);
    Ok(())
}

#[tokio::test]
async fn created_source_ancestors_are_fixed_up_on_local_disk() -> Result<()> {
    let tree = xbt_tree()?;
    let dest = tree.scratch("dest")?;
    let source = dest.join("mnt/xbt/deep/RV1001");
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer(
            "XBT",
            &format!("{}/mnt/xbt/deep/{{cruiseID}}", dest.display()),
        ))
        .build();
    let permissions = Arc::new(RecordingPermissions::default());
    let provisioner = provisioner(
        snapshot,
        DefaultAdapters::new(Arc::new(RecordingRunner::default())),
        &permissions,
    );

    let mut opts = options(&tree);
    opts.create_source_dir = true;
    let report = provisioner
        .provision(&Selection::Named("XBT".into()), &opts)
        .await?;

    assert!(source.join("RV1001/raw_data").is_dir());
    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { progress, soft_failures })
            if progress.directories_created == 3 && progress.files_copied == 1 && soft_failures.is_empty()
    ));
    let fixed: Vec<PathBuf> = permissions.calls().into_iter().map(|(_, path)| path).collect();
    assert_eq!(
        fixed,
        vec![
            dest.join("mnt"),
            dest.join("mnt/xbt"),
            dest.join("mnt/xbt/deep"),
            source.clone(),
            source.join("RV1001"),
            source.join("RV1001/raw_data"),
            source.join("RV1001/RV1001_XBT_log.csv"),
        ]
    );

    let rerun = provisioner
        .provision(&Selection::Named("XBT".into()), &opts)
        .await?;
    assert!(matches!(
        rerun.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { progress, .. }) if progress.directories_created == 0
    ));
    assert_eq!(permissions.calls().len(), fixed.len());
    Ok(())
}

#[tokio::test]
async fn failed_permission_fix_up_does_not_fail_local_transfer() -> Result<()> {
    let tree = xbt_tree()?;
    let dest = tree.scratch("mnt/xbt")?;
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", &dest.display().to_string()))
        .build();
    let permissions = Arc::new(RecordingPermissions::failing());
    let provisioner = provisioner(
        snapshot,
        DefaultAdapters::new(Arc::new(RecordingRunner::default())),
        &permissions,
    );

    let report = provisioner
        .provision(&Selection::Named("XBT".into()), &options(&tree))
        .await?;

    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { progress, soft_failures })
            if progress.directories_created == 2 && progress.files_copied == 1 && soft_failures.is_empty()
    ));
    assert!(dest.join("RV1001/raw_data").is_dir());
    assert_eq!(
        fs::read(dest.join("RV1001/RV1001_XBT_log.csv"))?,
        b"time,depth\n"
    );
    assert_eq!(permissions.calls().len(), 3);
    assert_eq!(report.aborted(), 0);
    Ok(())
}

#[tokio::test]
async fn unsupported_explicit_transfer_makes_no_calls() -> Result<()> {
    let tree = TemplateTree::new()?.dir("Gravimeter/{cruiseID}")?;
    let transport = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(transfer("Gravimeter", TransferType::RsyncServer, "/grav"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("Gravimeter", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    let result = provisioner
        .provision(&Selection::Named("Gravimeter".into()), &options(&tree))
        .await;

    assert!(matches!(
        result,
        Err(AppError::Eligibility {
            source: EligibilityError::UnsupportedTransport { .. }
        })
    ));
    assert!(transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn unsupported_transfer_in_scope_is_skipped() -> Result<()> {
    let tree = xbt_tree()?;
    let xbt = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(transfer("Gravimeter", TransferType::SshServer, "/grav"))
        .with(local_transfer("XBT", "/xbt"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("XBT", &xbt),
        &Arc::new(RecordingPermissions::default()),
    );

    let report = provisioner
        .provision(&Selection::Scope(TransferScope::Cruise), &options(&tree))
        .await?;

    assert!(matches!(
        report.transfer("Gravimeter").map(|r| &r.outcome),
        Some(TransferOutcome::Skipped(SkipReason::UnsupportedTransport))
    ));
    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Completed { .. })
    ));
    let order: Vec<&str> = report.transfers.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["XBT", "Gravimeter"], "skipped transfers follow processed ones");
    Ok(())
}

#[tokio::test]
async fn missing_lowering_fails_before_any_work() -> Result<()> {
    let tree = TemplateTree::new()?.dir("ROV/{cruiseID}/{loweringID}")?;
    let transport = Arc::new(RecordingTransport::local());
    let mut rov = local_transfer("ROV", "/rov/{cruiseID}");
    rov.scope = TransferScope::Lowering;
    let snapshot = SnapshotBuilder::new("survey").with(rov).build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("ROV", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    let result = provisioner
        .provision(&Selection::Scope(TransferScope::Lowering), &options(&tree))
        .await;

    assert!(matches!(
        result,
        Err(AppError::Eligibility {
            source: EligibilityError::MissingLowering { name: None }
        })
    ));
    assert!(transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn lowering_scope_substitutes_both_identifiers() -> Result<()> {
    let tree = TemplateTree::new()?.file("ROV/{loweringID}/{cruiseID}_{loweringID}.log", b"")?;
    let transport = Arc::new(RecordingTransport::local());
    let mut rov = local_transfer("ROV", "/rov/{cruiseID}");
    rov.scope = TransferScope::Lowering;
    let snapshot = SnapshotBuilder::new("survey")
        .lowering("DIVE07")
        .with(rov)
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("ROV", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    provisioner
        .provision(&Selection::Scope(TransferScope::Lowering), &options(&tree))
        .await?;

    assert_eq!(
        rendered(&transport.calls()),
        vec!["mkdir /rov/RV1001/DIVE07", "put /rov/RV1001/DIVE07/RV1001_DIVE07.log"]
    );
    Ok(())
}

#[tokio::test]
async fn transfer_without_template_is_skipped_untouched() -> Result<()> {
    let tree = xbt_tree()?;
    let transport = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("CTD", "/ctd"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("CTD", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    let mut opts = options(&tree);
    opts.create_source_dir = true;
    let report = provisioner
        .provision(&Selection::Named("CTD".into()), &opts)
        .await?;

    assert!(matches!(
        report.transfer("CTD").map(|r| &r.outcome),
        Some(TransferOutcome::Skipped(SkipReason::NoTemplate))
    ));
    assert!(transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_template_root_and_cruise_are_fatal() -> Result<()> {
    let tree = xbt_tree()?;
    let permissions = Arc::new(RecordingPermissions::default());
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", "/xbt"))
        .build();
    let provisioner_ok = provisioner(snapshot.clone(), FakeAdapters::default(), &permissions);
    let missing_root = ProvisionOptions {
        template_root: tree.root().join("nope"),
        ..ProvisionOptions::default()
    };
    assert!(matches!(
        provisioner_ok
            .provision(&Selection::Scope(TransferScope::Cruise), &missing_root)
            .await,
        Err(AppError::TemplateRootMissing { .. })
    ));

    let no_cruise = SnapshotBuilder::new("survey")
        .cruise(None)
        .with(local_transfer("XBT", "/xbt"))
        .build();
    let provisioner_no_cruise = provisioner(no_cruise, FakeAdapters::default(), &permissions);
    assert!(matches!(
        provisioner_no_cruise
            .provision(&Selection::Scope(TransferScope::Cruise), &options(&tree))
            .await,
        Err(AppError::Eligibility {
            source: EligibilityError::Config { .. }
        })
    ));
    Ok(())
}

#[tokio::test]
async fn unresolved_source_dir_aborts_the_transfer() -> Result<()> {
    let tree = xbt_tree()?;
    let transport = Arc::new(RecordingTransport::local());
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", "/xbt/{loweringID}"))
        .build();
    let provisioner = provisioner(
        snapshot,
        FakeAdapters::default().with("XBT", &transport),
        &Arc::new(RecordingPermissions::default()),
    );

    let report = provisioner
        .provision(&Selection::Named("XBT".into()), &options(&tree))
        .await?;

    assert!(matches!(
        report.transfer("XBT").map(|r| &r.outcome),
        Some(TransferOutcome::Aborted {
            error: vdm_fsops::FsOpsError::UnresolvedPlaceholder { .. },
            ..
        })
    ));
    assert!(transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn plan_lists_instructions_without_side_effects() -> Result<()> {
    let tree = xbt_tree()?;
    let dest = tree.scratch("mnt/xbt")?;
    let snapshot = SnapshotBuilder::new("survey")
        .with(local_transfer("XBT", &dest.display().to_string()))
        .with(local_transfer("CTD", "/ctd"))
        .build();
    let provisioner = provisioner(
        snapshot,
        DefaultAdapters::new(Arc::new(RecordingRunner::default())),
        &Arc::new(RecordingPermissions::default()),
    );

    let plan = provisioner.plan(&Selection::Scope(TransferScope::Cruise), &options(&tree))?;

    let xbt = plan
        .transfers
        .iter()
        .find(|entry| entry.name == "XBT")
        .ok_or_else(|| anyhow::anyhow!("XBT plan missing"))?;
    match &xbt.plan {
        PlannedTransfer::Planned {
            source_dir,
            instructions,
        } => {
            assert_eq!(source_dir, &dest);
            let lines: Vec<String> = instructions.iter().map(ToString::to_string).collect();
            assert_eq!(
                lines,
                vec!["mkdir RV1001", "mkdir RV1001/raw_data", "put RV1001/RV1001_XBT_log.csv"]
            );
        }
        other => anyhow::bail!("unexpected plan {other:?}"),
    }
    assert!(plan.transfers.iter().any(|entry| entry.name == "CTD"
        && matches!(entry.plan, PlannedTransfer::Skipped(SkipReason::NoTemplate))));
    assert!(!dest.join("RV1001").exists());
    Ok(())
}
