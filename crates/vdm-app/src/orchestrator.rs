//! Provisioning orchestrator: drives each eligible transfer through its
//! transport adapter and collects a per-transfer report.
//!
//! Transfers run concurrently up to a configured limit; instructions within a
//! transfer are applied strictly in walker order.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use vdm_config::{CollectionSystemTransfer, ConfigGateway, TransferType, WarehouseConfig};
use vdm_fsops::{
    CommandRunner, DirOutcome, FailureMode, FsOpsResult, NodeKind, PermissionManager,
    ProvisioningInstruction, PutOutcome, Substitutions, TransportAdapter, template_subtree,
    walk_template,
};

use crate::eligibility::{Selection, select_transfers};
use crate::error::{AppError, AppResult, EligibilityError};
use crate::report::{
    InstructionFailure, PlannedTransfer, Progress, ProvisionPlan, ProvisionReport, SkipReason,
    TransferOutcome, TransferPlan, TransferReport,
};

/// Default template root on the warehouse.
pub const DEFAULT_TEMPLATE_ROOT: &str = "/opt/vdm/templates";

const WORKER_LOST: &str = "worker exited without a report";

/// Knobs for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Root holding one template subtree per collection system.
    pub template_root: PathBuf,
    /// Create the resolved source directory before walking the template.
    pub create_source_dir: bool,
    /// Maximum number of transfers processed at once.
    pub concurrency: NonZeroUsize,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from(DEFAULT_TEMPLATE_ROOT),
            create_source_dir: false,
            concurrency: NonZeroUsize::MIN,
        }
    }
}

/// Builds the transport adapter for a transfer.
pub trait AdapterFactory: Send + Sync {
    /// Adapter for `transfer`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transfer cannot be served by any adapter.
    fn adapter_for(
        &self,
        transfer: &CollectionSystemTransfer,
        warehouse: &WarehouseConfig,
    ) -> FsOpsResult<Arc<dyn TransportAdapter>>;
}

/// Production adapters: local filesystem and `smbclient`.
pub struct DefaultAdapters {
    runner: Arc<dyn CommandRunner>,
}

impl DefaultAdapters {
    /// Adapters whose remote calls go through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl AdapterFactory for DefaultAdapters {
    fn adapter_for(
        &self,
        transfer: &CollectionSystemTransfer,
        warehouse: &WarehouseConfig,
    ) -> FsOpsResult<Arc<dyn TransportAdapter>> {
        vdm_fsops::adapter_for(transfer, warehouse, Arc::clone(&self.runner))
    }
}

/// Coordinates eligibility, template walking and adapter dispatch.
pub struct Provisioner {
    gateway: Arc<dyn ConfigGateway>,
    adapters: Arc<dyn AdapterFactory>,
    permissions: Arc<dyn PermissionManager>,
}

impl Provisioner {
    /// Construct a provisioner from its collaborators.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ConfigGateway>,
        adapters: Arc<dyn AdapterFactory>,
        permissions: Arc<dyn PermissionManager>,
    ) -> Self {
        Self {
            gateway,
            adapters,
            permissions,
        }
    }

    /// Provision every transfer in `selection`.
    ///
    /// # Errors
    ///
    /// Fails before touching any destination when the template root is
    /// missing, the cruise ID is unset, or the selection is not eligible.
    /// Per-transfer failures are reported in the returned report instead.
    pub async fn provision(
        &self,
        selection: &Selection,
        options: &ProvisionOptions,
    ) -> AppResult<ProvisionReport> {
        let prepared = self.prepare(selection, options)?;
        info!(
            %selection,
            eligible = prepared.eligible.len(),
            skipped = prepared.skipped.len(),
            "provisioning run starting"
        );

        let warehouse = self.gateway.warehouse_config();
        let limit = Arc::new(Semaphore::new(options.concurrency.get()));
        let mut workers = JoinSet::new();
        let mut reports: Vec<Option<TransferReport>> = Vec::new();
        let mut identities: Vec<(String, TransferType)> = Vec::new();

        for (index, transfer) in prepared.eligible.into_iter().enumerate() {
            reports.push(None);
            identities.push((transfer.name.clone(), transfer.transfer_type));
            let adapter = match self.adapters.adapter_for(&transfer, warehouse) {
                Ok(adapter) => adapter,
                Err(error) => {
                    error!(transfer = %transfer.name, error = %error, "no transport adapter");
                    reports[index] = Some(TransferReport {
                        name: transfer.name,
                        transfer_type: transfer.transfer_type,
                        outcome: TransferOutcome::Aborted {
                            error,
                            progress: Progress::default(),
                        },
                    });
                    continue;
                }
            };
            let permissions = (adapter.kind() == TransferType::LocalDirectory)
                .then(|| Arc::clone(&self.permissions));
            let job = TransferJob {
                span: info_span!(
                    "transfer",
                    transfer = %transfer.name,
                    transfer_id = %transfer.id,
                    long_name = transfer.long_name.as_deref().unwrap_or_default(),
                    transfer_type = %transfer.transfer_type
                ),
                transfer,
                adapter,
                permissions,
                owner: warehouse.username.clone(),
                substitutions: prepared.substitutions.clone(),
                template_root: options.template_root.clone(),
                create_source_dir: options.create_source_dir,
            };
            let limit = Arc::clone(&limit);
            workers.spawn(async move {
                let _permit = limit.acquire_owned().await;
                (index, job.run_isolated().await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, report)) => {
                    if let Some(slot) = reports.get_mut(index) {
                        *slot = Some(report);
                    }
                }
                Err(source) => error!(error = %source, "transfer worker lost"),
            }
        }

        let mut report = ProvisionReport {
            transfers: reports
                .into_iter()
                .zip(identities)
                .map(|(slot, (name, transfer_type))| {
                    slot.unwrap_or_else(|| TransferReport {
                        name,
                        transfer_type,
                        outcome: TransferOutcome::WorkerFailed {
                            detail: WORKER_LOST.to_string(),
                        },
                    })
                })
                .collect(),
        };
        report
            .transfers
            .extend(prepared.skipped.into_iter().map(|(transfer, reason)| {
                TransferReport {
                    name: transfer.name,
                    transfer_type: transfer.transfer_type,
                    outcome: TransferOutcome::Skipped(reason),
                }
            }));
        info!(
            transfers = report.transfers.len(),
            aborted = report.aborted(),
            skipped = report.skipped(),
            soft_failures = report.soft_failures(),
            "provisioning run finished"
        );
        Ok(report)
    }

    /// Compute the instructions each transfer in `selection` would receive,
    /// without touching any destination.
    ///
    /// # Errors
    ///
    /// Same configuration-level failures as [`Self::provision`].
    pub fn plan(&self, selection: &Selection, options: &ProvisionOptions) -> AppResult<ProvisionPlan> {
        let prepared = self.prepare(selection, options)?;
        let mut plan = ProvisionPlan::default();
        for transfer in prepared.eligible {
            let planned = plan_transfer(&transfer, &prepared.substitutions, &options.template_root);
            plan.transfers.push(TransferPlan {
                name: transfer.name,
                transfer_type: transfer.transfer_type,
                plan: planned,
            });
        }
        plan.transfers
            .extend(prepared.skipped.into_iter().map(|(transfer, reason)| TransferPlan {
                name: transfer.name,
                transfer_type: transfer.transfer_type,
                plan: PlannedTransfer::Skipped(reason),
            }));
        Ok(plan)
    }

    fn prepare(&self, selection: &Selection, options: &ProvisionOptions) -> AppResult<Prepared> {
        if !options.template_root.is_dir() {
            return Err(AppError::TemplateRootMissing {
                path: options.template_root.clone(),
            });
        }
        let context = self
            .gateway
            .cruise_context()
            .map_err(|err| EligibilityError::config("gateway.cruise_context", err))?;
        let working = select_transfers(self.gateway.as_ref(), selection)?;
        Ok(Prepared {
            substitutions: Substitutions::new(&context),
            eligible: working.eligible,
            skipped: working.skipped,
        })
    }
}

struct Prepared {
    substitutions: Substitutions,
    eligible: Vec<CollectionSystemTransfer>,
    skipped: Vec<(CollectionSystemTransfer, SkipReason)>,
}

fn plan_transfer(
    transfer: &CollectionSystemTransfer,
    substitutions: &Substitutions,
    template_root: &Path,
) -> PlannedTransfer {
    if template_subtree(template_root, &transfer.name).is_none() {
        return PlannedTransfer::Skipped(SkipReason::NoTemplate);
    }
    let source_dir = match substitutions.resolve_pattern(&transfer.source_dir) {
        Ok(resolved) => PathBuf::from(resolved),
        Err(error) => return PlannedTransfer::Invalid { error },
    };
    match walk_template(template_root, &transfer.name, substitutions.clone())
        .collect::<FsOpsResult<Vec<_>>>()
    {
        Ok(instructions) => PlannedTransfer::Planned {
            source_dir,
            instructions,
        },
        Err(error) => PlannedTransfer::Invalid { error },
    }
}

struct TransferJob {
    span: tracing::Span,
    transfer: CollectionSystemTransfer,
    adapter: Arc<dyn TransportAdapter>,
    /// Set only for transports whose entries need ownership fix-up.
    permissions: Option<Arc<dyn PermissionManager>>,
    owner: String,
    substitutions: Substitutions,
    template_root: PathBuf,
    create_source_dir: bool,
}

impl TransferJob {
    /// Runs the job on its own task so a panic is reported as this
    /// transfer's outcome instead of unwinding through the run.
    async fn run_isolated(self) -> TransferReport {
        let name = self.transfer.name.clone();
        let transfer_type = self.transfer.transfer_type;
        let span = self.span.clone();
        let mut worker = JoinSet::new();
        worker.spawn(self.run().instrument(span.clone()));
        match worker.join_next().await {
            Some(Ok(report)) => report,
            joined => {
                let detail = joined
                    .and_then(Result::err)
                    .map_or_else(|| WORKER_LOST.to_string(), |err| err.to_string());
                error!(parent: &span, detail = %detail, "transfer worker failed");
                TransferReport {
                    name,
                    transfer_type,
                    outcome: TransferOutcome::WorkerFailed { detail },
                }
            }
        }
    }

    async fn run(self) -> TransferReport {
        let outcome = self.provision().await;
        match &outcome {
            TransferOutcome::Aborted { error, .. } => {
                error!(error = %error, detail = ?error, "transfer aborted");
            }
            other => info!(outcome = other.label(), "transfer finished"),
        }
        TransferReport {
            name: self.transfer.name,
            transfer_type: self.transfer.transfer_type,
            outcome,
        }
    }

    async fn provision(&self) -> TransferOutcome {
        let mut progress = Progress::default();
        let mut soft_failures = Vec::new();

        if template_subtree(&self.template_root, &self.transfer.name).is_none() {
            info!("no template for collection system");
            return TransferOutcome::Skipped(SkipReason::NoTemplate);
        }

        let source = match self.substitutions.resolve_pattern(&self.transfer.source_dir) {
            Ok(resolved) => PathBuf::from(resolved),
            Err(error) => return TransferOutcome::Aborted { error, progress },
        };
        debug!(source = %source.display(), "resolved source directory");

        if self.create_source_dir {
            match self.ensure_source_dir(&source).await {
                Ok(outcome) => progress.record_directory(outcome),
                Err(error) => match self.adapter.failure_mode() {
                    FailureMode::Abort => return TransferOutcome::Aborted { error, progress },
                    FailureMode::Isolate => {
                        error!(path = %source.display(), error = %error, "source directory creation failed");
                        soft_failures.push(InstructionFailure {
                            destination: source.clone(),
                            error,
                        });
                    }
                },
            }
        }

        let walk = walk_template(
            &self.template_root,
            &self.transfer.name,
            self.substitutions.clone(),
        );
        for item in walk {
            let instruction = match item {
                Ok(instruction) => instruction,
                Err(error) => return TransferOutcome::Aborted { error, progress },
            };
            let destination = source.join(&instruction.destination);
            match self.apply(&instruction, &destination, &mut progress).await {
                Ok(created) => {
                    if created {
                        self.fix_up(&destination);
                    }
                }
                Err(error) => match self.adapter.failure_mode() {
                    FailureMode::Abort => return TransferOutcome::Aborted { error, progress },
                    FailureMode::Isolate => {
                        error!(
                            path = %destination.display(),
                            instruction = %instruction,
                            error = %error,
                            detail = ?error,
                            "instruction failed"
                        );
                        soft_failures.push(InstructionFailure { destination, error });
                    }
                },
            }
        }

        TransferOutcome::Completed {
            progress,
            soft_failures,
        }
    }

    /// Creates the source directory. With permission fix-up enabled every
    /// missing ancestor is created one level at a time so each new level
    /// gets fixed up, not only the leaf.
    async fn ensure_source_dir(&self, source: &Path) -> FsOpsResult<DirOutcome> {
        if self.permissions.is_none() {
            return self.adapter.ensure_directory(source, true).await;
        }
        let mut missing = Vec::new();
        for level in source.ancestors() {
            if level.as_os_str().is_empty() || self.adapter.exists(level).await? {
                break;
            }
            missing.push(level);
        }
        let mut outcome = DirOutcome::AlreadyPresent;
        for level in missing.into_iter().rev() {
            outcome = self.adapter.ensure_directory(level, false).await?;
            if outcome == DirOutcome::Created {
                self.fix_up(level);
            }
        }
        Ok(outcome)
    }

    /// Returns whether a new entry was created.
    async fn apply(
        &self,
        instruction: &ProvisioningInstruction,
        destination: &Path,
        progress: &mut Progress,
    ) -> FsOpsResult<bool> {
        match (instruction.kind, instruction.template_path.as_deref()) {
            (NodeKind::Directory, _) => {
                let outcome = self.adapter.ensure_directory(destination, false).await?;
                progress.record_directory(outcome);
                Ok(outcome == DirOutcome::Created)
            }
            (NodeKind::File, Some(template)) => {
                let outcome = self.adapter.put_file(template, destination).await?;
                progress.record_file(outcome);
                Ok(outcome == PutOutcome::Copied)
            }
            (NodeKind::File, None) => Err(vdm_fsops::FsOpsError::InvalidInput {
                field: "template_path",
                reason: "missing",
                value: Some(instruction.destination.display().to_string()),
            }),
        }
    }

    fn fix_up(&self, path: &Path) {
        let Some(permissions) = &self.permissions else {
            return;
        };
        if let Err(error) = permissions.set_owner_group_permissions(&self.owner, path) {
            warn!(
                path = %path.display(),
                owner = %self.owner,
                error = %error,
                "permission fix-up failed"
            );
        }
    }
}
