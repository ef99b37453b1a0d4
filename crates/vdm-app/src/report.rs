//! Per-transfer outcomes collected by a provisioning run.

use std::path::PathBuf;

use serde::Serialize;
use vdm_config::TransferType;
use vdm_fsops::{DirOutcome, FsOpsError, ProvisioningInstruction, PutOutcome};

/// Why a transfer was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The template root has no subtree for the collection system.
    NoTemplate,
    /// The transfer uses a transport with no adapter.
    UnsupportedTransport,
}

/// Counts of instructions applied to a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Directories created by this run.
    pub directories_created: usize,
    /// Directories that already existed.
    pub directories_present: usize,
    /// Files copied by this run.
    pub files_copied: usize,
    /// Files that already existed and were left untouched.
    pub files_present: usize,
}

impl Progress {
    /// Directory instructions applied, created or already present.
    #[must_use]
    pub const fn directories(&self) -> usize {
        self.directories_created + self.directories_present
    }

    /// File instructions applied, copied or already present.
    #[must_use]
    pub const fn files(&self) -> usize {
        self.files_copied + self.files_present
    }

    pub(crate) const fn record_directory(&mut self, outcome: DirOutcome) {
        match outcome {
            DirOutcome::Created => self.directories_created += 1,
            DirOutcome::AlreadyPresent => self.directories_present += 1,
        }
    }

    pub(crate) const fn record_file(&mut self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Copied => self.files_copied += 1,
            PutOutcome::AlreadyPresent => self.files_present += 1,
        }
    }
}

/// A single instruction that failed without stopping its transfer.
#[derive(Debug)]
pub struct InstructionFailure {
    /// Destination the instruction targeted.
    pub destination: PathBuf,
    /// Error reported by the transport.
    pub error: FsOpsError,
}

/// Terminal state of one transfer.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// Every instruction was dispatched.
    Completed {
        /// Applied instruction counts.
        progress: Progress,
        /// Isolated per-instruction failures.
        soft_failures: Vec<InstructionFailure>,
    },
    /// A hard failure stopped the transfer; earlier work is left in place.
    Aborted {
        /// Failure that stopped the transfer.
        error: FsOpsError,
        /// Counts applied before the failure.
        progress: Progress,
    },
    /// The transfer's worker panicked or was cancelled.
    WorkerFailed {
        /// Join failure as reported by the runtime.
        detail: String,
    },
}

impl TransferOutcome {
    /// Short label for logs and summaries.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Completed { .. } => "completed",
            Self::Aborted { .. } => "aborted",
            Self::WorkerFailed { .. } => "worker_failed",
        }
    }
}

/// Outcome of one transfer in a run.
#[derive(Debug)]
pub struct TransferReport {
    /// Transfer name.
    pub name: String,
    /// Transport used.
    pub transfer_type: TransferType,
    /// Terminal state.
    pub outcome: TransferOutcome,
}

/// Every transfer outcome of one provisioning run.
///
/// Processed transfers come first in configuration order, followed by the
/// skipped ones in configuration order.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Per-transfer reports.
    pub transfers: Vec<TransferReport>,
}

impl ProvisionReport {
    /// Number of transfers that ended in `Aborted` or `WorkerFailed`.
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                TransferOutcome::Aborted { .. } | TransferOutcome::WorkerFailed { .. }
            )
        })
    }

    /// Number of transfers that ended in `Skipped`.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, TransferOutcome::Skipped(_)))
    }

    /// Total isolated instruction failures across all transfers.
    #[must_use]
    pub fn soft_failures(&self) -> usize {
        self.transfers
            .iter()
            .map(|report| match &report.outcome {
                TransferOutcome::Completed { soft_failures, .. } => soft_failures.len(),
                _ => 0,
            })
            .sum()
    }

    /// Look up the report for a transfer by name.
    #[must_use]
    pub fn transfer(&self, name: &str) -> Option<&TransferReport> {
        self.transfers.iter().find(|report| report.name == name)
    }

    fn count(&self, predicate: impl Fn(&TransferOutcome) -> bool) -> usize {
        self.transfers
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}

/// What a transfer would receive, computed without side effects.
#[derive(Debug)]
pub enum PlannedTransfer {
    /// Nothing would be attempted.
    Skipped(SkipReason),
    /// Instructions in dispatch order, relative to `source_dir`.
    Planned {
        /// Resolved source directory.
        source_dir: PathBuf,
        /// Ordered instructions.
        instructions: Vec<ProvisioningInstruction>,
    },
    /// Planning failed for this transfer.
    Invalid {
        /// Failure encountered while resolving or walking.
        error: FsOpsError,
    },
}

/// Planned work for one transfer.
#[derive(Debug)]
pub struct TransferPlan {
    /// Transfer name.
    pub name: String,
    /// Transport that would be used.
    pub transfer_type: TransferType,
    /// Planned work.
    pub plan: PlannedTransfer,
}

/// Dry-run result for a selection.
#[derive(Debug, Default)]
pub struct ProvisionPlan {
    /// Per-transfer plans: planned transfers in configuration order, then
    /// skipped ones in configuration order.
    pub transfers: Vec<TransferPlan>,
}
