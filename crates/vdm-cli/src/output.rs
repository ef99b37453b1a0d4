//! Output renderers and formatting helpers for CLI commands.
//!
//! Renderers return the text to print so dispatch stays testable; `cli.rs`
//! writes it to stdout. Logs go to stderr.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::anyhow;
use serde::Serialize;
use vdm_app::{
    PlannedTransfer, Progress, ProvisionPlan, ProvisionReport, SkipReason, TransferOutcome,
};
use vdm_config::TransferType;
use vdm_fsops::{FsOpsError, NodeKind, ProvisioningInstruction};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

#[derive(Debug, Serialize)]
struct ReportView<'a> {
    transfers: Vec<TransferView<'a>>,
    aborted: usize,
    skipped: usize,
    soft_failures: usize,
}

#[derive(Debug, Serialize)]
struct TransferView<'a> {
    name: &'a str,
    transfer_type: TransferType,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureView>,
}

#[derive(Debug, Serialize)]
struct FailureView {
    destination: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct PlanView<'a> {
    transfers: Vec<PlanEntryView<'a>>,
}

#[derive(Debug, Serialize)]
struct PlanEntryView<'a> {
    name: &'a str,
    transfer_type: TransferType,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    instructions: Vec<InstructionView>,
}

#[derive(Debug, Serialize)]
struct InstructionView {
    kind: &'static str,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
}

pub(crate) fn render_provision_report(
    report: &ProvisionReport,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&report_view(report)),
        OutputFormat::Text => Ok(report_text(report)),
    }
}

pub(crate) fn render_plan(plan: &ProvisionPlan, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&plan_view(plan)),
        OutputFormat::Text => Ok(plan_text(plan)),
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn report_view(report: &ProvisionReport) -> ReportView<'_> {
    let transfers = report
        .transfers
        .iter()
        .map(|transfer| {
            let mut view = TransferView {
                name: &transfer.name,
                transfer_type: transfer.transfer_type,
                outcome: transfer.outcome.label(),
                reason: None,
                progress: None,
                error: None,
                failures: Vec::new(),
            };
            match &transfer.outcome {
                TransferOutcome::Skipped(reason) => view.reason = Some(*reason),
                TransferOutcome::Completed {
                    progress,
                    soft_failures,
                } => {
                    view.progress = Some(*progress);
                    view.failures = soft_failures
                        .iter()
                        .map(|failure| FailureView {
                            destination: display_path(&failure.destination),
                            error: describe_error(&failure.error),
                        })
                        .collect();
                }
                TransferOutcome::Aborted { error, progress } => {
                    view.progress = Some(*progress);
                    view.error = Some(describe_error(error));
                }
                TransferOutcome::WorkerFailed { detail } => view.error = Some(detail.clone()),
            }
            view
        })
        .collect();
    ReportView {
        transfers,
        aborted: report.aborted(),
        skipped: report.skipped(),
        soft_failures: report.soft_failures(),
    }
}

fn report_text(report: &ProvisionReport) -> String {
    let mut out = String::new();
    for transfer in &report.transfers {
        let _ = write!(out, "{} ({}): ", transfer.name, transfer.transfer_type);
        match &transfer.outcome {
            TransferOutcome::Skipped(reason) => {
                let _ = writeln!(out, "skipped ({})", skip_label(*reason));
            }
            TransferOutcome::Completed {
                progress,
                soft_failures,
            } => {
                let _ = write!(out, "completed, {}", progress_text(progress));
                if soft_failures.is_empty() {
                    out.push('\n');
                } else {
                    let _ = writeln!(out, ", {} failed", soft_failures.len());
                    for failure in soft_failures {
                        let _ = writeln!(
                            out,
                            "  ! {}: {}",
                            display_path(&failure.destination),
                            describe_error(&failure.error)
                        );
                    }
                }
            }
            TransferOutcome::Aborted { error, progress } => {
                let _ = writeln!(
                    out,
                    "aborted after {}: {}",
                    progress_text(progress),
                    describe_error(error)
                );
            }
            TransferOutcome::WorkerFailed { detail } => {
                let _ = writeln!(out, "worker failed: {detail}");
            }
        }
    }
    let _ = writeln!(
        out,
        "summary: {} transfers, {} aborted, {} skipped, {} soft failures",
        report.transfers.len(),
        report.aborted(),
        report.skipped(),
        report.soft_failures()
    );
    out
}

fn progress_text(progress: &Progress) -> String {
    format!(
        "{} directories ({} new), {} files ({} new)",
        progress.directories(),
        progress.directories_created,
        progress.files(),
        progress.files_copied
    )
}

fn plan_view(plan: &ProvisionPlan) -> PlanView<'_> {
    let transfers = plan
        .transfers
        .iter()
        .map(|transfer| {
            let mut view = PlanEntryView {
                name: &transfer.name,
                transfer_type: transfer.transfer_type,
                status: plan_status(&transfer.plan),
                reason: None,
                source_dir: None,
                error: None,
                instructions: Vec::new(),
            };
            match &transfer.plan {
                PlannedTransfer::Skipped(reason) => view.reason = Some(*reason),
                PlannedTransfer::Planned {
                    source_dir,
                    instructions,
                } => {
                    view.source_dir = Some(display_path(source_dir));
                    view.instructions = instructions.iter().map(instruction_view).collect();
                }
                PlannedTransfer::Invalid { error } => view.error = Some(describe_error(error)),
            }
            view
        })
        .collect();
    PlanView { transfers }
}

fn instruction_view(instruction: &ProvisioningInstruction) -> InstructionView {
    InstructionView {
        kind: node_label(instruction.kind),
        destination: display_path(&instruction.destination),
        template: instruction.template_path.as_deref().map(display_path),
    }
}

fn plan_text(plan: &ProvisionPlan) -> String {
    let mut out = String::new();
    for transfer in &plan.transfers {
        let _ = write!(out, "{} ({})", transfer.name, transfer.transfer_type);
        match &transfer.plan {
            PlannedTransfer::Skipped(reason) => {
                let _ = writeln!(out, ": skipped ({})", skip_label(*reason));
            }
            PlannedTransfer::Invalid { error } => {
                let _ = writeln!(out, ": invalid: {}", describe_error(error));
            }
            PlannedTransfer::Planned {
                source_dir,
                instructions,
            } => {
                let _ = writeln!(out, " -> {}", source_dir.display());
                for instruction in instructions {
                    let _ = write!(
                        out,
                        "  {:<4} {}",
                        node_label(instruction.kind),
                        instruction.destination.display()
                    );
                    if let Some(template) = &instruction.template_path {
                        let _ = write!(out, " <- {}", template.display());
                    }
                    out.push('\n');
                }
            }
        }
    }
    out
}

const fn plan_status(plan: &PlannedTransfer) -> &'static str {
    match plan {
        PlannedTransfer::Skipped(_) => "skipped",
        PlannedTransfer::Planned { .. } => "planned",
        PlannedTransfer::Invalid { .. } => "invalid",
    }
}

const fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoTemplate => "no template",
        SkipReason::UnsupportedTransport => "unsupported transport",
    }
}

const fn node_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Directory => "dir",
        NodeKind::File => "file",
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

/// One-line description of a filesystem or transport error, with its context.
pub(crate) fn describe_error(error: &FsOpsError) -> String {
    match error {
        FsOpsError::Io {
            operation,
            path,
            source,
        } => format!("{error} ({operation} {}): {source}", path.display()),
        FsOpsError::Walkdir {
            operation,
            path,
            source,
        } => format!("{error} ({operation} {}): {source}", path.display()),
        FsOpsError::InvalidInput {
            field,
            reason,
            value,
        } => value.as_deref().map_or_else(
            || format!("{error}: {field} {reason}"),
            |value| format!("{error}: {field} {reason} ({value})"),
        ),
        FsOpsError::UnresolvedPlaceholder {
            placeholder,
            pattern,
        } => format!("{error}: {placeholder} in {pattern}"),
        FsOpsError::RemoteTransport {
            operation,
            path,
            status,
            detail,
        } => {
            let status = status.map_or_else(|| "killed".to_string(), |code| code.to_string());
            format!(
                "{error} ({operation} {}, status {status}): {}",
                path.display(),
                detail.trim()
            )
        }
        FsOpsError::CommandSpawn { program, source } => format!("{error} ({program}): {source}"),
        FsOpsError::CommandTimeout { program, timeout } => {
            format!("{error} ({program} after {}s)", timeout.as_secs())
        }
        FsOpsError::UserLookup { user, source } => format!("{error} ({user}): {source}"),
        FsOpsError::Nix {
            operation,
            path,
            source,
        } => format!("{error} ({operation} {}): {source}", path.display()),
        FsOpsError::Unsupported { operation, value } => value.as_deref().map_or_else(
            || format!("{error}: {operation}"),
            |value| format!("{error}: {operation} ({value})"),
        ),
    }
}
