#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Provisioning run wiring.
//!
//! Layout: `bootstrap.rs` (settings source to provisioner), `eligibility.rs`
//! (working-set selection), `orchestrator.rs` (per-transfer dispatch),
//! `report.rs` (outcomes and plans).

/// Production wiring.
pub mod bootstrap;
/// Working-set selection.
pub mod eligibility;
pub mod error;
/// Transfer orchestration.
pub mod orchestrator;
pub mod report;

pub use bootstrap::{RuntimeSettings, bootstrap};
pub use eligibility::{Selection, WorkingSet, select_transfers};
pub use error::{AppError, AppResult, EligibilityError, EligibilityResult};
pub use orchestrator::{
    AdapterFactory, DEFAULT_TEMPLATE_ROOT, DefaultAdapters, ProvisionOptions, Provisioner,
};
pub use report::{
    InstructionFailure, PlannedTransfer, Progress, ProvisionPlan, ProvisionReport, SkipReason,
    TransferOutcome, TransferPlan, TransferReport,
};
