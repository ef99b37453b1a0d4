//! Working-set selection: which transfers a run provisions.

use std::fmt;

use tracing::warn;
use vdm_config::{CollectionSystemTransfer, ConfigGateway, TransferScope};

use crate::error::{EligibilityError, EligibilityResult};
use crate::report::SkipReason;

/// What the caller asked to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A single transfer addressed by name.
    Named(String),
    /// Every enabled transfer of a scope.
    Scope(TransferScope),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "transfer {name}"),
            Self::Scope(scope) => write!(f, "{scope} scope"),
        }
    }
}

/// Transfers to process plus those excluded up front.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    /// Transfers that will be provisioned.
    pub eligible: Vec<CollectionSystemTransfer>,
    /// Transfers discovered but excluded, with the reason.
    pub skipped: Vec<(CollectionSystemTransfer, SkipReason)>,
}

/// Build the working set for `selection`.
///
/// # Errors
///
/// An explicit name fails with [`EligibilityError::NotFound`],
/// [`EligibilityError::UnsupportedTransport`] or
/// [`EligibilityError::MissingLowering`]. A lowering scope fails with
/// [`EligibilityError::MissingLowering`] when no lowering is defined.
pub fn select_transfers(
    gateway: &dyn ConfigGateway,
    selection: &Selection,
) -> EligibilityResult<WorkingSet> {
    match selection {
        Selection::Named(name) => {
            let transfer = gateway
                .transfer_by_name(name)
                .ok_or_else(|| EligibilityError::NotFound { name: name.clone() })?;
            if !transfer.transfer_type.is_provisionable() {
                return Err(EligibilityError::UnsupportedTransport {
                    name: transfer.name.clone(),
                    transfer_type: transfer.transfer_type,
                });
            }
            if transfer.scope == TransferScope::Lowering && gateway.lowering_id().is_none() {
                return Err(EligibilityError::MissingLowering {
                    name: Some(transfer.name.clone()),
                });
            }
            Ok(WorkingSet {
                eligible: vec![transfer.clone()],
                skipped: Vec::new(),
            })
        }
        Selection::Scope(scope) => {
            if *scope == TransferScope::Lowering && gateway.lowering_id().is_none() {
                return Err(EligibilityError::MissingLowering { name: None });
            }
            let mut set = WorkingSet::default();
            for transfer in gateway.active_transfers(*scope) {
                if transfer.transfer_type.is_provisionable() {
                    set.eligible.push(transfer.clone());
                } else {
                    warn!(
                        transfer = %transfer.name,
                        transfer_type = %transfer.transfer_type,
                        "skipping transfer with unsupported transport"
                    );
                    set.skipped
                        .push((transfer.clone(), SkipReason::UnsupportedTransport));
                }
            }
            Ok(set)
        }
    }
}
