//! # Reconciliation
//!
//! Sweep that brings a ledger back to a consistent state after an
//! interrupted multi-step write. It is safe to run at any time and running
//! it twice in a row yields an empty second report.
//!
//! Passes, in order:
//!
//! 1. proposals whose shares are all approved are finalized
//! 2. finalized expenses get any missing dues
//! 3. dues marked received but not paid are marked paid

use crate::due::Due;
use crate::ledger::LedgerStore;
use crate::session::finalize_in;
use crate::{DueId, ExpenseId, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub finalized: Vec<ExpenseId>,
    pub dues_created: Vec<DueId>,
    pub dues_repaired: Vec<DueId>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty() && self.dues_created.is_empty() && self.dues_repaired.is_empty()
    }
}

/// Run every pass over `store`.
pub fn reconcile(store: &mut dyn LedgerStore) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for expense in store.expenses()? {
        let was_proposal = expense.proposal;
        if was_proposal && !expense.all_approved() {
            continue;
        }
        let (finalized, created) = finalize_in(store, &expense)?;
        if was_proposal {
            report.finalized.push(finalized.id);
        }
        report.dues_created.extend(created.iter().map(|d| d.id));
    }

    let repaired: Vec<Due> = store
        .dues()?
        .into_iter()
        .filter(|d| d.received && !d.paid)
        .map(|mut d| {
            d.paid = true;
            d
        })
        .collect();
    if !repaired.is_empty() {
        warn!(count = repaired.len(), "dues confirmed without payment, marking paid");
        store.put_dues(&repaired)?;
        report.dues_repaired = repaired.iter().map(|d| d.id).collect();
    }

    if report.is_empty() {
        info!("reconcile: ledger consistent");
    } else {
        info!(
            finalized = report.finalized.len(),
            dues_created = report.dues_created.len(),
            dues_repaired = report.dues_repaired.len(),
            "reconcile: repaired ledger"
        );
    }
    Ok(report)
}

// =============================================================================
// TESTS
// =============================================================================
