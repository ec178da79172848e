//! # Workflow
//!
//! The expense lifecycle as pure functions:
//! `(record, action) -> Result<(record, outcome)>`.
//!
//! ```text
//! Proposed -> PartiallyApproved -> Finalized -> DuesOutstanding
//!          -> PaidPendingConfirm -> Settled
//! ```
//!
//! Nothing here touches storage. The [`crate::session::Session`] loads
//! records, applies these functions and writes the results back, and
//! [`crate::reconcile`] re-applies them to repair interrupted sequences.
//! Stages are derived from the stored flags, never stored themselves.

use crate::due::{Due, DueStage};
use crate::expense::Expense;
use crate::{DueId, Result, SpliitzError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// STAGES
// =============================================================================

/// Lifecycle stage of an expense, derived from the expense and its dues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStage {
    /// No member other than the proposer has approved yet.
    Proposed,
    /// Some, possibly all, members approved; not yet finalized.
    PartiallyApproved,
    /// Finalized but some dues have not been generated.
    Finalized,
    /// At least one due is unpaid.
    DuesOutstanding,
    /// Every due is paid, at least one awaits confirmation.
    PaidPendingConfirm,
    /// Every due is confirmed, or there were none to create.
    Settled,
}

impl fmt::Display for ExpenseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Proposed => "proposed",
            Self::PartiallyApproved => "partially approved",
            Self::Finalized => "finalized",
            Self::DuesOutstanding => "dues outstanding",
            Self::PaidPendingConfirm => "paid, pending confirmation",
            Self::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Derive the stage of `expense` given the dues stored for it.
///
/// `dues` may contain dues of other expenses; they are ignored.
#[must_use]
pub fn expense_stage(expense: &Expense, dues: &[Due]) -> ExpenseStage {
    if expense.proposal {
        let outside_approvals = expense
            .splits
            .iter()
            .filter(|s| s.approved && s.member != expense.proposed_by)
            .count();
        return if outside_approvals == 0 {
            ExpenseStage::Proposed
        } else {
            ExpenseStage::PartiallyApproved
        };
    }

    if expense.is_self_paid() {
        return ExpenseStage::Settled;
    }

    let own: Vec<&Due> = dues.iter().filter(|d| d.expense_id == expense.id).collect();
    let covered: BTreeSet<UserId> = own.iter().map(|d| d.debtor).collect();
    if expense.debtors().any(|s| !covered.contains(&s.member)) {
        return ExpenseStage::Finalized;
    }

    match own.iter().map(|d| due_stage(d)).min() {
        Some(DueStage::Outstanding) => ExpenseStage::DuesOutstanding,
        Some(DueStage::PaidPendingConfirm) => ExpenseStage::PaidPendingConfirm,
        Some(DueStage::Settled) | None => ExpenseStage::Settled,
    }
}

/// Stage of a single due.
#[must_use]
pub fn due_stage(due: &Due) -> DueStage {
    due.stage()
}

// =============================================================================
// APPROVAL AND FINALIZATION
// =============================================================================

/// What an approval changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// The share was approved; others are still pending.
    Recorded { pending: usize },
    /// The share was already approved and others are still pending.
    AlreadyApproved { pending: usize },
    /// Every share is approved; the expense should be finalized now.
    ReadyToFinalize,
}

/// Approve `user`'s share of a proposal.
///
/// Approving twice is a no-op. When the last share is approved the
/// outcome is `ReadyToFinalize`, also on a repeated approval, so a caller
/// retrying after a crash still reaches finalization.
pub fn approve_share(expense: &Expense, user: UserId) -> Result<(Expense, ApprovalOutcome)> {
    if !expense.proposal {
        return Err(SpliitzError::NotAProposal(expense.id));
    }

    let mut next = expense.clone();
    let split = next
        .splits
        .iter_mut()
        .find(|s| s.member == user)
        .ok_or(SpliitzError::NotSplitMember {
            expense: expense.id,
            user,
        })?;

    let was_approved = split.approved;
    split.approved = true;

    let pending = next.pending_approvals();
    let outcome = match (pending, was_approved) {
        (0, _) => ApprovalOutcome::ReadyToFinalize,
        (pending, true) => ApprovalOutcome::AlreadyApproved { pending },
        (pending, false) => ApprovalOutcome::Recorded { pending },
    };
    Ok((next, outcome))
}

/// Clear the proposal flag of a fully approved expense.
pub fn finalize(expense: &Expense) -> Result<Expense> {
    if !expense.proposal {
        return Err(SpliitzError::NotAProposal(expense.id));
    }
    let pending = expense.pending_approvals();
    if pending > 0 {
        return Err(SpliitzError::ApprovalsPending {
            expense: expense.id,
            pending,
        });
    }
    let mut next = expense.clone();
    next.proposal = false;
    Ok(next)
}

/// Build the dues a finalized expense is missing.
///
/// One due per member with a positive share who is not the payer. Members
/// already covered by a due in `existing` are skipped, so calling this
/// again after a partial write only fills the gaps.
pub fn dues_for<F>(expense: &Expense, existing: &[Due], mut next_id: F) -> Result<Vec<Due>>
where
    F: FnMut() -> Result<DueId>,
{
    if expense.proposal {
        return Err(SpliitzError::NotFinalized(expense.id));
    }

    let covered: BTreeSet<UserId> = existing
        .iter()
        .filter(|d| d.expense_id == expense.id)
        .map(|d| d.debtor)
        .collect();

    let mut created = Vec::new();
    for split in expense.debtors() {
        if covered.contains(&split.member) {
            continue;
        }
        created.push(Due {
            id: next_id()?,
            expense_id: expense.id,
            group_id: expense.group_id,
            debtor: split.member,
            creditor: expense.payer,
            amount: split.share,
            paid: false,
            received: false,
        });
    }
    Ok(created)
}

/// Whether `actor` may withdraw this proposal.
pub fn check_withdraw(expense: &Expense, actor: UserId) -> Result<()> {
    if !expense.proposal {
        return Err(SpliitzError::NotAProposal(expense.id));
    }
    if actor != expense.proposed_by {
        return Err(SpliitzError::Forbidden(format!(
            "only the proposer can withdraw {}",
            expense.id
        )));
    }
    Ok(())
}

// =============================================================================
// SETTLEMENT
// =============================================================================

/// Debtor marks the due as paid. Returns the new due and whether it changed.
pub fn mark_paid(due: &Due, actor: UserId) -> Result<(Due, bool)> {
    if actor != due.debtor {
        return Err(SpliitzError::Forbidden(format!(
            "{} does not owe {}",
            actor, due.id
        )));
    }
    if due.paid {
        return Ok((due.clone(), false));
    }
    let mut next = due.clone();
    next.paid = true;
    Ok((next, true))
}

/// Creditor confirms receipt. Requires the due to be paid first.
pub fn confirm_received(due: &Due, actor: UserId) -> Result<(Due, bool)> {
    if actor != due.creditor {
        return Err(SpliitzError::Forbidden(format!(
            "{} is not owed {}",
            actor, due.id
        )));
    }
    if !due.paid {
        return Err(SpliitzError::NotPaid(due.id));
    }
    if due.received {
        return Ok((due.clone(), false));
    }
    let mut next = due.clone();
    next.received = true;
    Ok((next, true))
}

// =============================================================================
// TESTS
// =============================================================================
