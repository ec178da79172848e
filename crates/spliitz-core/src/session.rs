//! # Session
//!
//! The operations clients call. A `Session` owns one ledger backend and
//! runs each request as: load records, apply a [`crate::workflow`]
//! function, write the result back.
//!
//! Multi-step sequences (approve, then finalize, then write dues) are
//! written in that order so that an interruption leaves a state the
//! [`crate::reconcile`] sweep can finish.

use crate::balance::{self, Balance, GroupSummary, PairwiseDebt};
use crate::due::Due;
use crate::expense::{Expense, ExpenseDraft};
use crate::formats::LedgerSnapshot;
use crate::ledger::{IdKind, Ledger, LedgerCounts, LedgerStore};
use crate::model::{Group, User};
use crate::primitives::validate_name;
use crate::reconcile::{self, ReconcileReport};
use crate::storage::RedbLedger;
use crate::workflow::{self, ApprovalOutcome, ExpenseStage};
use crate::{DueId, ExpenseId, GroupId, Result, SpliitzError, UserId};
use std::path::Path;
use tracing::{debug, info};

/// A ledger plus the rules for changing it.
pub struct Session {
    store: Box<dyn LedgerStore + Send + Sync>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session over an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Ledger::new())
    }

    /// Session over any backend.
    pub fn with_store(store: impl LedgerStore + Send + Sync + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Session over a redb file, created if missing.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_store(RedbLedger::open(path)?))
    }

    #[must_use]
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.store.snapshot()
    }

    pub fn counts(&self) -> Result<LedgerCounts> {
        self.store.counts()
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub fn create_user(&mut self, name: &str) -> Result<User> {
        let name = validate_name(name)?;
        let id = UserId(self.store.next_id(IdKind::User)?);
        let user = User { id, name };
        self.store.put_user(user.clone())?;
        info!(user = %id, "user created");
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        self.store.get_user(id)?.ok_or(SpliitzError::UserNotFound(id))
    }

    pub fn users(&self) -> Result<Vec<User>> {
        self.store.users()
    }

    // =========================================================================
    // GROUPS
    // =========================================================================

    pub fn create_group(&mut self, name: &str, created_by: UserId) -> Result<Group> {
        let name = validate_name(name)?;
        self.user(created_by)?;
        let id = GroupId(self.store.next_id(IdKind::Group)?);
        let group = Group::new(id, name, created_by);
        self.store.put_group(group.clone())?;
        info!(group = %id, creator = %created_by, "group created");
        Ok(group)
    }

    pub fn group(&self, id: GroupId) -> Result<Group> {
        self.store.get_group(id)?.ok_or(SpliitzError::GroupNotFound(id))
    }

    /// Groups `user` belongs to.
    pub fn groups_for(&self, user: UserId) -> Result<Vec<Group>> {
        Ok(self
            .store
            .groups()?
            .into_iter()
            .filter(|g| g.is_member(user))
            .collect())
    }

    /// An existing member adds another registered user.
    pub fn add_member(&mut self, group_id: GroupId, actor: UserId, user: UserId) -> Result<Group> {
        let mut group = self.group(group_id)?;
        group.require_member(actor)?;
        self.user(user)?;
        group.add_member(user)?;
        self.store.put_group(group.clone())?;
        info!(group = %group_id, member = %user, "member added");
        Ok(group)
    }

    /// A member leaves, or the creator removes them. The creator stays.
    ///
    /// Refused while the member proposed or takes part in an open
    /// proposal, or has an unsettled due in the group.
    pub fn remove_member(
        &mut self,
        group_id: GroupId,
        actor: UserId,
        user: UserId,
    ) -> Result<Group> {
        let mut group = self.group(group_id)?;
        group.require_member(actor)?;
        if actor != user && actor != group.created_by {
            return Err(SpliitzError::Forbidden(format!(
                "{} cannot remove {} from {}",
                actor, user, group_id
            )));
        }
        group.remove_member(user)?;

        let open_proposal = self
            .store
            .expenses_in_group(group_id)?
            .iter()
            .any(|e| e.proposal && e.involves(user));
        let open_due = self
            .store
            .dues_in_group(group_id)?
            .iter()
            .any(|d| d.is_open() && d.involves(user));
        if open_proposal || open_due {
            return Err(SpliitzError::MemberBusy {
                group: group_id,
                user,
            });
        }

        self.store.put_group(group.clone())?;
        info!(group = %group_id, member = %user, "member removed");
        Ok(group)
    }

    // =========================================================================
    // EXPENSES
    // =========================================================================

    /// Store a new proposal.
    ///
    /// When the proposer is the only split member the proposal is already
    /// fully approved and is finalized straight away.
    pub fn propose_expense(&mut self, draft: ExpenseDraft, created_at: u64) -> Result<Expense> {
        let group = self.group(draft.group_id)?;
        self.user(draft.proposed_by)?;

        let id = ExpenseId(self.store.next_id(IdKind::Expense)?);
        let expense = draft.into_expense(id, &group, created_at)?;
        self.store.put_expense(expense.clone())?;
        info!(
            expense = %id,
            group = %group.id,
            total = %expense.total,
            pending = expense.pending_approvals(),
            "expense proposed"
        );

        if expense.all_approved() {
            let (finalized, _) = finalize_in(self.store.as_mut(), &expense)?;
            return Ok(finalized);
        }
        Ok(expense)
    }

    pub fn expense(&self, id: ExpenseId) -> Result<Expense> {
        self.store
            .get_expense(id)?
            .ok_or(SpliitzError::ExpenseNotFound(id))
    }

    pub fn expenses_in_group(&self, group: GroupId) -> Result<Vec<Expense>> {
        self.group(group)?;
        self.store.expenses_in_group(group)
    }

    pub fn expense_stage(&self, id: ExpenseId) -> Result<ExpenseStage> {
        let expense = self.expense(id)?;
        let dues = self.store.dues_for_expense(id)?;
        Ok(workflow::expense_stage(&expense, &dues))
    }

    /// A split member approves their share. The last approval finalizes
    /// the expense and generates its dues.
    pub fn approve_share(
        &mut self,
        id: ExpenseId,
        user: UserId,
    ) -> Result<(Expense, ApprovalOutcome)> {
        let expense = self.expense(id)?;
        let (approved, outcome) = workflow::approve_share(&expense, user)?;

        if approved != expense {
            self.store.put_expense(approved.clone())?;
        }
        debug!(expense = %id, user = %user, ?outcome, "share approved");

        if outcome == ApprovalOutcome::ReadyToFinalize {
            let (finalized, _) = finalize_in(self.store.as_mut(), &approved)?;
            return Ok((finalized, outcome));
        }
        Ok((approved, outcome))
    }

    /// Finalize a fully approved proposal, or fill in missing dues of an
    /// already finalized expense. Returns the dues created by this call.
    pub fn finalize_expense(&mut self, id: ExpenseId) -> Result<(Expense, Vec<Due>)> {
        let expense = self.expense(id)?;
        finalize_in(self.store.as_mut(), &expense)
    }

    /// The proposer withdraws a proposal that is not yet finalized.
    pub fn withdraw_proposal(&mut self, id: ExpenseId, actor: UserId) -> Result<Expense> {
        let expense = self.expense(id)?;
        self.group(expense.group_id)?.require_member(actor)?;
        workflow::check_withdraw(&expense, actor)?;
        let removed = self
            .store
            .delete_expense(id)?
            .ok_or(SpliitzError::ExpenseNotFound(id))?;
        info!(expense = %id, "proposal withdrawn");
        Ok(removed)
    }

    // =========================================================================
    // DUES
    // =========================================================================

    pub fn due(&self, id: DueId) -> Result<Due> {
        self.store.get_due(id)?.ok_or(SpliitzError::DueNotFound(id))
    }

    pub fn dues_in_group(&self, group: GroupId) -> Result<Vec<Due>> {
        self.group(group)?;
        self.store.dues_in_group(group)
    }

    pub fn dues_for_expense(&self, id: ExpenseId) -> Result<Vec<Due>> {
        self.expense(id)?;
        self.store.dues_for_expense(id)
    }

    /// Dues where `user` is debtor or creditor, across all groups.
    pub fn dues_for_user(&self, user: UserId) -> Result<Vec<Due>> {
        Ok(self
            .store
            .dues()?
            .into_iter()
            .filter(|d| d.involves(user))
            .collect())
    }

    /// The debtor reports the payment as sent.
    pub fn mark_paid(&mut self, id: DueId, actor: UserId) -> Result<Due> {
        let due = self.due(id)?;
        let (next, changed) = workflow::mark_paid(&due, actor)?;
        if changed {
            self.store.put_due(next.clone())?;
            info!(due = %id, debtor = %actor, amount = %next.amount, "due marked paid");
        }
        Ok(next)
    }

    /// The creditor confirms the payment arrived.
    pub fn confirm_received(&mut self, id: DueId, actor: UserId) -> Result<Due> {
        let due = self.due(id)?;
        let (next, changed) = workflow::confirm_received(&due, actor)?;
        if changed {
            self.store.put_due(next.clone())?;
            info!(due = %id, creditor = %actor, "due settled");
        }
        Ok(next)
    }

    // =========================================================================
    // VIEWS AND MAINTENANCE
    // =========================================================================

    pub fn balances(&self, group: GroupId) -> Result<Vec<Balance>> {
        let group = self.group(group)?;
        balance::group_balances(&group, &self.store.dues_in_group(group.id)?)
    }

    pub fn pairwise(&self, group: GroupId) -> Result<Vec<PairwiseDebt>> {
        self.group(group)?;
        balance::pairwise(group, &self.store.dues_in_group(group)?)
    }

    pub fn summary(&self, group: GroupId) -> Result<GroupSummary> {
        let group = self.group(group)?;
        let expenses = self.store.expenses_in_group(group.id)?;
        let dues = self.store.dues_in_group(group.id)?;
        balance::group_summary(&group, &expenses, &dues)
    }

    /// Run the reconciliation sweep over the whole ledger.
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        reconcile::reconcile(self.store.as_mut())
    }

    /// Direct access to the backend, for maintenance tooling and tests.
    pub fn store_mut(&mut self) -> &mut dyn LedgerStore {
        self.store.as_mut()
    }
}

/// Finalize `expense` if it is still a proposal, then write whichever of
/// its dues are missing.
///
/// The expense is written before the dues. If the process stops in
/// between, the finalized expense without dues is picked up by the
/// reconciliation sweep.
pub(crate) fn finalize_in(
    store: &mut dyn LedgerStore,
    expense: &Expense,
) -> Result<(Expense, Vec<Due>)> {
    let finalized = if expense.proposal {
        let finalized = workflow::finalize(expense)?;
        store.put_expense(finalized.clone())?;
        info!(expense = %finalized.id, "expense finalized");
        finalized
    } else {
        expense.clone()
    };

    let existing = store.dues_for_expense(finalized.id)?;
    let created = workflow::dues_for(&finalized, &existing, || {
        store.next_id(IdKind::Due).map(DueId)
    })?;
    if !created.is_empty() {
        store.put_dues(&created)?;
        info!(expense = %finalized.id, count = created.len(), "dues created");
    }
    Ok((finalized, created))
}

// =============================================================================
// TESTS
// =============================================================================
