//! # Expenses
//!
//! An expense is stored once and carries its own approval state in the
//! `proposal` flag and per-split `approved` flags. The derived lifecycle
//! stage lives in [`crate::workflow`].

use crate::model::Group;
use crate::money::{self, Amount};
use crate::primitives::{MAX_DESCRIPTION_LEN, MAX_EXPENSE_CENTS};
use crate::{ExpenseId, GroupId, Result, SpliitzError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One member's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub member: UserId,
    pub share: Amount,
    pub approved: bool,
}

/// A shared expense, either still a proposal or finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub description: String,
    pub payer: UserId,
    pub proposed_by: UserId,
    pub total: Amount,
    pub splits: Vec<Split>,
    /// True until every share is approved and the expense is finalized.
    pub proposal: bool,
    /// Caller-supplied creation time, seconds since the Unix epoch.
    pub created_at: u64,
}

impl Expense {
    #[must_use]
    pub fn split_for(&self, user: UserId) -> Option<&Split> {
        self.splits.iter().find(|s| s.member == user)
    }

    /// Number of shares not yet approved.
    #[must_use]
    pub fn pending_approvals(&self) -> usize {
        self.splits.iter().filter(|s| !s.approved).count()
    }

    #[must_use]
    pub fn all_approved(&self) -> bool {
        self.pending_approvals() == 0
    }

    #[must_use]
    pub fn any_approved(&self) -> bool {
        self.splits.iter().any(|s| s.approved)
    }

    /// Members who owe the payer once the expense is finalized.
    pub fn debtors(&self) -> impl Iterator<Item = &Split> {
        self.splits
            .iter()
            .filter(move |s| s.member != self.payer && s.share.is_positive())
    }

    /// True when finalizing produces no dues at all.
    #[must_use]
    pub fn is_self_paid(&self) -> bool {
        self.debtors().next().is_none()
    }

    /// Whether `user` takes part in this expense as proposer, payer or
    /// split member.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.proposed_by == user || self.payer == user || self.split_for(user).is_some()
    }

    pub fn share_sum(&self) -> Result<Amount> {
        Amount::sum(self.splits.iter().map(|s| s.share))
    }
}

// =============================================================================
// DRAFTS
// =============================================================================

/// How the total is divided among members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitPlan {
    /// Equal shares; leftover cents go to the first members listed.
    Even(Vec<UserId>),
    /// Explicit per-member shares.
    Exact(Vec<(UserId, Amount)>),
}

impl SplitPlan {
    fn into_shares(self, total: Amount) -> Result<Vec<(UserId, Amount)>> {
        match self {
            SplitPlan::Even(members) => {
                let shares = money::split_evenly(total, members.len())?;
                Ok(members.into_iter().zip(shares).collect())
            }
            SplitPlan::Exact(shares) => Ok(shares),
        }
    }
}

/// A proposed expense before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub group_id: GroupId,
    pub description: String,
    pub payer: UserId,
    pub proposed_by: UserId,
    pub total: Amount,
    pub plan: SplitPlan,
}

impl ExpenseDraft {
    /// Validate the draft against its group and produce a stored proposal.
    ///
    /// The proposer's own share, if any, starts out approved.
    pub fn into_expense(self, id: ExpenseId, group: &Group, created_at: u64) -> Result<Expense> {
        let description = self.description.trim().to_string();
        if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
            return Err(SpliitzError::InvalidName(format!(
                "description length {} out of valid range 1..={}",
                description.len(),
                MAX_DESCRIPTION_LEN
            )));
        }
        if !self.total.is_positive() {
            return Err(SpliitzError::NonPositiveTotal);
        }
        if self.total.cents() > MAX_EXPENSE_CENTS {
            return Err(SpliitzError::InvalidAmount(format!(
                "{} exceeds the per-expense limit",
                self.total
            )));
        }

        group.require_member(self.payer)?;
        group.require_member(self.proposed_by)?;

        let shares = self.plan.into_shares(self.total)?;
        if shares.is_empty() {
            return Err(SpliitzError::NoSplits);
        }

        let mut seen = BTreeSet::new();
        for &(member, share) in &shares {
            group.require_member(member)?;
            if !seen.insert(member) {
                return Err(SpliitzError::DuplicateSplitMember(member));
            }
            if share.is_negative() {
                return Err(SpliitzError::NegativeShare(member));
            }
        }

        let sum = Amount::sum(shares.iter().map(|&(_, share)| share))?;
        if sum != self.total {
            return Err(SpliitzError::SharesMismatch {
                total: self.total,
                sum,
            });
        }

        let splits = shares
            .into_iter()
            .map(|(member, share)| Split {
                member,
                share,
                approved: member == self.proposed_by,
            })
            .collect();

        Ok(Expense {
            id,
            group_id: group.id,
            description,
            payer: self.payer,
            proposed_by: self.proposed_by,
            total: self.total,
            splits,
            proposal: true,
            created_at,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        let mut group = Group::new(GroupId(1), "Flat", UserId(1));
        let _ = group.add_member(UserId(2));
        let _ = group.add_member(UserId(3));
        group
    }

    fn draft(plan: SplitPlan, total: i64) -> ExpenseDraft {
        ExpenseDraft {
            group_id: GroupId(1),
            description: "Groceries".to_string(),
            payer: UserId(1),
            proposed_by: UserId(1),
            total: Amount::from_cents(total),
            plan,
        }
    }

    #[test]
    fn even_split_approves_proposer_only() {
        let plan = SplitPlan::Even(vec![UserId(1), UserId(2), UserId(3)]);
        let expense = draft(plan, 1000)
            .into_expense(ExpenseId(1), &group(), 0)
            .expect("valid draft");

        assert!(expense.proposal);
        assert_eq!(expense.pending_approvals(), 2);
        assert_eq!(expense.split_for(UserId(1)).map(|s| s.approved), Some(true));
        assert_eq!(expense.share_sum(), Ok(Amount::from_cents(1000)));
    }

    #[test]
    fn mismatched_exact_shares_rejected() {
        let plan = SplitPlan::Exact(vec![
            (UserId(1), Amount::from_cents(500)),
            (UserId(2), Amount::from_cents(400)),
        ]);
        let result = draft(plan, 1000).into_expense(ExpenseId(1), &group(), 0);
        assert_eq!(
            result,
            Err(SpliitzError::SharesMismatch {
                total: Amount::from_cents(1000),
                sum: Amount::from_cents(900),
            })
        );
    }

    #[test]
    fn outsider_in_split_rejected() {
        let plan = SplitPlan::Even(vec![UserId(1), UserId(99)]);
        let result = draft(plan, 1000).into_expense(ExpenseId(1), &group(), 0);
        assert!(matches!(
            result,
            Err(SpliitzError::NotGroupMember { user: UserId(99), .. })
        ));
    }

    #[test]
    fn duplicate_member_rejected() {
        let plan = SplitPlan::Exact(vec![
            (UserId(2), Amount::from_cents(500)),
            (UserId(2), Amount::from_cents(500)),
        ]);
        let result = draft(plan, 1000).into_expense(ExpenseId(1), &group(), 0);
        assert_eq!(result, Err(SpliitzError::DuplicateSplitMember(UserId(2))));
    }

    #[test]
    fn negative_share_rejected() {
        let plan = SplitPlan::Exact(vec![
            (UserId(1), Amount::from_cents(1100)),
            (UserId(2), Amount::from_cents(-100)),
        ]);
        let result = draft(plan, 1000).into_expense(ExpenseId(1), &group(), 0);
        assert_eq!(result, Err(SpliitzError::NegativeShare(UserId(2))));
    }

    #[test]
    fn zero_total_rejected() {
        let plan = SplitPlan::Even(vec![UserId(1)]);
        let result = draft(plan, 0).into_expense(ExpenseId(1), &group(), 0);
        assert_eq!(result, Err(SpliitzError::NonPositiveTotal));
    }

    #[test]
    fn payer_only_split_is_self_paid() {
        let plan = SplitPlan::Exact(vec![
            (UserId(1), Amount::from_cents(1000)),
            (UserId(2), Amount::ZERO),
        ]);
        let expense = draft(plan, 1000)
            .into_expense(ExpenseId(1), &group(), 0)
            .expect("valid draft");
        assert!(expense.is_self_paid());
    }
}
