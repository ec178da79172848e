//! # Balances
//!
//! Derived views over a group's dues. A due counts as outstanding until
//! the creditor confirms receipt; a paid-but-unconfirmed due still shows
//! up here.

use crate::due::Due;
use crate::expense::Expense;
use crate::model::Group;
use crate::money::Amount;
use crate::{GroupId, Result, SpliitzError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Net position of one member. Positive means the member is owed money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user: UserId,
    pub net: Amount,
}

/// Outstanding amount one member owes another after netting both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairwiseDebt {
    pub debtor: UserId,
    pub creditor: UserId,
    pub amount: Amount,
}

/// Total a member has paid for finalized expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTotal {
    pub user: UserId,
    pub paid: Amount,
}

/// Headline numbers for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: GroupId,
    pub member_count: usize,
    pub total_spent: Amount,
    pub paid_by: Vec<MemberTotal>,
    pub open_proposals: usize,
    pub unsettled_dues: usize,
    pub outstanding: Amount,
}

fn add(map: &mut BTreeMap<UserId, Amount>, user: UserId, amount: Amount) -> Result<()> {
    let entry = map.entry(user).or_insert(Amount::ZERO);
    *entry = entry.checked_add(amount).ok_or(SpliitzError::Overflow)?;
    Ok(())
}

/// Net balance for every member of `group`, plus anyone else still party
/// to an open due. Ordered by user id; the nets sum to zero.
pub fn group_balances(group: &Group, dues: &[Due]) -> Result<Vec<Balance>> {
    let mut nets: BTreeMap<UserId, Amount> =
        group.members.iter().map(|&m| (m, Amount::ZERO)).collect();

    for due in dues.iter().filter(|d| d.group_id == group.id && d.is_open()) {
        let owed = due.amount.checked_neg().ok_or(SpliitzError::Overflow)?;
        add(&mut nets, due.creditor, due.amount)?;
        add(&mut nets, due.debtor, owed)?;
    }

    Ok(nets
        .into_iter()
        .map(|(user, net)| Balance { user, net })
        .collect())
}

/// Outstanding debts between pairs of members, netted in both directions.
pub fn pairwise(group_id: GroupId, dues: &[Due]) -> Result<Vec<PairwiseDebt>> {
    // keyed by (low, high); positive means low owes high
    let mut pairs: BTreeMap<(UserId, UserId), Amount> = BTreeMap::new();

    for due in dues.iter().filter(|d| d.group_id == group_id && d.is_open()) {
        let (key, signed) = if due.debtor < due.creditor {
            ((due.debtor, due.creditor), due.amount)
        } else {
            let neg = due.amount.checked_neg().ok_or(SpliitzError::Overflow)?;
            ((due.creditor, due.debtor), neg)
        };
        let entry = pairs.entry(key).or_insert(Amount::ZERO);
        *entry = entry.checked_add(signed).ok_or(SpliitzError::Overflow)?;
    }

    let mut out = Vec::new();
    for ((low, high), amount) in pairs {
        if amount.is_positive() {
            out.push(PairwiseDebt {
                debtor: low,
                creditor: high,
                amount,
            });
        } else if amount.is_negative() {
            out.push(PairwiseDebt {
                debtor: high,
                creditor: low,
                amount: amount.checked_neg().ok_or(SpliitzError::Overflow)?,
            });
        }
    }
    Ok(out)
}

/// Spend totals and open work for a group.
pub fn group_summary(group: &Group, expenses: &[Expense], dues: &[Due]) -> Result<GroupSummary> {
    let mut paid_by: BTreeMap<UserId, Amount> = BTreeMap::new();
    let mut total_spent = Amount::ZERO;
    let mut open_proposals = 0;

    for expense in expenses.iter().filter(|e| e.group_id == group.id) {
        if expense.proposal {
            open_proposals += 1;
            continue;
        }
        total_spent = total_spent
            .checked_add(expense.total)
            .ok_or(SpliitzError::Overflow)?;
        add(&mut paid_by, expense.payer, expense.total)?;
    }

    let open: Vec<&Due> = dues
        .iter()
        .filter(|d| d.group_id == group.id && d.is_open())
        .collect();

    Ok(GroupSummary {
        group_id: group.id,
        member_count: group.members.len(),
        total_spent,
        paid_by: paid_by
            .into_iter()
            .map(|(user, paid)| MemberTotal { user, paid })
            .collect(),
        open_proposals,
        unsettled_dues: open.len(),
        outstanding: Amount::sum(open.iter().map(|d| d.amount))?,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DueId, ExpenseId};

    fn group() -> Group {
        let mut g = Group::new(GroupId(1), "Flat", UserId(1));
        let _ = g.add_member(UserId(2));
        let _ = g.add_member(UserId(3));
        g
    }

    fn due(id: u64, debtor: u64, creditor: u64, cents: i64, received: bool) -> Due {
        Due {
            id: DueId(id),
            expense_id: ExpenseId(id),
            group_id: GroupId(1),
            debtor: UserId(debtor),
            creditor: UserId(creditor),
            amount: Amount::from_cents(cents),
            paid: received,
            received,
        }
    }

    #[test]
    fn balances_sum_to_zero() {
        let dues = vec![
            due(1, 2, 1, 300, false),
            due(2, 3, 1, 300, false),
            due(3, 1, 2, 100, false),
        ];
        let balances = group_balances(&group(), &dues).expect("balances");
        let total = Amount::sum(balances.iter().map(|b| b.net));
        assert_eq!(total, Ok(Amount::ZERO));
        assert_eq!(
            balances[0],
            Balance {
                user: UserId(1),
                net: Amount::from_cents(500)
            }
        );
    }

    #[test]
    fn received_dues_are_ignored() {
        let dues = vec![due(1, 2, 1, 300, true)];
        let balances = group_balances(&group(), &dues).expect("balances");
        assert!(balances.iter().all(|b| b.net.is_zero()));
    }

    #[test]
    fn pairwise_nets_opposite_debts() {
        let dues = vec![due(1, 2, 1, 300, false), due(2, 1, 2, 100, false)];
        let debts = pairwise(GroupId(1), &dues).expect("pairwise");
        assert_eq!(
            debts,
            vec![PairwiseDebt {
                debtor: UserId(2),
                creditor: UserId(1),
                amount: Amount::from_cents(200)
            }]
        );
    }

    #[test]
    fn pairwise_drops_even_pairs() {
        let dues = vec![due(1, 2, 1, 300, false), due(2, 1, 2, 300, false)];
        assert!(pairwise(GroupId(1), &dues).expect("pairwise").is_empty());
    }
}
