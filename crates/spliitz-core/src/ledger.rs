//! # Ledger
//!
//! The persistence seam for Spliitz and its in-memory implementation.
//!
//! `LedgerStore` is deliberately record-oriented: it stores and fetches
//! users, groups, expenses and dues, and hands out ids. All workflow rules
//! live above it in [`crate::session`] and [`crate::workflow`], so every
//! backend behaves the same.
//!
//! The in-memory `Ledger` uses `BTreeMap` exclusively so that iteration,
//! and therefore snapshots, are deterministic.

use crate::due::Due;
use crate::expense::Expense;
use crate::formats::{IdCounters, LedgerSnapshot};
use crate::model::{Group, User};
use crate::{DueId, ExpenseId, GroupId, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LEDGERSTORE TRAIT
// =============================================================================

/// Which id sequence to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    User,
    Group,
    Expense,
    Due,
}

/// Record counts, used for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCounts {
    pub users: usize,
    pub groups: usize,
    pub expenses: usize,
    pub dues: usize,
}

/// Storage operations every ledger backend provides.
///
/// Lists are returned in id order.
pub trait LedgerStore {
    /// Allocate the next id of the given kind. Ids start at 1.
    fn next_id(&mut self, kind: IdKind) -> Result<u64>;

    fn get_user(&self, id: UserId) -> Result<Option<User>>;
    fn put_user(&mut self, user: User) -> Result<()>;
    fn users(&self) -> Result<Vec<User>>;

    fn get_group(&self, id: GroupId) -> Result<Option<Group>>;
    fn put_group(&mut self, group: Group) -> Result<()>;
    fn groups(&self) -> Result<Vec<Group>>;

    fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>>;
    fn put_expense(&mut self, expense: Expense) -> Result<()>;
    fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<Expense>>;
    fn expenses(&self) -> Result<Vec<Expense>>;

    fn get_due(&self, id: DueId) -> Result<Option<Due>>;
    /// Store several dues at once. Backends with transactions write them
    /// atomically.
    fn put_dues(&mut self, dues: &[Due]) -> Result<()>;
    fn dues(&self) -> Result<Vec<Due>>;

    /// Full copy of the ledger, in id order.
    fn snapshot(&self) -> Result<LedgerSnapshot>;

    fn put_due(&mut self, due: Due) -> Result<()> {
        self.put_dues(std::slice::from_ref(&due))
    }

    fn expenses_in_group(&self, group: GroupId) -> Result<Vec<Expense>> {
        Ok(self
            .expenses()?
            .into_iter()
            .filter(|e| e.group_id == group)
            .collect())
    }

    fn dues_in_group(&self, group: GroupId) -> Result<Vec<Due>> {
        Ok(self
            .dues()?
            .into_iter()
            .filter(|d| d.group_id == group)
            .collect())
    }

    fn dues_for_expense(&self, expense: ExpenseId) -> Result<Vec<Due>> {
        Ok(self
            .dues()?
            .into_iter()
            .filter(|d| d.expense_id == expense)
            .collect())
    }

    fn counts(&self) -> Result<LedgerCounts> {
        Ok(LedgerCounts {
            users: self.users()?.len(),
            groups: self.groups()?.len(),
            expenses: self.expenses()?.len(),
            dues: self.dues()?.len(),
        })
    }
}

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

/// In-memory ledger backed by `BTreeMap`s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    expenses: BTreeMap<ExpenseId, Expense>,
    dues: BTreeMap<DueId, Due>,
    counters: IdCounters,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record counts without going through `Result`.
    #[must_use]
    pub fn len(&self) -> LedgerCounts {
        LedgerCounts {
            users: self.users.len(),
            groups: self.groups.len(),
            expenses: self.expenses.len(),
            dues: self.dues.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == LedgerCounts::default()
    }
}

impl LedgerStore for Ledger {
    fn next_id(&mut self, kind: IdKind) -> Result<u64> {
        self.counters.allocate(kind)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn put_user(&mut self, user: User) -> Result<()> {
        self.users.insert(user.id, user);
        Ok(())
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.values().cloned().collect())
    }

    fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        Ok(self.groups.get(&id).cloned())
    }

    fn put_group(&mut self, group: Group) -> Result<()> {
        self.groups.insert(group.id, group);
        Ok(())
    }

    fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.values().cloned().collect())
    }

    fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        Ok(self.expenses.get(&id).cloned())
    }

    fn put_expense(&mut self, expense: Expense) -> Result<()> {
        self.expenses.insert(expense.id, expense);
        Ok(())
    }

    fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<Expense>> {
        Ok(self.expenses.remove(&id))
    }

    fn expenses(&self) -> Result<Vec<Expense>> {
        Ok(self.expenses.values().cloned().collect())
    }

    fn get_due(&self, id: DueId) -> Result<Option<Due>> {
        Ok(self.dues.get(&id).cloned())
    }

    fn put_dues(&mut self, dues: &[Due]) -> Result<()> {
        for due in dues {
            self.dues.insert(due.id, due.clone());
        }
        Ok(())
    }

    fn dues(&self) -> Result<Vec<Due>> {
        Ok(self.dues.values().cloned().collect())
    }

    fn snapshot(&self) -> Result<LedgerSnapshot> {
        Ok(LedgerSnapshot::from(self))
    }

    fn counts(&self) -> Result<LedgerCounts> {
        Ok(self.len())
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

impl From<&Ledger> for LedgerSnapshot {
    fn from(ledger: &Ledger) -> Self {
        Self {
            counters: ledger.counters,
            users: ledger.users.values().cloned().collect(),
            groups: ledger.groups.values().cloned().collect(),
            expenses: ledger.expenses.values().cloned().collect(),
            dues: ledger.dues.values().cloned().collect(),
        }
    }
}

impl From<LedgerSnapshot> for Ledger {
    fn from(snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Ledger {
            counters: snapshot.counters,
            ..Ledger::default()
        };
        for user in snapshot.users {
            ledger.users.insert(user.id, user);
        }
        for group in snapshot.groups {
            ledger.groups.insert(group.id, group);
        }
        for expense in snapshot.expenses {
            ledger.expenses.insert(expense.id, expense);
        }
        for due in snapshot.dues {
            ledger.dues.insert(due.id, due);
        }
        ledger.counters.cover(&ledger.users, &ledger.groups, &ledger.expenses, &ledger.dues);
        ledger
    }
}

// =============================================================================
// TESTS
// =============================================================================
