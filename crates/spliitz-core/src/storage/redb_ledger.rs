//! redb-backed `LedgerStore`.
//!
//! One table per record kind, keyed by the numeric id, with values encoded
//! by postcard. Id counters live in a small `counters` table and are
//! bumped inside the same write transaction that reads them.

use crate::due::Due;
use crate::expense::Expense;
use crate::formats::{IdCounters, LedgerSnapshot};
use crate::ledger::{IdKind, LedgerStore};
use crate::model::{Group, User};
use crate::{DueId, ExpenseId, GroupId, Result, SpliitzError, UserId};
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

const USERS: RecordTable = TableDefinition::new("users");
const GROUPS: RecordTable = TableDefinition::new("groups");
const EXPENSES: RecordTable = TableDefinition::new("expenses");
const DUES: RecordTable = TableDefinition::new("dues");
const COUNTERS: TableDefinition<'static, &'static str, u64> = TableDefinition::new("counters");

fn storage_err(err: impl Into<redb::Error>) -> SpliitzError {
    SpliitzError::from(err.into())
}

fn counter_name(kind: IdKind) -> &'static str {
    match kind {
        IdKind::User => "user",
        IdKind::Group => "group",
        IdKind::Expense => "expense",
        IdKind::Due => "due",
    }
}

/// Ledger persisted in a redb file.
pub struct RedbLedger {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLedger").field("path", &self.path).finish()
    }
}

impl RedbLedger {
    /// Open (or create) the database at `path` and make sure every table
    /// exists, so read transactions never hit a missing table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(storage_err)?;

        let txn = db.begin_write().map_err(storage_err)?;
        {
            for table in [USERS, GROUPS, EXPENSES, DUES] {
                txn.open_table(table).map_err(storage_err)?;
            }
            txn.open_table(COUNTERS).map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;

        tracing::debug!(path = %path.display(), "opened redb ledger");
        Ok(Self { db, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a snapshot into an empty database in a single transaction.
    pub fn import_snapshot(&mut self, snapshot: &LedgerSnapshot) -> Result<()> {
        if self.counts()? != Default::default() {
            return Err(SpliitzError::Storage(
                "refusing to import into a non-empty ledger".into(),
            ));
        }

        let txn = self.db.begin_write().map_err(storage_err)?;
        {
            write_records(&txn, USERS, snapshot.users.iter().map(|u| (u.id.0, u)))?;
            write_records(&txn, GROUPS, snapshot.groups.iter().map(|g| (g.id.0, g)))?;
            write_records(&txn, EXPENSES, snapshot.expenses.iter().map(|e| (e.id.0, e)))?;
            write_records(&txn, DUES, snapshot.dues.iter().map(|d| (d.id.0, d)))?;

            let mut counters = snapshot.counters;
            for (kind, max) in [
                (IdKind::User, snapshot.users.iter().map(|u| u.id.0).max()),
                (IdKind::Group, snapshot.groups.iter().map(|g| g.id.0).max()),
                (IdKind::Expense, snapshot.expenses.iter().map(|e| e.id.0).max()),
                (IdKind::Due, snapshot.dues.iter().map(|d| d.id.0).max()),
            ] {
                counters.observe(kind, max.unwrap_or(0));
            }

            let mut table = txn.open_table(COUNTERS).map_err(storage_err)?;
            for (name, value) in [
                ("user", counters.user),
                ("group", counters.group),
                ("expense", counters.expense),
                ("due", counters.due),
            ] {
                table.insert(name, value).map_err(storage_err)?;
            }
        }
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, table: RecordTable, id: u64) -> Result<Option<T>> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(table).map_err(storage_err)?;
        match table.get(id).map_err(storage_err)? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    fn put_record<T: Serialize>(&self, table: RecordTable, id: u64, record: &T) -> Result<()> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        write_records(&txn, table, std::iter::once((id, record)))?;
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn all_records<T: DeserializeOwned>(&self, table: RecordTable) -> Result<Vec<T>> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        read_all(&txn, table)
    }
}

fn write_records<'r, T, I>(txn: &redb::WriteTransaction, table: RecordTable, records: I) -> Result<()>
where
    T: Serialize + 'r,
    I: IntoIterator<Item = (u64, &'r T)>,
{
    let mut table = txn.open_table(table).map_err(storage_err)?;
    for (id, record) in records {
        let bytes = postcard::to_stdvec(record)?;
        table.insert(id, bytes.as_slice()).map_err(storage_err)?;
    }
    Ok(())
}

fn read_all<T: DeserializeOwned>(txn: &ReadTransaction, table: RecordTable) -> Result<Vec<T>> {
    let table = txn.open_table(table).map_err(storage_err)?;
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (_, value) = entry.map_err(storage_err)?;
        out.push(postcard::from_bytes(value.value())?);
    }
    Ok(out)
}

impl LedgerStore for RedbLedger {
    fn next_id(&mut self, kind: IdKind) -> Result<u64> {
        let name = counter_name(kind);
        let txn = self.db.begin_write().map_err(storage_err)?;
        let next = {
            let mut table = txn.open_table(COUNTERS).map_err(storage_err)?;
            let current = table
                .get(name)
                .map_err(storage_err)?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let next = current.checked_add(1).ok_or(SpliitzError::Overflow)?;
            table.insert(name, next).map_err(storage_err)?;
            next
        };
        txn.commit().map_err(storage_err)?;
        Ok(next)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.get_record(USERS, id.0)
    }

    fn put_user(&mut self, user: User) -> Result<()> {
        self.put_record(USERS, user.id.0, &user)
    }

    fn users(&self) -> Result<Vec<User>> {
        self.all_records(USERS)
    }

    fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.get_record(GROUPS, id.0)
    }

    fn put_group(&mut self, group: Group) -> Result<()> {
        self.put_record(GROUPS, group.id.0, &group)
    }

    fn groups(&self) -> Result<Vec<Group>> {
        self.all_records(GROUPS)
    }

    fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        self.get_record(EXPENSES, id.0)
    }

    fn put_expense(&mut self, expense: Expense) -> Result<()> {
        self.put_record(EXPENSES, expense.id.0, &expense)
    }

    fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<Expense>> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = txn.open_table(EXPENSES).map_err(storage_err)?;
            let old = table.remove(id.0).map_err(storage_err)?;
            match old {
                Some(guard) => Some(postcard::from_bytes::<Expense>(guard.value())?),
                None => None,
            }
        };
        txn.commit().map_err(storage_err)?;
        Ok(removed)
    }

    fn expenses(&self) -> Result<Vec<Expense>> {
        self.all_records(EXPENSES)
    }

    fn get_due(&self, id: DueId) -> Result<Option<Due>> {
        self.get_record(DUES, id.0)
    }

    fn put_dues(&mut self, dues: &[Due]) -> Result<()> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        write_records(&txn, DUES, dues.iter().map(|d| (d.id.0, d)))?;
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn dues(&self) -> Result<Vec<Due>> {
        self.all_records(DUES)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot> {
        let txn = self.db.begin_read().map_err(storage_err)?;

        let mut counters = IdCounters::default();
        {
            let table = txn.open_table(COUNTERS).map_err(storage_err)?;
            for kind in [IdKind::User, IdKind::Group, IdKind::Expense, IdKind::Due] {
                if let Some(guard) = table.get(counter_name(kind)).map_err(storage_err)? {
                    counters.observe(kind, guard.value());
                }
            }
        }

        Ok(LedgerSnapshot {
            counters,
            users: read_all(&txn, USERS)?,
            groups: read_all(&txn, GROUPS)?,
            expenses: read_all(&txn, EXPENSES)?,
            dues: read_all(&txn, DUES)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Amount;

    fn temp_ledger() -> (tempfile::TempDir, RedbLedger) {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger = RedbLedger::open(dir.path().join("ledger.redb")).expect("open redb");
        (dir, ledger)
    }

    fn due(id: u64) -> Due {
        Due {
            id: DueId(id),
            expense_id: ExpenseId(1),
            group_id: GroupId(1),
            debtor: UserId(2),
            creditor: UserId(1),
            amount: Amount::from_cents(250),
            paid: false,
            received: false,
        }
    }

    #[test]
    fn counters_persist_across_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ledger.redb");
        {
            let mut ledger = RedbLedger::open(&path).expect("open");
            assert_eq!(ledger.next_id(IdKind::Expense), Ok(1));
            assert_eq!(ledger.next_id(IdKind::Expense), Ok(2));
        }
        let mut reopened = RedbLedger::open(&path).expect("reopen");
        assert_eq!(reopened.next_id(IdKind::Expense), Ok(3));
        assert_eq!(reopened.next_id(IdKind::Due), Ok(1));
    }

    #[test]
    fn records_roundtrip() {
        let (_dir, mut ledger) = temp_ledger();
        let group = Group::new(GroupId(4), "Holiday", UserId(1));
        ledger.put_group(group.clone()).expect("put group");
        assert_eq!(ledger.get_group(GroupId(4)), Ok(Some(group)));
        assert_eq!(ledger.get_group(GroupId(5)), Ok(None));
    }

    #[test]
    fn batch_dues_and_listing() {
        let (_dir, mut ledger) = temp_ledger();
        ledger.put_dues(&[due(2), due(1)]).expect("put dues");
        let ids: Vec<DueId> = ledger
            .dues()
            .expect("list")
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![DueId(1), DueId(2)]);
    }

    #[test]
    fn delete_expense_returns_old_record() {
        let (_dir, mut ledger) = temp_ledger();
        assert_eq!(ledger.delete_expense(ExpenseId(1)), Ok(None));
    }

    #[test]
    fn import_requires_empty_ledger() {
        let (_dir, mut ledger) = temp_ledger();
        let mut snapshot = LedgerSnapshot::default();
        snapshot.dues.push(due(7));
        ledger.import_snapshot(&snapshot).expect("import into empty");
        assert_eq!(ledger.next_id(IdKind::Due), Ok(8));
        assert!(ledger.import_snapshot(&snapshot).is_err());
    }

    #[test]
    fn snapshot_matches_in_memory_layout() {
        let (_dir, mut ledger) = temp_ledger();
        let id = ledger.next_id(IdKind::User).expect("id");
        ledger
            .put_user(User {
                id: UserId(id),
                name: "Alice".to_string(),
            })
            .expect("put user");

        let snapshot = ledger.snapshot().expect("snapshot");
        assert_eq!(snapshot.counters.user, 1);
        assert_eq!(snapshot.users.len(), 1);
    }
}
