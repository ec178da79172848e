//! Integration tests for Spliitz CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use spliitz::cli::{
    CliError, cmd_balances, cmd_due_confirm, cmd_due_pay, cmd_expense_approve,
    cmd_expense_list, cmd_expense_propose, cmd_expense_withdraw, cmd_export,
    cmd_group_add_member, cmd_group_create, cmd_group_remove_member, cmd_import, cmd_init,
    cmd_reconcile, cmd_status, cmd_user_add, load_or_create_session, save_session,
};
use spliitz_core::ledger::LedgerStore;
use spliitz_core::{
    Amount, ApprovalOutcome, DueStage, ExpenseId, ExpenseStage, GroupId, Session, SpliitzError,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Alice, Bob and Carol in group#1, Alice is the creator.
fn seed_group(db: &Path, backend: &str) {
    cmd_init(db, backend, false).unwrap();
    cmd_user_add(db, backend, false, "Alice").unwrap();
    cmd_user_add(db, backend, false, "Bob").unwrap();
    cmd_user_add(db, backend, false, "Carol").unwrap();
    cmd_group_create(db, backend, false, "Flat", 1).unwrap();
    cmd_group_add_member(db, backend, false, 1, 1, 2).unwrap();
    cmd_group_add_member(db, backend, false, 1, 1, 3).unwrap();
}

/// Alice pays 30.00 split evenly three ways.
fn propose_dinner(db: &Path, backend: &str) -> ExpenseId {
    cmd_expense_propose(db, backend, false, 1, "Dinner", 1, None, "30.00", &[], None)
        .unwrap()
        .id
}

fn db_path(temp: &TempDir, name: &str) -> PathBuf {
    temp.path().join(name)
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_file_database() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    let result = cmd_init(&db_path, "file", false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_creates_redb_database() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.redb");

    let result = cmd_init(&db_path, "redb", false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    cmd_init(&db_path, "file", false).unwrap();

    let result = cmd_init(&db_path, "file", false);
    assert!(matches!(result, Err(CliError::AlreadyExists(_))));
}

#[test]
fn test_init_succeeds_with_force() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    cmd_init(&db_path, "file", false).unwrap();
    cmd_user_add(&db_path, "file", false, "Alice").unwrap();

    // Force wipes the existing ledger
    cmd_init(&db_path, "file", true).unwrap();
    let session = load_or_create_session(&db_path, "file").unwrap();
    assert_eq!(session.counts().unwrap().users, 0);
}

#[test]
fn test_init_unknown_backend() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    let result = cmd_init(&db_path, "sqlite", false);
    assert!(matches!(result, Err(CliError::UnknownBackend(_))));
}

// =============================================================================
// LOAD/SAVE SESSION TESTS
// =============================================================================

#[test]
fn test_load_nonexistent_creates_new() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "nonexistent.db");

    let session = load_or_create_session(&db_path, "file").unwrap();
    assert_eq!(session.counts().unwrap().users, 0);
}

#[test]
fn test_save_and_load_session() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    let mut session = Session::new();
    let alice = session.create_user("Alice").unwrap();
    session.create_group("Trip", alice.id).unwrap();

    save_session(&session, &db_path).unwrap();

    let loaded = load_or_create_session(&db_path, "file").unwrap();
    assert_eq!(loaded.user(alice.id).unwrap(), alice);
    assert_eq!(loaded.counts().unwrap(), session.counts().unwrap());
}

#[test]
fn test_loaded_session_continues_id_sequence() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");

    cmd_user_add(&db_path, "file", false, "Alice").unwrap();
    let bob = cmd_user_add(&db_path, "file", false, "Bob").unwrap();
    assert_eq!(bob.id.0, 2);
}

#[test]
fn test_corrupt_snapshot_is_rejected() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    std::fs::write(&db_path, b"definitely not a ledger").unwrap();

    let result = load_or_create_session(&db_path, "file");
    assert!(matches!(
        result,
        Err(CliError::Ledger(SpliitzError::Format(_)))
    ));
}

// =============================================================================
// STATUS COMMAND TESTS
// =============================================================================

#[test]
fn test_status_empty_ledger() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    cmd_init(&db_path, "file", false).unwrap();

    assert!(cmd_status(&db_path, "file", false).is_ok());
    assert!(cmd_status(&db_path, "file", true).is_ok());
}

// =============================================================================
// GROUP COMMAND TESTS
// =============================================================================

#[test]
fn test_group_membership() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");

    let session = load_or_create_session(&db_path, "file").unwrap();
    let group = session.group(GroupId(1)).unwrap();
    assert_eq!(group.members.len(), 3);

    let group = cmd_group_remove_member(&db_path, "file", false, 1, 3, 3).unwrap();
    assert_eq!(group.members.len(), 2);
}

#[test]
fn test_group_create_requires_existing_user() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    cmd_init(&db_path, "file", false).unwrap();

    let result = cmd_group_create(&db_path, "file", false, "Ghosts", 42);
    assert!(matches!(
        result,
        Err(CliError::Ledger(SpliitzError::UserNotFound(_)))
    ));
}

// =============================================================================
// EXPENSE WORKFLOW TESTS
// =============================================================================

#[test]
fn test_full_workflow_file_backend() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");

    let id = propose_dinner(&db_path, "file");
    let outcome = cmd_expense_approve(&db_path, "file", false, id.0, 2).unwrap();
    assert_eq!(outcome, ApprovalOutcome::Recorded { pending: 1 });
    let outcome = cmd_expense_approve(&db_path, "file", false, id.0, 3).unwrap();
    assert_eq!(outcome, ApprovalOutcome::ReadyToFinalize);

    let session = load_or_create_session(&db_path, "file").unwrap();
    assert_eq!(session.expense_stage(id).unwrap(), ExpenseStage::DuesOutstanding);
    let dues = session.dues_for_expense(id).unwrap();
    assert_eq!(dues.len(), 2);
    drop(session);

    for due in &dues {
        let paid = cmd_due_pay(&db_path, "file", false, due.id.0, due.debtor.0).unwrap();
        assert_eq!(paid.stage(), DueStage::PaidPendingConfirm);
        let settled = cmd_due_confirm(&db_path, "file", false, due.id.0, 1).unwrap();
        assert_eq!(settled.stage(), DueStage::Settled);
    }

    let session = load_or_create_session(&db_path, "file").unwrap();
    assert_eq!(session.expense_stage(id).unwrap(), ExpenseStage::Settled);
    assert!(cmd_balances(&db_path, "file", true, 1).is_ok());
    assert!(cmd_expense_list(&db_path, "file", true, 1).is_ok());
}

#[test]
fn test_full_workflow_redb_backend() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.redb");
    seed_group(&db_path, "redb");

    let id = propose_dinner(&db_path, "redb");
    cmd_expense_approve(&db_path, "redb", false, id.0, 2).unwrap();
    cmd_expense_approve(&db_path, "redb", false, id.0, 3).unwrap();

    let session = load_or_create_session(&db_path, "redb").unwrap();
    let balances = session.balances(GroupId(1)).unwrap();
    let alice = balances.iter().find(|b| b.user.0 == 1).unwrap();
    assert_eq!(alice.net, Amount::from_cents(2000));
}

#[test]
fn test_exact_split() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");

    let expense = cmd_expense_propose(
        &db_path,
        "file",
        false,
        1,
        "Groceries",
        2,
        None,
        "20.00",
        &[],
        Some("1=5.00,2=15.00"),
    )
    .unwrap();
    assert_eq!(expense.splits.len(), 2);
    assert_eq!(expense.pending_approvals(), 1);
}

#[test]
fn test_exact_split_must_add_up() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");

    let result = cmd_expense_propose(
        &db_path,
        "file",
        false,
        1,
        "Groceries",
        2,
        None,
        "20.00",
        &[],
        Some("1=5.00,2=10.00"),
    );
    assert!(matches!(
        result,
        Err(CliError::Ledger(SpliitzError::SharesMismatch { .. }))
    ));
}

#[test]
fn test_withdraw_only_by_proposer() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");
    let id = propose_dinner(&db_path, "file");

    let result = cmd_expense_withdraw(&db_path, "file", false, id.0, 2);
    assert!(matches!(
        result,
        Err(CliError::Ledger(SpliitzError::Forbidden(_)))
    ));

    cmd_expense_withdraw(&db_path, "file", false, id.0, 1).unwrap();
    let session = load_or_create_session(&db_path, "file").unwrap();
    assert!(session.expense(id).is_err());
}

#[test]
fn test_confirm_before_pay_fails() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");
    let id = propose_dinner(&db_path, "file");
    cmd_expense_approve(&db_path, "file", false, id.0, 2).unwrap();
    cmd_expense_approve(&db_path, "file", false, id.0, 3).unwrap();

    let session = load_or_create_session(&db_path, "file").unwrap();
    let due = session.dues_for_expense(id).unwrap().remove(0);
    drop(session);

    let result = cmd_due_confirm(&db_path, "file", false, due.id.0, 1);
    assert!(matches!(
        result,
        Err(CliError::Ledger(SpliitzError::NotPaid(_)))
    ));
}

// =============================================================================
// RECONCILE COMMAND TESTS
// =============================================================================

#[test]
fn test_reconcile_repairs_interrupted_finalization() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    seed_group(&db_path, "file");
    let id = propose_dinner(&db_path, "file");

    // Every share approved but the expense never finalized
    let mut session = load_or_create_session(&db_path, "file").unwrap();
    let store = session.store_mut();
    let mut expense = store.get_expense(id).unwrap().unwrap();
    for split in &mut expense.splits {
        split.approved = true;
    }
    store.put_expense(expense).unwrap();
    save_session(&session, &db_path).unwrap();

    let report = cmd_reconcile(&db_path, "file", false).unwrap();
    assert_eq!(report.finalized, vec![id]);
    assert_eq!(report.dues_created.len(), 2);

    let again = cmd_reconcile(&db_path, "file", true).unwrap();
    assert!(again.is_empty());
}

// =============================================================================
// EXPORT / IMPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_export_canonical_format() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let output_path = db_path.with_file_name("export.bin");
    seed_group(&db_path, "file");

    cmd_export(&db_path, "file", &output_path, "canonical").unwrap();
    let bytes = std::fs::read(&output_path).unwrap();
    assert_eq!(&bytes[..4], b"SPLZ");
}

#[test]
fn test_export_json_format() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let output_path = db_path.with_file_name("export.json");
    seed_group(&db_path, "file");

    cmd_export(&db_path, "file", &output_path, "json").unwrap();

    let content = std::fs::read_to_string(&output_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["users"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_export_unknown_format() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let output_path = db_path.with_file_name("export.bin");
    cmd_init(&db_path, "file", false).unwrap();

    let result = cmd_export(&db_path, "file", &output_path, "xml");
    assert!(matches!(result, Err(CliError::UnknownFormat(_))));
}

#[test]
fn test_import_canonical_into_file() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let export_path = db_path.with_file_name("export.bin");
    let import_path = db_path.with_file_name("imported.db");

    seed_group(&db_path, "file");
    propose_dinner(&db_path, "file");
    cmd_export(&db_path, "file", &export_path, "canonical").unwrap();

    cmd_import(&import_path, "file", &export_path).unwrap();

    let original = load_or_create_session(&db_path, "file").unwrap();
    let imported = load_or_create_session(&import_path, "file").unwrap();
    assert_eq!(original.snapshot().unwrap(), imported.snapshot().unwrap());
}

#[test]
fn test_import_canonical_into_redb() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let export_path = db_path.with_file_name("export.bin");
    let import_path = db_path.with_file_name("imported.redb");

    seed_group(&db_path, "file");
    cmd_export(&db_path, "file", &export_path, "canonical").unwrap();

    cmd_import(&import_path, "redb", &export_path).unwrap();

    let imported = load_or_create_session(&import_path, "redb").unwrap();
    assert_eq!(imported.counts().unwrap().users, 3);
    assert_eq!(imported.group(GroupId(1)).unwrap().members.len(), 3);
}

#[test]
fn test_import_refuses_non_empty_ledger() {
    let temp = create_temp_dir();
    let db_path = db_path(&temp, "test.db");
    let export_path = db_path.with_file_name("export.bin");

    seed_group(&db_path, "file");
    cmd_export(&db_path, "file", &export_path, "canonical").unwrap();

    let result = cmd_import(&db_path, "file", &export_path);
    assert!(matches!(result, Err(CliError::NotEmpty)));
}

#[test]
fn test_import_rejects_garbage() {
    let temp = create_temp_dir();
    let bad_path = temp.path().join("bad.bin");
    let import_path = temp.path().join("imported.db");
    std::fs::write(&bad_path, b"XXXX0000").unwrap();

    let result = cmd_import(&import_path, "file", &bad_path);
    assert!(result.is_err());
    assert!(!import_path.exists());
}
