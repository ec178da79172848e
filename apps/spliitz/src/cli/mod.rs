//! # CLI Commands
//!
//! One `cmd_*` function per subcommand. Each opens the ledger, applies a
//! single operation through [`Session`], writes the result back and prints
//! it as text or JSON.
//!
//! Two backends are supported:
//!
//! - `file`: the whole ledger kept in one canonical snapshot file,
//!   rewritten after every change
//! - `redb`: a redb database, written record by record

mod args;

pub use args::{Cli, Command, DueCommand, ExpenseCommand, GroupCommand, UserCommand};

use crate::api;
use crate::config::{ConfigError, ServerConfig};
use serde::Serialize;
use spliitz_core::formats::{decode_snapshot, export_canonical, import_canonical};
use spliitz_core::ledger::{LedgerCounts, LedgerStore};
use spliitz_core::workflow;
use spliitz_core::{
    Amount, ApprovalOutcome, Due, DueId, Expense, ExpenseDraft, ExpenseId, Group, GroupId,
    RedbLedger, ReconcileReport, Session, SpliitzError, SplitPlan, User, UserId,
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Ledger(#[from] SpliitzError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("unknown backend {0:?} (expected \"file\" or \"redb\")")]
    UnknownBackend(String),

    #[error("unknown format {0:?} (expected \"canonical\" or \"json\")")]
    UnknownFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("refusing to import into a ledger that already has records")]
    NotEmpty,
}

// =============================================================================
// BACKENDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    File,
    Redb,
}

impl std::str::FromStr for Backend {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(CliError::UnknownBackend(other.to_string())),
        }
    }
}

/// Open the ledger at `path`. A missing snapshot file yields an empty
/// session; a missing redb file is created.
pub fn load_or_create_session(path: &Path, backend: &str) -> Result<Session, CliError> {
    match backend.parse::<Backend>()? {
        Backend::File => {
            if !path.exists() {
                return Ok(Session::new());
            }
            let bytes = std::fs::read(path)?;
            Ok(Session::with_store(import_canonical(&bytes)?))
        }
        Backend::Redb => Ok(Session::open_redb(path)?),
    }
}

/// Write the session to `path` as a canonical snapshot.
///
/// The snapshot goes to a sibling temp file first and is renamed into
/// place, so readers never see a half-written ledger.
pub fn save_session(session: &Session, path: &Path) -> Result<(), CliError> {
    let bytes = export_canonical(session.store())?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Persist after a change. redb has already committed.
fn persist(session: &Session, path: &Path, backend: &str) -> Result<(), CliError> {
    match backend.parse::<Backend>()? {
        Backend::File => save_session(session, path),
        Backend::Redb => Ok(()),
    }
}

/// Seconds since the Unix epoch. The core never reads the clock itself.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// ARGUMENT PARSING HELPERS
// =============================================================================

/// Parse `USER=AMOUNT` pairs separated by commas.
pub fn parse_shares(input: &str) -> Result<Vec<(UserId, Amount)>, CliError> {
    input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (user, amount) = part.split_once('=').ok_or_else(|| {
                CliError::InvalidArgument(format!("share {:?} is not USER=AMOUNT", part))
            })?;
            let user = user.trim().parse::<u64>().map_err(|_| {
                CliError::InvalidArgument(format!("user id {:?} is not a number", user))
            })?;
            Ok((UserId(user), Amount::parse(amount.trim())?))
        })
        .collect()
}

// =============================================================================
// LEDGER COMMANDS
// =============================================================================

pub fn cmd_init(path: &Path, backend: &str, force: bool) -> Result<(), CliError> {
    let kind = backend.parse::<Backend>()?;
    if path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(path.to_path_buf()));
        }
        std::fs::remove_file(path)?;
    }
    match kind {
        Backend::File => save_session(&Session::new(), path)?,
        Backend::Redb => {
            RedbLedger::open(path)?;
        }
    }
    info!(path = %path.display(), backend, "ledger initialized");
    println!("Initialized empty {} ledger at {}", backend, path.display());
    Ok(())
}

pub fn cmd_status(path: &Path, backend: &str, json: bool) -> Result<(), CliError> {
    let session = load_or_create_session(path, backend)?;
    let counts = session.counts()?;
    if json {
        return print_json(&counts);
    }
    println!("Ledger:   {} ({})", path.display(), backend);
    println!("Users:    {}", counts.users);
    println!("Groups:   {}", counts.groups);
    println!("Expenses: {}", counts.expenses);
    println!("Dues:     {}", counts.dues);
    Ok(())
}

pub fn cmd_user_add(path: &Path, backend: &str, json: bool, name: &str) -> Result<User, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let user = session.create_user(name)?;
    persist(&session, path, backend)?;
    if json {
        print_json(&user)?;
    } else {
        println!("Created {} ({})", user.id, user.name);
    }
    Ok(user)
}

// =============================================================================
// GROUP COMMANDS
// =============================================================================

pub fn cmd_group_create(
    path: &Path,
    backend: &str,
    json: bool,
    name: &str,
    creator: u64,
) -> Result<Group, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let group = session.create_group(name, UserId(creator))?;
    persist(&session, path, backend)?;
    if json {
        print_json(&group)?;
    } else {
        println!("Created {} ({})", group.id, group.name);
    }
    Ok(group)
}

pub fn cmd_group_add_member(
    path: &Path,
    backend: &str,
    json: bool,
    group: u64,
    actor: u64,
    user: u64,
) -> Result<Group, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let group = session.add_member(GroupId(group), UserId(actor), UserId(user))?;
    persist(&session, path, backend)?;
    if json {
        print_json(&group)?;
    } else {
        println!("Added user#{} to {} ({} members)", user, group.id, group.members.len());
    }
    Ok(group)
}

pub fn cmd_group_remove_member(
    path: &Path,
    backend: &str,
    json: bool,
    group: u64,
    actor: u64,
    user: u64,
) -> Result<Group, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let group = session.remove_member(GroupId(group), UserId(actor), UserId(user))?;
    persist(&session, path, backend)?;
    if json {
        print_json(&group)?;
    } else {
        println!("Removed user#{} from {}", user, group.id);
    }
    Ok(group)
}

// =============================================================================
// EXPENSE COMMANDS
// =============================================================================

pub fn cmd_expense_propose(
    path: &Path,
    backend: &str,
    json: bool,
    group: u64,
    description: &str,
    payer: u64,
    proposer: Option<u64>,
    total: &str,
    members: &[u64],
    shares: Option<&str>,
) -> Result<Expense, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let group_id = GroupId(group);

    let plan = match shares {
        Some(shares) => SplitPlan::Exact(parse_shares(shares)?),
        None if members.is_empty() => {
            SplitPlan::Even(session.group(group_id)?.members.into_iter().collect())
        }
        None => SplitPlan::Even(members.iter().copied().map(UserId).collect()),
    };

    let draft = ExpenseDraft {
        group_id,
        description: description.to_string(),
        payer: UserId(payer),
        proposed_by: UserId(proposer.unwrap_or(payer)),
        total: Amount::parse(total)?,
        plan,
    };
    let expense = session.propose_expense(draft, now_secs())?;
    persist(&session, path, backend)?;

    if json {
        print_json(&expense)?;
    } else {
        println!(
            "Proposed {} \"{}\" for {} ({} approval(s) pending)",
            expense.id,
            expense.description,
            expense.total,
            expense.pending_approvals()
        );
    }
    Ok(expense)
}

pub fn cmd_expense_approve(
    path: &Path,
    backend: &str,
    json: bool,
    expense: u64,
    user: u64,
) -> Result<ApprovalOutcome, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let (expense, outcome) = session.approve_share(ExpenseId(expense), UserId(user))?;
    persist(&session, path, backend)?;

    if json {
        print_json(&outcome)?;
    } else {
        match outcome {
            ApprovalOutcome::Recorded { pending } => {
                println!("Approved {} ({} pending)", expense.id, pending);
            }
            ApprovalOutcome::AlreadyApproved { pending } => {
                println!("Already approved {} ({} pending)", expense.id, pending);
            }
            ApprovalOutcome::ReadyToFinalize => {
                let dues = session.dues_for_expense(expense.id)?;
                println!("Finalized {}, {} due(s) outstanding", expense.id, dues.len());
            }
        }
    }
    Ok(outcome)
}

pub fn cmd_expense_withdraw(
    path: &Path,
    backend: &str,
    json: bool,
    expense: u64,
    actor: u64,
) -> Result<(), CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let removed = session.withdraw_proposal(ExpenseId(expense), UserId(actor))?;
    persist(&session, path, backend)?;
    if json {
        print_json(&removed)?;
    } else {
        println!("Withdrew {}", removed.id);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExpenseRow {
    #[serde(flatten)]
    expense: Expense,
    stage: workflow::ExpenseStage,
}

pub fn cmd_expense_list(path: &Path, backend: &str, json: bool, group: u64) -> Result<(), CliError> {
    let session = load_or_create_session(path, backend)?;
    let mut rows = Vec::new();
    for expense in session.expenses_in_group(GroupId(group))? {
        let stage = session.expense_stage(expense.id)?;
        rows.push(ExpenseRow { expense, stage });
    }

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No expenses in group#{}", group);
    }
    for row in &rows {
        println!(
            "{:<12} {:>10}  {:<20} paid by {}  {}",
            row.expense.id.to_string(),
            row.expense.total.to_string(),
            row.stage.to_string(),
            row.expense.payer,
            row.expense.description
        );
    }
    Ok(())
}

// =============================================================================
// DUE COMMANDS
// =============================================================================

pub fn cmd_due_pay(
    path: &Path,
    backend: &str,
    json: bool,
    due: u64,
    actor: u64,
) -> Result<Due, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let due = session.mark_paid(DueId(due), UserId(actor))?;
    persist(&session, path, backend)?;
    print_due(&due, json)?;
    Ok(due)
}

pub fn cmd_due_confirm(
    path: &Path,
    backend: &str,
    json: bool,
    due: u64,
    actor: u64,
) -> Result<Due, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let due = session.confirm_received(DueId(due), UserId(actor))?;
    persist(&session, path, backend)?;
    print_due(&due, json)?;
    Ok(due)
}

fn print_due(due: &Due, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(due);
    }
    println!(
        "{}: {} owes {} {} [{}]",
        due.id,
        due.debtor,
        due.creditor,
        due.amount,
        due.stage()
    );
    Ok(())
}

// =============================================================================
// VIEWS AND MAINTENANCE
// =============================================================================

pub fn cmd_balances(path: &Path, backend: &str, json: bool, group: u64) -> Result<(), CliError> {
    let session = load_or_create_session(path, backend)?;
    let group = GroupId(group);
    let balances = session.balances(group)?;
    let debts = session.pairwise(group)?;

    if json {
        return print_json(&serde_json::json!({
            "group_id": group,
            "balances": balances,
            "debts": debts,
        }));
    }

    println!("Balances for {}:", group);
    for balance in &balances {
        println!("  {:<10} {:>10}", balance.user.to_string(), balance.net.to_string());
    }
    if !debts.is_empty() {
        println!("Outstanding:");
        for debt in &debts {
            println!("  {} owes {} {}", debt.debtor, debt.creditor, debt.amount);
        }
    }
    Ok(())
}

pub fn cmd_reconcile(path: &Path, backend: &str, json: bool) -> Result<ReconcileReport, CliError> {
    let mut session = load_or_create_session(path, backend)?;
    let report = session.reconcile()?;
    if !report.is_empty() {
        persist(&session, path, backend)?;
    }

    if json {
        print_json(&report)?;
    } else if report.is_empty() {
        println!("Ledger is consistent, nothing to repair");
    } else {
        println!(
            "Finalized {} expense(s), created {} due(s), repaired {} due(s)",
            report.finalized.len(),
            report.dues_created.len(),
            report.dues_repaired.len()
        );
    }
    Ok(report)
}

pub fn cmd_export(path: &Path, backend: &str, output: &Path, format: &str) -> Result<(), CliError> {
    let session = load_or_create_session(path, backend)?;
    match format {
        "canonical" => {
            let bytes = export_canonical(session.store())?;
            std::fs::write(output, &bytes)?;
            println!("Exported {} bytes to {}", bytes.len(), output.display());
        }
        "json" => {
            let snapshot = session.snapshot()?;
            std::fs::write(output, serde_json::to_string_pretty(&snapshot)?)?;
            println!("Exported JSON snapshot to {}", output.display());
        }
        other => return Err(CliError::UnknownFormat(other.to_string())),
    }
    Ok(())
}

/// Load a canonical snapshot. The target ledger must be empty so ids
/// from the snapshot never collide with existing records.
pub fn cmd_import(path: &Path, backend: &str, input: &Path) -> Result<(), CliError> {
    let bytes = std::fs::read(input)?;
    let snapshot = decode_snapshot(&bytes)?;

    match backend.parse::<Backend>()? {
        Backend::File => {
            let existing = load_or_create_session(path, backend)?;
            if existing.counts()? != LedgerCounts::default() {
                return Err(CliError::NotEmpty);
            }
            std::fs::write(path, &bytes)?;
        }
        Backend::Redb => {
            let mut ledger = RedbLedger::open(path)?;
            if ledger.counts()? != LedgerCounts::default() {
                return Err(CliError::NotEmpty);
            }
            ledger.import_snapshot(&snapshot)?;
        }
    }

    info!(
        users = snapshot.users.len(),
        groups = snapshot.groups.len(),
        expenses = snapshot.expenses.len(),
        dues = snapshot.dues.len(),
        "snapshot imported"
    );
    println!(
        "Imported {} users, {} groups, {} expenses, {} dues",
        snapshot.users.len(),
        snapshot.groups.len(),
        snapshot.expenses.len(),
        snapshot.dues.len()
    );
    Ok(())
}

// =============================================================================
// SERVER
// =============================================================================

/// Open the ledger, reconcile it and serve the HTTP API until Ctrl-C.
pub async fn cmd_serve(path: &Path, backend: &str, config: ServerConfig) -> Result<(), CliError> {
    let kind = backend.parse::<Backend>()?;
    let mut session = load_or_create_session(path, backend)?;

    let report = session.reconcile()?;
    if !report.is_empty() {
        warn!(
            finalized = report.finalized.len(),
            dues_created = report.dues_created.len(),
            dues_repaired = report.dues_repaired.len(),
            "startup reconcile repaired the ledger"
        );
        persist(&session, path, backend)?;
    }

    let snapshot_path = match kind {
        Backend::File => Some(path.to_path_buf()),
        Backend::Redb => None,
    };
    let state = api::AppState::new(session, snapshot_path, &config);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        addr = %config.bind_addr(),
        backend,
        auth = config.api_key.is_some(),
        rate_limit = ?config.rate_limit,
        "spliitz listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
