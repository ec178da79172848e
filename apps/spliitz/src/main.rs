//! # Spliitz
//!
//! Entry point: parse the command line, set up logging and dispatch to a
//! `cmd_*` function. Only `serve` starts a Tokio runtime.

use clap::Parser;
use spliitz::cli::{
    self, Cli, CliError, Command, DueCommand, ExpenseCommand, GroupCommand, UserCommand,
};
use spliitz::config::ServerConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Cli) -> Result<(), CliError> {
    let db = args.db.as_path();
    let backend = args.backend.as_str();
    let json = args.json;

    match args.command {
        Command::Init { force } => cli::cmd_init(db, backend, force),
        Command::Status => cli::cmd_status(db, backend, json),
        Command::User(UserCommand::Add { name }) => {
            cli::cmd_user_add(db, backend, json, &name).map(drop)
        }
        Command::Group(GroupCommand::Create { name, creator }) => {
            cli::cmd_group_create(db, backend, json, &name, creator).map(drop)
        }
        Command::Group(GroupCommand::AddMember { group, actor, user }) => {
            cli::cmd_group_add_member(db, backend, json, group, actor, user).map(drop)
        }
        Command::Group(GroupCommand::RemoveMember { group, actor, user }) => {
            cli::cmd_group_remove_member(db, backend, json, group, actor, user).map(drop)
        }
        Command::Expense(ExpenseCommand::Propose {
            group,
            description,
            payer,
            proposer,
            total,
            members,
            shares,
        }) => cli::cmd_expense_propose(
            db,
            backend,
            json,
            group,
            &description,
            payer,
            proposer,
            &total,
            &members,
            shares.as_deref(),
        )
        .map(drop),
        Command::Expense(ExpenseCommand::Approve { id, user }) => {
            cli::cmd_expense_approve(db, backend, json, id, user).map(drop)
        }
        Command::Expense(ExpenseCommand::Withdraw { id, actor }) => {
            cli::cmd_expense_withdraw(db, backend, json, id, actor)
        }
        Command::Expense(ExpenseCommand::List { group }) => {
            cli::cmd_expense_list(db, backend, json, group)
        }
        Command::Due(DueCommand::Pay { id, actor }) => {
            cli::cmd_due_pay(db, backend, json, id, actor).map(drop)
        }
        Command::Due(DueCommand::Confirm { id, actor }) => {
            cli::cmd_due_confirm(db, backend, json, id, actor).map(drop)
        }
        Command::Balances { group } => cli::cmd_balances(db, backend, json, group),
        Command::Reconcile => cli::cmd_reconcile(db, backend, json).map(drop),
        Command::Export { output, format } => cli::cmd_export(db, backend, &output, &format),
        Command::Import { input } => cli::cmd_import(db, backend, &input),
        Command::Serve { host, port } => {
            let config = ServerConfig::from_env(host, port)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(cli::cmd_serve(db, backend, config))
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
