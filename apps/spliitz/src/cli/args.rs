//! Command-line surface, parsed with clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spliitz", version, about = "Shared expenses with approvals and dues")]
pub struct Cli {
    /// Ledger location: a snapshot file or a redb database
    #[arg(long, global = true, default_value = "spliitz.db")]
    pub db: PathBuf,

    /// Storage backend: "file" or "redb"
    #[arg(long, global = true, default_value = "file")]
    pub backend: String,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an empty ledger
    Init {
        /// Overwrite an existing ledger
        #[arg(long)]
        force: bool,
    },
    /// Show record counts
    Status,
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage groups and membership
    #[command(subcommand)]
    Group(GroupCommand),
    /// Propose, approve and list expenses
    #[command(subcommand)]
    Expense(ExpenseCommand),
    /// Settle dues
    #[command(subcommand)]
    Due(DueCommand),
    /// Net balances and pairwise debts for a group
    Balances {
        #[arg(long)]
        group: u64,
    },
    /// Finish interrupted finalizations and repair dues
    Reconcile,
    /// Write a snapshot of the ledger
    Export {
        #[arg(long, short)]
        output: PathBuf,
        /// "canonical" (binary) or "json"
        #[arg(long, default_value = "canonical")]
        format: String,
    },
    /// Load a canonical snapshot into an empty ledger
    Import {
        #[arg(long, short)]
        input: PathBuf,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Register a user
    Add { name: String },
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// Create a group; the creator becomes its first member
    Create {
        name: String,
        #[arg(long)]
        creator: u64,
    },
    /// Add a registered user to a group
    AddMember {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        actor: u64,
        #[arg(long)]
        user: u64,
    },
    /// Remove a member (self, or by the group creator)
    RemoveMember {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        actor: u64,
        #[arg(long)]
        user: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExpenseCommand {
    /// Propose a new expense
    Propose {
        #[arg(long)]
        group: u64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        payer: u64,
        /// Proposing member; defaults to the payer
        #[arg(long)]
        proposer: Option<u64>,
        /// Total as a decimal, e.g. 42.50
        #[arg(long)]
        total: String,
        /// Split evenly among these members (default: whole group)
        #[arg(long, value_delimiter = ',')]
        members: Vec<u64>,
        /// Exact shares as USER=AMOUNT pairs, e.g. 1=10.00,2=32.50
        #[arg(long, conflicts_with = "members")]
        shares: Option<String>,
    },
    /// Approve your share of a proposal
    Approve {
        id: u64,
        #[arg(long)]
        user: u64,
    },
    /// Withdraw a proposal you made
    Withdraw {
        id: u64,
        #[arg(long)]
        actor: u64,
    },
    /// List a group's expenses with their stage
    List {
        #[arg(long)]
        group: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum DueCommand {
    /// Debtor marks a due as paid
    Pay {
        id: u64,
        #[arg(long)]
        actor: u64,
    },
    /// Creditor confirms a payment arrived
    Confirm {
        id: u64,
        #[arg(long)]
        actor: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_propose_even() {
        let cli = Cli::try_parse_from([
            "spliitz",
            "expense",
            "propose",
            "--group",
            "1",
            "--description",
            "Dinner",
            "--payer",
            "1",
            "--total",
            "30.00",
            "--members",
            "1,2,3",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Expense(ExpenseCommand::Propose { ref members, shares: None, .. })
                if *members == [1, 2, 3]
        ));
    }

    #[test]
    fn test_members_and_shares_conflict() {
        let result = Cli::try_parse_from([
            "spliitz",
            "expense",
            "propose",
            "--group",
            "1",
            "--description",
            "Dinner",
            "--payer",
            "1",
            "--total",
            "30.00",
            "--members",
            "1,2",
            "--shares",
            "1=15,2=15",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["spliitz", "status", "--backend", "redb", "--json"])
            .expect("parse");
        assert_eq!(cli.backend, "redb");
        assert!(cli.json);
    }
}
