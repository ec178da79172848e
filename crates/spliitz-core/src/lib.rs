//! # Spliitz Core
//!
//! The deterministic expense ledger behind Spliitz.
//!
//! A group of users records shared expenses. Each expense starts as a
//! proposal; once every split member has approved their share it is
//! finalized and one due is generated per non-payer member. Dues are then
//! marked paid by the debtor and confirmed by the creditor.
//!
//! ## Layout
//!
//! - [`money`]: integer-cent amounts and even splitting
//! - [`model`]: users and groups
//! - [`expense`] / [`due`]: the stored records
//! - [`workflow`]: pure state transitions over those records
//! - [`ledger`]: the `LedgerStore` seam and its in-memory implementation
//! - [`storage`]: the redb-backed implementation
//! - [`session`]: the operations clients call
//! - [`balance`] / [`reconcile`]: derived views and the repair sweep
//! - [`formats`]: canonical snapshot encoding
//!
//! Nothing here is async, reads the clock or uses floating point.

pub mod balance;
pub mod due;
pub mod expense;
pub mod formats;
pub mod ledger;
pub mod model;
pub mod money;
pub mod primitives;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod workflow;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use balance::{Balance, GroupSummary, PairwiseDebt};
pub use due::{Due, DueStage};
pub use expense::{Expense, ExpenseDraft, Split, SplitPlan};
pub use ledger::{Ledger, LedgerStore};
pub use model::{Group, User};
pub use money::Amount;
pub use reconcile::ReconcileReport;
pub use session::Session;
pub use storage::RedbLedger;
pub use workflow::{ApprovalOutcome, ExpenseStage};

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifier of a registered user.
    UserId,
    "user#"
);
id_type!(
    /// Identifier of a group.
    GroupId,
    "group#"
);
id_type!(
    /// Identifier of an expense (proposal or finalized).
    ExpenseId,
    "expense#"
);
id_type!(
    /// Identifier of a due.
    DueId,
    "due#"
);

// =============================================================================
// ERRORS
// =============================================================================

/// Every failure the ledger can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliitzError {
    #[error("{0} not found")]
    UserNotFound(UserId),

    #[error("{0} not found")]
    GroupNotFound(GroupId),

    #[error("{0} not found")]
    ExpenseNotFound(ExpenseId),

    #[error("{0} not found")]
    DueNotFound(DueId),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("{user} is not a member of {group}")]
    NotGroupMember { group: GroupId, user: UserId },

    #[error("{user} is already a member of {group}")]
    AlreadyMember { group: GroupId, user: UserId },

    #[error("{0} has reached the member limit")]
    GroupFull(GroupId),

    #[error("{user} still has open proposals or unsettled dues in {group}")]
    MemberBusy { group: GroupId, user: UserId },

    #[error("an expense needs at least one split")]
    NoSplits,

    #[error("{0} appears more than once in the split")]
    DuplicateSplitMember(UserId),

    #[error("share for {0} is negative")]
    NegativeShare(UserId),

    #[error("expense total must be positive")]
    NonPositiveTotal,

    #[error("shares sum to {sum} but the total is {total}")]
    SharesMismatch { total: Amount, sum: Amount },

    #[error("{user} has no share in {expense}")]
    NotSplitMember { expense: ExpenseId, user: UserId },

    #[error("{0} is already finalized")]
    NotAProposal(ExpenseId),

    #[error("{0} has not been finalized")]
    NotFinalized(ExpenseId),

    #[error("{expense} still has {pending} unapproved share(s)")]
    ApprovalsPending { expense: ExpenseId, pending: usize },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} has not been marked paid")]
    NotPaid(DueId),

    #[error("amount overflow")]
    Overflow,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("format error: {0}")]
    Format(String),
}

impl SpliitzError {
    /// True for the "record does not exist" family of errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::GroupNotFound(_)
                | Self::ExpenseNotFound(_)
                | Self::DueNotFound(_)
        )
    }
}

impl From<redb::Error> for SpliitzError {
    fn from(err: redb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<postcard::Error> for SpliitzError {
    fn from(err: postcard::Error) -> Self {
        Self::Format(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SpliitzError>;
