//! Request and response bodies for the HTTP API.
//!
//! Amounts in requests are decimal strings (`"12.50"`); amounts in
//! responses are integer cents.

use serde::{Deserialize, Serialize};
use spliitz_core::balance::{Balance, PairwiseDebt};
use spliitz_core::{ApprovalOutcome, Due, DueStage, Expense, ExpenseStage, GroupId};

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub created_by: u64,
}

/// `actor` adds `user` to the group.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub actor: u64,
    pub user: u64,
}

/// The member performing an action on an expense or due.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: u64,
}

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor: u64,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub user: u64,
    pub amount: String,
}

/// How to divide the total.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitRequest {
    /// Equal shares among `members`, or the whole group when empty.
    Even {
        #[serde(default)]
        members: Vec<u64>,
    },
    Exact {
        shares: Vec<ShareRequest>,
    },
}

impl Default for SplitRequest {
    fn default() -> Self {
        SplitRequest::Even {
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProposeExpenseRequest {
    pub description: String,
    pub payer: u64,
    /// Defaults to the payer.
    #[serde(default)]
    pub proposed_by: Option<u64>,
    pub total: String,
    #[serde(default)]
    pub split: SplitRequest,
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub users: usize,
    pub groups: usize,
    pub expenses: usize,
    pub dues: usize,
    pub auth_required: bool,
}

/// An expense with its derived lifecycle stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseView {
    #[serde(flatten)]
    pub expense: Expense,
    pub stage: ExpenseStage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseDetail {
    #[serde(flatten)]
    pub expense: Expense,
    pub stage: ExpenseStage,
    pub dues: Vec<DueView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub expense: ExpenseView,
    pub outcome: ApprovalOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DueView {
    #[serde(flatten)]
    pub due: Due,
    pub stage: DueStage,
}

impl From<Due> for DueView {
    fn from(due: Due) -> Self {
        let stage = due.stage();
        Self { due, stage }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub group_id: GroupId,
    pub balances: Vec<Balance>,
    pub debts: Vec<PairwiseDebt>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub format: String,
    pub encoding: String,
    pub size: usize,
    pub data: String,
}
