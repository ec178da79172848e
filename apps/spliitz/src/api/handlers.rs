//! HTTP handlers.
//!
//! Each handler locks the session, runs one ledger operation and, for
//! writes, persists the ledger before answering.

use super::AppState;
use super::types::*;
use crate::cli::{CliError, now_secs};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use spliitz_core::formats::export_canonical;
use spliitz_core::{
    Amount, DueId, ExpenseDraft, ExpenseId, Group, GroupId, GroupSummary, ReconcileReport,
    Session, SpliitzError, SplitPlan, User, UserId,
};
use std::sync::Arc;
use tracing::error;

// =============================================================================
// ERRORS
// =============================================================================

/// Error body plus status, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<SpliitzError> for ApiError {
    fn from(err: SpliitzError) -> Self {
        use SpliitzError as E;
        let status = match &err {
            E::UserNotFound(_) | E::GroupNotFound(_) | E::ExpenseNotFound(_) | E::DueNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            E::InvalidAmount(_)
            | E::InvalidName(_)
            | E::NoSplits
            | E::DuplicateSplitMember(_)
            | E::NegativeShare(_)
            | E::NonPositiveTotal
            | E::SharesMismatch { .. }
            | E::Overflow => StatusCode::BAD_REQUEST,
            E::NotGroupMember { .. } | E::NotSplitMember { .. } | E::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            E::AlreadyMember { .. }
            | E::GroupFull(_)
            | E::MemberBusy { .. }
            | E::NotAProposal(_)
            | E::NotFinalized(_)
            | E::ApprovalsPending { .. }
            | E::NotPaid(_) => StatusCode::CONFLICT,
            E::Storage(_) | E::Format(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("ledger failure: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<CliError> for ApiError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Ledger(inner) => inner.into(),
            other => {
                error!("failed to persist ledger: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "failed to persist ledger".to_string(),
                }
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn expense_view(session: &Session, expense: spliitz_core::Expense) -> ApiResult<ExpenseView> {
    let stage = session.expense_stage(expense.id)?;
    Ok(ExpenseView { expense, stage })
}

// =============================================================================
// SERVICE
// =============================================================================

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler: GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    let session = state.session.lock().await;
    let counts = session.counts()?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        users: counts.users,
        groups: counts.groups,
        expenses: counts.expenses,
        dues: counts.dues,
        auth_required: state.api_key.is_some(),
    }))
}

// =============================================================================
// USERS AND GROUPS
// =============================================================================

/// Handler: POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let mut session = state.session.lock().await;
    let user = session.create_user(&req.name)?;
    state.persist(&mut session)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler: POST /groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let mut session = state.session.lock().await;
    let group = session.create_group(&req.name, UserId(req.created_by))?;
    state.persist(&mut session)?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Handler: POST /groups/{id}/members
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<Group>> {
    let mut session = state.session.lock().await;
    let group = session.add_member(GroupId(group), UserId(req.actor), UserId(req.user))?;
    state.persist(&mut session)?;
    Ok(Json(group))
}

/// Handler: DELETE /groups/{id}/members/{user}?actor=N
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((group, user)): Path<(u64, u64)>,
    query: Result<Query<ActorQuery>, QueryRejection>,
) -> ApiResult<Json<Group>> {
    let Query(query) = query?;
    let mut session = state.session.lock().await;
    let group = session.remove_member(GroupId(group), UserId(query.actor), UserId(user))?;
    state.persist(&mut session)?;
    Ok(Json(group))
}

// =============================================================================
// EXPENSES
// =============================================================================

/// Handler: GET /groups/{id}/expenses
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
) -> ApiResult<Json<Vec<ExpenseView>>> {
    let session = state.session.lock().await;
    let views = session
        .expenses_in_group(GroupId(group))?
        .into_iter()
        .map(|e| expense_view(&session, e))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(views))
}

/// Handler: POST /groups/{id}/expenses
pub async fn propose_expense(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
    Json(req): Json<ProposeExpenseRequest>,
) -> ApiResult<(StatusCode, Json<ExpenseView>)> {
    let mut session = state.session.lock().await;
    let group_id = GroupId(group);

    let plan = match req.split {
        SplitRequest::Even { members } if members.is_empty() => {
            SplitPlan::Even(session.group(group_id)?.members.into_iter().collect())
        }
        SplitRequest::Even { members } => SplitPlan::Even(members.into_iter().map(UserId).collect()),
        SplitRequest::Exact { shares } => SplitPlan::Exact(
            shares
                .into_iter()
                .map(|s| Ok((UserId(s.user), Amount::parse(&s.amount)?)))
                .collect::<ApiResult<Vec<_>>>()?,
        ),
    };

    let draft = ExpenseDraft {
        group_id,
        description: req.description,
        payer: UserId(req.payer),
        proposed_by: UserId(req.proposed_by.unwrap_or(req.payer)),
        total: Amount::parse(&req.total)?,
        plan,
    };
    let expense = session.propose_expense(draft, now_secs())?;
    state.persist(&mut session)?;
    Ok((StatusCode::CREATED, Json(expense_view(&session, expense)?)))
}

/// Handler: GET /expenses/{id}
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ExpenseDetail>> {
    let session = state.session.lock().await;
    let id = ExpenseId(id);
    let expense = session.expense(id)?;
    let stage = session.expense_stage(id)?;
    let dues = session
        .dues_for_expense(id)?
        .into_iter()
        .map(DueView::from)
        .collect();
    Ok(Json(ExpenseDetail {
        expense,
        stage,
        dues,
    }))
}

/// Handler: POST /expenses/{id}/approve
pub async fn approve_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ApprovalResponse>> {
    let mut session = state.session.lock().await;
    let (expense, outcome) = session.approve_share(ExpenseId(id), UserId(req.actor))?;
    state.persist(&mut session)?;
    Ok(Json(ApprovalResponse {
        expense: expense_view(&session, expense)?,
        outcome,
    }))
}

/// Handler: POST /expenses/{id}/withdraw
pub async fn withdraw_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<spliitz_core::Expense>> {
    let mut session = state.session.lock().await;
    let removed = session.withdraw_proposal(ExpenseId(id), UserId(req.actor))?;
    state.persist(&mut session)?;
    Ok(Json(removed))
}

// =============================================================================
// DUES
// =============================================================================

/// Handler: GET /groups/{id}/dues
pub async fn list_dues(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
) -> ApiResult<Json<Vec<DueView>>> {
    let session = state.session.lock().await;
    let dues = session.dues_in_group(GroupId(group))?;
    Ok(Json(dues.into_iter().map(DueView::from).collect()))
}

/// Handler: POST /dues/{id}/paid
pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<DueView>> {
    let mut session = state.session.lock().await;
    let due = session.mark_paid(DueId(id), UserId(req.actor))?;
    state.persist(&mut session)?;
    Ok(Json(due.into()))
}

/// Handler: POST /dues/{id}/received
pub async fn confirm_received(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<DueView>> {
    let mut session = state.session.lock().await;
    let due = session.confirm_received(DueId(id), UserId(req.actor))?;
    state.persist(&mut session)?;
    Ok(Json(due.into()))
}

// =============================================================================
// VIEWS AND MAINTENANCE
// =============================================================================

/// Handler: GET /groups/{id}/balances
pub async fn balances(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
) -> ApiResult<Json<BalancesResponse>> {
    let session = state.session.lock().await;
    let group_id = GroupId(group);
    Ok(Json(BalancesResponse {
        group_id,
        balances: session.balances(group_id)?,
        debts: session.pairwise(group_id)?,
    }))
}

/// Handler: GET /groups/{id}/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(group): Path<u64>,
) -> ApiResult<Json<GroupSummary>> {
    let session = state.session.lock().await;
    Ok(Json(session.summary(GroupId(group))?))
}

/// Handler: POST /reconcile
pub async fn reconcile(State(state): State<Arc<AppState>>) -> ApiResult<Json<ReconcileReport>> {
    let mut session = state.session.lock().await;
    let report = session.reconcile()?;
    if !report.is_empty() {
        state.persist(&mut session)?;
    }
    Ok(Json(report))
}

/// Handler: GET /export
///
/// The canonical snapshot, base64 encoded.
pub async fn export(State(state): State<Arc<AppState>>) -> ApiResult<Json<ExportResponse>> {
    let session = state.session.lock().await;
    let bytes = export_canonical(session.store())?;
    Ok(Json(ExportResponse {
        format: "canonical".to_string(),
        encoding: "base64".to_string(),
        size: bytes.len(),
        data: STANDARD.encode(&bytes),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "no such route".to_string(),
    }
}
