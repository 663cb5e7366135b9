//! Handlers for budget transactions (expenses recorded against a budget).
//!
//! An expense is recorded as pending and only counts towards `spent` once
//! validated, which happens under a lock on the budget row.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use crou_core::budget::{self, BudgetStatus, TransactionStatus};
use crou_core::error::CoreError;
use crou_core::event_types::{ENTITY_TRANSACTION, EVT_TRANSACTION_REJECTED, EVT_TRANSACTION_VALIDATED};
use crou_core::roles::{PERM_BUDGET_READ, PERM_TRANSACTION_VALIDATE, PERM_TRANSACTION_WRITE};
use crou_core::status::StatusEnum;
use crou_core::types::{Amount, DbId};
use crou_db::models::budget::{BudgetTransaction, CreateTransaction};
use crou_db::repositories::{BudgetRepo, TransactionRepo};
use crou_events::PlatformEvent;
use serde::Deserialize;
use validator::Validate;

use super::budgets::{find_budget_in_scope, DecisionRequest};
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub amount: Amount,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub category: String,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub reference: Option<String>,
    pub transaction_date: Option<NaiveDate>,
}

/// POST /api/budgets/{id}/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(budget_id): Path<DbId>,
    Json(input): Json<CreateTransactionRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BudgetTransaction>>)> {
    scope.require(&state.pool, PERM_TRANSACTION_WRITE).await?;
    input.validate()?;
    budget::validate_positive_amount(input.amount)?;

    let found = find_budget_in_scope(&state, &scope, budget_id).await?;
    let status = found.status()?;
    if status != BudgetStatus::Approved {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Expenses can only be recorded on an approved budget (currently '{}')",
            status.as_str()
        ))));
    }

    let create_dto = CreateTransaction {
        budget_id,
        amount: input.amount,
        category: input.category,
        description: input.description,
        reference: input.reference,
        transaction_date: input.transaction_date,
        created_by: Some(scope.user_id()),
    };
    let created = TransactionRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(
        transaction_id = created.id,
        budget_id,
        amount = created.amount,
        actor = scope.user_id(),
        "Transaction recorded"
    );
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/budgets/{id}/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(budget_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<BudgetTransaction>>>> {
    scope.require(&state.pool, PERM_BUDGET_READ).await?;
    find_budget_in_scope(&state, &scope, budget_id).await?;
    let (limit, offset) = params.page();
    let rows = TransactionRepo::list_for_budget(&state.pool, budget_id, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// POST /api/transactions/{id}/validate
///
/// Counts the expense against the budget. Funds reserved by approved
/// allocations are not spendable.
pub async fn validate_transaction(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetTransaction>>> {
    scope.require(&state.pool, PERM_TRANSACTION_VALIDATE).await?;
    let pending = find_pending_in_scope(&state, &scope, id).await?;

    let mut tx = state.pool.begin().await?;
    let locked_budget = BudgetRepo::lock(&mut tx, pending.budget_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Budget",
            id: pending.budget_id,
        }))?;
    if locked_budget.status()? != BudgetStatus::Approved {
        return Err(AppError::Core(CoreError::Conflict(
            "The budget is no longer approved".into(),
        )));
    }
    let transaction = TransactionRepo::lock(&mut tx, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Transaction", id }))?;
    if transaction.status()? != TransactionStatus::Pending {
        return Err(not_pending(transaction.status()?));
    }

    let reserved = BudgetRepo::reserved_amount(&mut tx, locked_budget.id, None).await?;
    budget::check_availability(&locked_budget.amounts(), reserved, transaction.amount)?;

    BudgetRepo::add_spent(&mut tx, locked_budget.id, transaction.amount).await?;
    let updated = TransactionRepo::decide(
        &mut *tx,
        id,
        TransactionStatus::Validated,
        scope.user_id(),
        None,
    )
    .await?
    .ok_or_else(decided_concurrently)?;
    tx.commit().await?;

    tracing::info!(
        transaction_id = id,
        budget_id = locked_budget.id,
        amount = updated.amount,
        actor = scope.user_id(),
        "Transaction validated"
    );
    publish(&state, &scope, EVT_TRANSACTION_VALIDATED, &updated, locked_budget.tenant_id, None);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/transactions/{id}/reject
pub async fn reject_transaction(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<DecisionRequest>,
) -> AppResult<Json<DataResponse<BudgetTransaction>>> {
    scope.require(&state.pool, PERM_TRANSACTION_VALIDATE).await?;
    let reason = budget::validate_rejection_reason(input.reason.as_deref())?;
    let pending = find_pending_in_scope(&state, &scope, id).await?;
    let owner = BudgetRepo::find_by_id(&state.pool, pending.budget_id)
        .await?
        .map(|b| b.tenant_id)
        .unwrap_or(scope.tenant.id);

    let updated = TransactionRepo::decide(
        &state.pool,
        id,
        TransactionStatus::Rejected,
        scope.user_id(),
        Some(&reason),
    )
    .await?
    .ok_or_else(decided_concurrently)?;

    tracing::info!(transaction_id = id, actor = scope.user_id(), "Transaction rejected");
    publish(&state, &scope, EVT_TRANSACTION_REJECTED, &updated, owner, Some(&reason));
    Ok(Json(DataResponse::new(updated)))
}

async fn find_pending_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<BudgetTransaction> {
    let transaction = TransactionRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Transaction", id }))?;
    let owner = BudgetRepo::find_by_id(&state.pool, transaction.budget_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Transaction", id }))?;
    scope
        .ensure_owned(&state.pool, owner.tenant_id, "Transaction", id)
        .await?;
    let status = transaction.status()?;
    if status != TransactionStatus::Pending {
        return Err(not_pending(status));
    }
    Ok(transaction)
}

fn not_pending(status: TransactionStatus) -> AppError {
    AppError::Core(CoreError::Conflict(format!(
        "Transaction is no longer pending ('{}')",
        status.as_str()
    )))
}

fn decided_concurrently() -> AppError {
    AppError::Core(CoreError::Conflict(
        "Transaction was decided concurrently; reload and retry".into(),
    ))
}

fn publish(
    state: &AppState,
    scope: &TenantScope,
    event_type: &str,
    transaction: &BudgetTransaction,
    tenant_id: DbId,
    reason: Option<&str>,
) {
    state.publish(
        PlatformEvent::new(event_type)
            .with_source(ENTITY_TRANSACTION, transaction.id)
            .with_actor(scope.user_id())
            .with_tenant(tenant_id)
            .with_payload(serde_json::json!({
                "budgetId": transaction.budget_id,
                "amount": transaction.amount,
                "category": transaction.category,
                "reason": reason,
            })),
    );
}
