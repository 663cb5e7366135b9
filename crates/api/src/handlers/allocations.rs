//! Handlers for the `/allocations` resource: funds cascading from a
//! budget to the budget of a direct child tenant.
//!
//! Pending → Approved | Rejected | Cancelled; Approved → Executed |
//! Cancelled. Approval reserves funds on the source budget; execution
//! moves them under row locks on both budgets.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::budget::{self, AllocationParty, AllocationStatus, BudgetStatus};
use crou_core::error::CoreError;
use crou_core::event_types::{
    ENTITY_ALLOCATION, EVT_ALLOCATION_APPROVED, EVT_ALLOCATION_CANCELLED,
    EVT_ALLOCATION_EXECUTED, EVT_ALLOCATION_REJECTED, EVT_ALLOCATION_REQUESTED,
};
use crou_core::roles::{
    PERM_ALLOCATION_APPROVE, PERM_ALLOCATION_EXECUTE, PERM_ALLOCATION_REQUEST, PERM_BUDGET_READ,
};
use crou_core::status::{ensure_transition, StatusEnum};
use crou_core::types::{Amount, DbId};
use crou_db::models::budget::{Budget, BudgetAllocation, CreateAllocation};
use crou_db::repositories::{AllocationRepo, BudgetRepo, TenantRepo};
use crou_events::PlatformEvent;
use serde::Deserialize;
use validator::Validate;

use super::budgets::DecisionRequest;
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::parse_status_filter;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocationRequest {
    pub source_budget_id: DbId,
    pub target_budget_id: DbId,
    pub amount: Amount,
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub purpose: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationListParams {
    pub tenant_id: Option<DbId>,
    pub budget_id: Option<DbId>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/allocations
///
/// Either side may file the request: the caller must see the target
/// budget, which is the case for users of the source tenant too.
pub async fn create_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateAllocationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BudgetAllocation>>)> {
    scope.require(&state.pool, PERM_ALLOCATION_REQUEST).await?;
    input.validate()?;
    budget::validate_positive_amount(input.amount)?;

    let target = super::budgets::find_budget_in_scope(&state, &scope, input.target_budget_id).await?;
    let source = BudgetRepo::find_by_id(&state.pool, input.source_budget_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Budget",
            id: input.source_budget_id,
        }))?;

    let source_party = party(&state, &source).await?;
    let target_party = party(&state, &target).await?;
    budget::validate_allocation_route(&source_party, &target_party)?;

    // Fail early; approval re-checks under a lock.
    let mut conn = state.pool.acquire().await?;
    let reserved = BudgetRepo::reserved_amount(&mut conn, source.id, None).await?;
    drop(conn);
    budget::check_availability(&source.amounts(), reserved, input.amount)?;

    let create_dto = CreateAllocation {
        source_budget_id: source.id,
        target_budget_id: target.id,
        amount: input.amount,
        purpose: input.purpose,
        requested_by: Some(scope.user_id()),
    };
    let created = AllocationRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(
        allocation_id = created.id,
        source_budget_id = source.id,
        target_budget_id = target.id,
        amount = created.amount,
        actor = scope.user_id(),
        "Allocation requested"
    );
    publish(&state, &scope, EVT_ALLOCATION_REQUESTED, &created, source.tenant_id, None);

    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/allocations
pub async fn list_allocations(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<AllocationListParams>,
) -> AppResult<Json<DataResponse<Vec<BudgetAllocation>>>> {
    scope.require(&state.pool, PERM_BUDGET_READ).await?;
    let status = parse_status_filter::<AllocationStatus>(params.status.as_deref())?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let allocations =
        AllocationRepo::list(&state.pool, &path, params.budget_id, status, limit, offset).await?;
    Ok(Json(DataResponse::new(allocations)))
}

/// GET /api/allocations/{id}
pub async fn get_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetAllocation>>> {
    scope.require(&state.pool, PERM_BUDGET_READ).await?;
    let (allocation, _, _) = load_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(allocation)))
}

/// POST /api/allocations/{id}/approve
///
/// Reserves the amount on the source budget. Approvals of the same source
/// serialize on its row lock, so reservations never exceed availability.
pub async fn approve_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetAllocation>>> {
    scope.require(&state.pool, PERM_ALLOCATION_APPROVE).await?;
    let (allocation, source, target) = load_in_scope(&state, &scope, id).await?;
    ensure_source_side(&state, &scope, &source, id).await?;
    ensure_transition(allocation.status()?, AllocationStatus::Approved)?;

    let mut tx = state.pool.begin().await?;
    let (source, _) = lock_budget_pair(&mut tx, source.id, target.id).await?;
    let reserved = BudgetRepo::reserved_amount(&mut tx, source.id, Some(id)).await?;
    budget::check_availability(&source.amounts(), reserved, allocation.amount)?;

    let updated = AllocationRepo::transition(
        &mut *tx,
        id,
        AllocationStatus::Pending,
        AllocationStatus::Approved,
        scope.user_id(),
        None,
    )
    .await?
    .ok_or_else(concurrent_change)?;
    tx.commit().await?;

    log_transition(&updated, AllocationStatus::Pending, scope.user_id());
    publish(&state, &scope, EVT_ALLOCATION_APPROVED, &updated, source.tenant_id, None);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/allocations/{id}/reject
pub async fn reject_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<DecisionRequest>,
) -> AppResult<Json<DataResponse<BudgetAllocation>>> {
    scope.require(&state.pool, PERM_ALLOCATION_APPROVE).await?;
    let reason = budget::validate_rejection_reason(input.reason.as_deref())?;
    let (allocation, source, target) = load_in_scope(&state, &scope, id).await?;
    ensure_source_side(&state, &scope, &source, id).await?;

    let from = allocation.status()?;
    ensure_transition(from, AllocationStatus::Rejected)?;
    let updated = AllocationRepo::transition(
        &state.pool,
        id,
        from,
        AllocationStatus::Rejected,
        scope.user_id(),
        Some(&reason),
    )
    .await?
    .ok_or_else(concurrent_change)?;

    log_transition(&updated, from, scope.user_id());
    publish(&state, &scope, EVT_ALLOCATION_REJECTED, &updated, target.tenant_id, Some(&reason));
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/allocations/{id}/execute
///
/// Moves the funds: the source's `allocated` and the target's `received`
/// grow by the amount, in one transaction holding both budget rows.
pub async fn execute_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetAllocation>>> {
    scope.require(&state.pool, PERM_ALLOCATION_EXECUTE).await?;
    let (_, source, _) = load_in_scope(&state, &scope, id).await?;
    ensure_source_side(&state, &scope, &source, id).await?;

    let mut tx = state.pool.begin().await?;
    let allocation = AllocationRepo::lock(&mut tx, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Allocation", id }))?;
    ensure_transition(allocation.status()?, AllocationStatus::Executed)?;

    let (source, target) = lock_budget_pair(
        &mut tx,
        allocation.source_budget_id,
        allocation.target_budget_id,
    )
    .await?;
    let reserved = BudgetRepo::reserved_amount(&mut tx, source.id, Some(id)).await?;
    budget::check_availability(&source.amounts(), reserved, allocation.amount)?;

    BudgetRepo::transfer(&mut tx, source.id, target.id, allocation.amount).await?;
    let updated = AllocationRepo::transition(
        &mut *tx,
        id,
        AllocationStatus::Approved,
        AllocationStatus::Executed,
        scope.user_id(),
        None,
    )
    .await?
    .ok_or_else(concurrent_change)?;
    let target_tenant = target.tenant_id;
    tx.commit().await?;

    log_transition(&updated, AllocationStatus::Approved, scope.user_id());
    publish(&state, &scope, EVT_ALLOCATION_EXECUTED, &updated, target_tenant, None);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/allocations/{id}/cancel
pub async fn cancel_allocation(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetAllocation>>> {
    scope.require(&state.pool, PERM_ALLOCATION_REQUEST).await?;
    let (allocation, source, _) = load_in_scope(&state, &scope, id).await?;

    let from = allocation.status()?;
    ensure_transition(from, AllocationStatus::Cancelled)?;
    let updated = AllocationRepo::transition(
        &state.pool,
        id,
        from,
        AllocationStatus::Cancelled,
        scope.user_id(),
        None,
    )
    .await?
    .ok_or_else(concurrent_change)?;

    log_transition(&updated, from, scope.user_id());
    publish(&state, &scope, EVT_ALLOCATION_CANCELLED, &updated, source.tenant_id, None);
    Ok(Json(DataResponse::new(updated)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load an allocation with its two budgets. Visible when the target budget
/// is in scope (which includes every user of the source tenant).
async fn load_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<(BudgetAllocation, Budget, Budget)> {
    let not_found = || AppError::Core(CoreError::NotFound { entity: "Allocation", id });
    let allocation = AllocationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;
    let target = BudgetRepo::find_by_id(&state.pool, allocation.target_budget_id)
        .await?
        .ok_or_else(not_found)?;
    scope
        .ensure_owned(&state.pool, target.tenant_id, "Allocation", id)
        .await?;
    let source = BudgetRepo::find_by_id(&state.pool, allocation.source_budget_id)
        .await?
        .ok_or_else(not_found)?;
    Ok((allocation, source, target))
}

/// Deciding on or executing an allocation is the source tenant's call.
async fn ensure_source_side(
    state: &AppState,
    scope: &TenantScope,
    source: &Budget,
    id: DbId,
) -> AppResult<()> {
    match scope
        .ensure_owned(&state.pool, source.tenant_id, "Allocation", id)
        .await
    {
        Err(AppError::Core(CoreError::NotFound { .. })) => Err(AppError::Core(
            CoreError::Forbidden("Only the source tenant can decide on this allocation".into()),
        )),
        other => other,
    }
}

async fn party(state: &AppState, found: &Budget) -> AppResult<AllocationParty> {
    let owner = TenantRepo::find_by_id(&state.pool, found.tenant_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Tenant",
            id: found.tenant_id,
        }))?;
    Ok(AllocationParty {
        budget_id: found.id,
        tenant_id: owner.id,
        tenant_type: owner.kind()?,
        parent_tenant_id: owner.parent_id,
        fiscal_year: found.fiscal_year,
        status: found.status()?,
    })
}

/// Lock both budgets of an allocation, in id order so two requests
/// touching the same pair cannot deadlock, and require both to be approved.
/// Returns `(source, target)`.
async fn lock_budget_pair(
    conn: &mut sqlx::PgConnection,
    source_id: DbId,
    target_id: DbId,
) -> AppResult<(Budget, Budget)> {
    let (first, second) = if source_id < target_id {
        (source_id, target_id)
    } else {
        (target_id, source_id)
    };
    let mut locked = Vec::with_capacity(2);
    for budget_id in [first, second] {
        let row = BudgetRepo::lock(&mut *conn, budget_id).await?.ok_or(AppError::Core(
            CoreError::NotFound { entity: "Budget", id: budget_id },
        ))?;
        if row.status()? != BudgetStatus::Approved {
            return Err(budget_not_approved(&row));
        }
        locked.push(row);
    }
    let second = locked.pop();
    let first = locked.pop();
    match (first, second) {
        (Some(a), Some(b)) if a.id == source_id => Ok((a, b)),
        (Some(a), Some(b)) => Ok((b, a)),
        _ => Err(AppError::InternalError("Locked budget missing".into())),
    }
}

fn budget_not_approved(found: &Budget) -> AppError {
    let label = found.status().map(|s| s.as_str()).unwrap_or("unknown");
    AppError::Core(CoreError::Conflict(format!(
        "Budget {} must be approved (currently '{label}')",
        found.id
    )))
}

fn concurrent_change() -> AppError {
    AppError::Core(CoreError::Conflict(
        "Allocation status changed concurrently; reload and retry".into(),
    ))
}

fn log_transition(allocation: &BudgetAllocation, from: AllocationStatus, actor: DbId) {
    let to = allocation.status().map(|s| s.as_str()).unwrap_or("unknown");
    tracing::info!(
        allocation_id = allocation.id,
        from = from.as_str(),
        to,
        amount = allocation.amount,
        actor,
        "Allocation status changed"
    );
}

fn publish(
    state: &AppState,
    scope: &TenantScope,
    event_type: &str,
    allocation: &BudgetAllocation,
    tenant_id: DbId,
    reason: Option<&str>,
) {
    state.publish(
        PlatformEvent::new(event_type)
            .with_source(ENTITY_ALLOCATION, allocation.id)
            .with_actor(scope.user_id())
            .with_tenant(tenant_id)
            .with_payload(serde_json::json!({
                "sourceBudgetId": allocation.source_budget_id,
                "targetBudgetId": allocation.target_budget_id,
                "amount": allocation.amount,
                "reason": reason,
            })),
    );
}
