//! Handlers for the `/budgets` resource and its approval workflow.
//!
//! Draft → Submitted → Approved | Rejected; Rejected → Draft (revise);
//! Approved → Closed. Every transition is a conditional update, so a
//! concurrent change surfaces as 409 Conflict.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::budget::{self, BudgetStatus};
use crou_core::error::CoreError;
use crou_core::event_types::{
    ENTITY_BUDGET, EVT_BUDGET_APPROVED, EVT_BUDGET_CLOSED, EVT_BUDGET_REJECTED,
    EVT_BUDGET_SUBMITTED,
};
use crou_core::roles::{PERM_BUDGET_APPROVE, PERM_BUDGET_READ, PERM_BUDGET_WRITE};
use crou_core::status::{ensure_transition, StatusEnum};
use crou_core::types::{Amount, DbId};
use crou_db::models::budget::{Budget, BudgetView, CreateBudget, UpdateBudget};
use crou_db::repositories::BudgetRepo;
use crou_events::PlatformEvent;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::parse_status_filter;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetRequest {
    /// Defaults to the caller's tenant.
    pub tenant_id: Option<DbId>,
    pub fiscal_year: i32,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: String,
    pub initial_amount: Amount,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: Option<String>,
    pub initial_amount: Option<Amount>,
}

/// Body of reject endpoints across the finance workflow.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetListParams {
    pub tenant_id: Option<DbId>,
    pub fiscal_year: Option<i32>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/budgets
pub async fn create_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateBudgetRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BudgetView>>)> {
    scope.require(&state.pool, PERM_BUDGET_WRITE).await?;
    input.validate()?;
    budget::validate_fiscal_year(input.fiscal_year)?;
    budget::validate_initial_amount(input.initial_amount)?;

    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateBudget {
        tenant_id: owner.id,
        fiscal_year: input.fiscal_year,
        title: input.title,
        initial_amount: input.initial_amount,
        created_by: Some(scope.user_id()),
    };
    let created = BudgetRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(
        budget_id = created.id,
        tenant_id = owner.id,
        fiscal_year = created.fiscal_year,
        actor = scope.user_id(),
        "Budget created"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(BudgetView::new(created, 0))),
    ))
}

/// GET /api/budgets
pub async fn list_budgets(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<BudgetListParams>,
) -> AppResult<Json<DataResponse<Vec<BudgetView>>>> {
    scope.require(&state.pool, PERM_BUDGET_READ).await?;
    let status = parse_status_filter::<BudgetStatus>(params.status.as_deref())?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);

    let budgets =
        BudgetRepo::list(&state.pool, &path, params.fiscal_year, status, limit, offset).await?;

    // One query for all reserved amounts instead of one per budget.
    let ids: Vec<DbId> = budgets.iter().map(|b| b.id).collect();
    let reserved: HashMap<DbId, Amount> = BudgetRepo::reserved_amounts(&state.pool, &ids)
        .await?
        .into_iter()
        .collect();

    let views = budgets
        .into_iter()
        .map(|b| {
            let r = reserved.get(&b.id).copied().unwrap_or(0);
            BudgetView::new(b, r)
        })
        .collect();
    Ok(Json(DataResponse::new(views)))
}

/// GET /api/budgets/{id}
pub async fn get_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_READ).await?;
    let found = find_budget_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(view(&state, found).await?)))
}

/// PUT /api/budgets/{id}
///
/// Only draft or rejected budgets can be edited.
pub async fn update_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateBudgetRequest>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_WRITE).await?;
    input.validate()?;
    if let Some(amount) = input.initial_amount {
        budget::validate_initial_amount(amount)?;
    }

    let found = find_budget_in_scope(&state, &scope, id).await?;
    let status = found.status()?;
    if !status.is_editable() {
        return Err(not_editable(status));
    }

    let update_dto = UpdateBudget {
        title: input.title,
        initial_amount: input.initial_amount,
    };
    let updated = BudgetRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Conflict("Budget is no longer editable".into())))?;

    tracing::info!(budget_id = id, actor = scope.user_id(), "Budget updated");
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// POST /api/budgets/{id}/submit
pub async fn submit_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_WRITE).await?;
    let updated = transition(&state, &scope, id, BudgetStatus::Submitted, None).await?;
    publish(&state, &scope, EVT_BUDGET_SUBMITTED, &updated, None);
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

/// POST /api/budgets/{id}/approve
pub async fn approve_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_APPROVE).await?;
    let updated = transition(&state, &scope, id, BudgetStatus::Approved, None).await?;
    publish(&state, &scope, EVT_BUDGET_APPROVED, &updated, None);
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

/// POST /api/budgets/{id}/reject
pub async fn reject_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<DecisionRequest>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_APPROVE).await?;
    let reason = budget::validate_rejection_reason(input.reason.as_deref())?;
    let updated = transition(&state, &scope, id, BudgetStatus::Rejected, Some(&reason)).await?;
    publish(&state, &scope, EVT_BUDGET_REJECTED, &updated, Some(&reason));
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

/// POST /api/budgets/{id}/close
pub async fn close_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_APPROVE).await?;
    let updated = transition(&state, &scope, id, BudgetStatus::Closed, None).await?;
    publish(&state, &scope, EVT_BUDGET_CLOSED, &updated, None);
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

/// POST /api/budgets/{id}/revise
///
/// Send a rejected budget back to draft so it can be edited and resubmitted.
pub async fn revise_budget(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BudgetView>>> {
    scope.require(&state.pool, PERM_BUDGET_WRITE).await?;
    let updated = transition(&state, &scope, id, BudgetStatus::Draft, None).await?;
    Ok(Json(DataResponse::new(view(&state, updated).await?)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn find_budget_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<Budget> {
    let found = BudgetRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Budget", id }))?;
    scope
        .ensure_owned(&state.pool, found.tenant_id, "Budget", id)
        .await?;
    Ok(found)
}

async fn transition(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
    to: BudgetStatus,
    reason: Option<&str>,
) -> AppResult<Budget> {
    let found = find_budget_in_scope(state, scope, id).await?;
    let from = found.status()?;
    ensure_transition(from, to)?;

    let updated = BudgetRepo::transition(&state.pool, id, from, to, scope.user_id(), reason)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Budget status changed concurrently; reload and retry".into(),
            ))
        })?;

    tracing::info!(
        budget_id = id,
        from = from.as_str(),
        to = to.as_str(),
        actor = scope.user_id(),
        "Budget status changed"
    );
    Ok(updated)
}

async fn view(state: &AppState, found: Budget) -> AppResult<BudgetView> {
    let reserved = BudgetRepo::reserved_amounts(&state.pool, &[found.id])
        .await?
        .first()
        .map(|(_, amount)| *amount)
        .unwrap_or(0);
    Ok(BudgetView::new(found, reserved))
}

fn not_editable(status: BudgetStatus) -> AppError {
    AppError::Core(CoreError::Conflict(format!(
        "Budget cannot be edited while '{}'",
        status.as_str()
    )))
}

fn publish(
    state: &AppState,
    scope: &TenantScope,
    event_type: &str,
    found: &Budget,
    reason: Option<&str>,
) {
    state.publish(
        PlatformEvent::new(event_type)
            .with_source(ENTITY_BUDGET, found.id)
            .with_actor(scope.user_id())
            .with_tenant(found.tenant_id)
            .with_payload(serde_json::json!({
                "title": found.title,
                "fiscalYear": found.fiscal_year,
                "reason": reason,
            })),
    );
}
