//! Handlers for the `/tenants` resource (ministry / region / CROU tree).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::error::CoreError;
use crou_core::roles::{is_super_admin, PERM_TENANTS_MANAGE, PERM_TENANTS_READ};
use crou_core::tenant::{self, TenantType};
use crou_core::types::DbId;
use crou_db::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use crou_db::repositories::TenantRepo;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /tenants`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub tenant_type: String,
    pub parent_id: Option<DbId>,
    pub service_type: Option<String>,
}

/// Request body for `PUT /tenants/{id}`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    pub service_type: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantListParams {
    #[serde(rename = "type")]
    pub tenant_type: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/tenants
///
/// A ministry (root) may only be created by a super admin; regions and
/// CROUs are attached under a parent in the caller's subtree.
pub async fn create_tenant(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateTenantRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Tenant>>)> {
    scope.require(&state.pool, PERM_TENANTS_MANAGE).await?;
    input.validate()?;

    let code = input.code.trim().to_uppercase();
    tenant::validate_code(&code)?;
    tenant::validate_service_type(input.service_type.as_deref())?;
    let tenant_type = TenantType::parse(&input.tenant_type)?;

    let parent = match input.parent_id {
        Some(parent_id) => Some(scope.tenant_in_scope(&state.pool, parent_id).await?),
        None => None,
    };
    let parent_type = parent.as_ref().map(Tenant::kind).transpose()?;
    tenant::validate_parent(tenant_type, parent_type)?;

    if parent.is_none() && !is_super_admin(&scope.user.role) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only a super admin can create a ministry".into(),
        )));
    }
    if let Some(p) = &parent {
        if !p.is_active {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Parent tenant '{}' is deactivated",
                p.code
            ))));
        }
    }

    let create_dto = CreateTenant {
        code,
        name: input.name,
        tenant_type,
        parent_id: parent.as_ref().map(|p| p.id),
        parent_path: parent.map(|p| p.path),
        service_type: input.service_type,
    };

    let created = TenantRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(
        tenant_id = created.id,
        code = %created.code,
        tenant_type = %created.tenant_type,
        actor = scope.user_id(),
        "Tenant created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/tenants
pub async fn list_tenants(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<TenantListParams>,
) -> AppResult<Json<DataResponse<Vec<Tenant>>>> {
    scope.require(&state.pool, PERM_TENANTS_READ).await?;
    if let Some(t) = params.tenant_type.as_deref() {
        TenantType::parse(t)?;
    }
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let tenants = TenantRepo::list(
        &state.pool,
        scope.path(),
        params.tenant_type.as_deref(),
        params.include_inactive,
        limit,
        offset,
    )
    .await?;
    Ok(Json(DataResponse::new(tenants)))
}

/// GET /api/tenants/{id}
pub async fn get_tenant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Tenant>>> {
    scope.require(&state.pool, PERM_TENANTS_READ).await?;
    let found = scope.tenant_in_scope(&state.pool, id).await?;
    Ok(Json(DataResponse::new(found)))
}

/// PUT /api/tenants/{id}
pub async fn update_tenant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTenantRequest>,
) -> AppResult<Json<DataResponse<Tenant>>> {
    scope.require(&state.pool, PERM_TENANTS_MANAGE).await?;
    input.validate()?;
    tenant::validate_service_type(input.service_type.as_deref())?;
    scope.tenant_in_scope(&state.pool, id).await?;

    if input.is_active == Some(false) {
        ensure_deactivatable(&state, &scope, id).await?;
    }

    let update_dto = UpdateTenant {
        name: input.name,
        service_type: input.service_type,
        is_active: input.is_active,
    };
    let updated = TenantRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Tenant", id }))?;

    tracing::info!(tenant_id = id, actor = scope.user_id(), "Tenant updated");
    Ok(Json(DataResponse::new(updated)))
}

/// DELETE /api/tenants/{id}
///
/// Soft-deactivate. Refused while the tenant still has active children.
pub async fn deactivate_tenant(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_TENANTS_MANAGE).await?;
    scope.tenant_in_scope(&state.pool, id).await?;
    ensure_deactivatable(&state, &scope, id).await?;

    if !TenantRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Tenant is already inactive".into(),
        )));
    }
    tracing::info!(tenant_id = id, actor = scope.user_id(), "Tenant deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tenants/{id}/children
pub async fn list_children(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Tenant>>>> {
    scope.require(&state.pool, PERM_TENANTS_READ).await?;
    scope.tenant_in_scope(&state.pool, id).await?;
    let children = TenantRepo::children(&state.pool, id).await?;
    Ok(Json(DataResponse::new(children)))
}

/// GET /api/tenants/{id}/descendants
pub async fn list_descendants(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Tenant>>>> {
    scope.require(&state.pool, PERM_TENANTS_READ).await?;
    let root = scope.tenant_in_scope(&state.pool, id).await?;
    let descendants = TenantRepo::descendants(&state.pool, &root.path).await?;
    Ok(Json(DataResponse::new(descendants)))
}

/// GET /api/tenants/{id}/ancestors
///
/// Ancestors from the root down, excluding the tenant itself. Ancestors
/// above the caller's own tenant are included: the chain of command is
/// visible to everyone below it.
pub async fn list_ancestors(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Tenant>>>> {
    scope.require(&state.pool, PERM_TENANTS_READ).await?;
    let found = scope.tenant_in_scope(&state.pool, id).await?;
    let ids: Vec<DbId> = tenant::path_ids(&found.path)
        .into_iter()
        .filter(|&ancestor| ancestor != found.id)
        .collect();
    let ancestors = TenantRepo::find_many(&state.pool, &ids).await?;
    Ok(Json(DataResponse::new(ancestors)))
}

async fn ensure_deactivatable(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<()> {
    if id == scope.tenant.id {
        return Err(AppError::Core(CoreError::Conflict(
            "You cannot deactivate your own tenant".into(),
        )));
    }
    let active_children = TenantRepo::count_active_children(&state.pool, id).await?;
    if active_children > 0 {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Tenant has {active_children} active child tenant(s); deactivate them first"
        ))));
    }
    Ok(())
}
