//! Handlers for the `/roles` resource (read-only).

use axum::extract::{Path, State};
use axum::Json;
use crou_core::error::CoreError;
use crou_core::types::DbId;
use crou_db::models::role::{Permission, Role};
use crou_db::repositories::RoleRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> AppResult<Json<DataResponse<Vec<Role>>>> {
    let roles = RoleRepo::list(&state.pool).await?;
    Ok(Json(DataResponse::new(roles)))
}

/// GET /api/roles/{id}/permissions
pub async fn role_permissions(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Permission>>>> {
    RoleRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Role", id }))?;
    let permissions = RoleRepo::permissions(&state.pool, id).await?;
    Ok(Json(DataResponse::new(permissions)))
}
