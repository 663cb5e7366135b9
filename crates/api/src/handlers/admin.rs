//! Handlers for the `/admin/users` resource (user management).
//!
//! Every handler requires `users:manage` and only reaches users whose
//! tenant lies in the caller's subtree.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use crou_core::error::CoreError;
use crou_core::roles::{is_super_admin, PERM_USERS_MANAGE};
use crou_core::types::DbId;
use crou_db::models::role::Role;
use crou_db::models::user::{CreateUser, UpdateUser, User, UserResponse};
use crou_db::repositories::{RefreshTokenRepo, RoleRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /admin/users`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Defaults to the caller's tenant.
    pub tenant_id: Option<DbId>,
    pub role_id: DbId,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub last_name: String,
    pub phone: Option<String>,
}

/// Request body for `PUT /admin/users/{id}`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<DbId>,
    pub tenant_id: Option<DbId>,
    pub is_active: Option<bool>,
}

/// Request body for `POST /admin/users/{id}/reset-password`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    input.validate()?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let tenant = scope.owner_tenant(&state.pool, input.tenant_id).await?;
    let role = assignable_role(&state, &scope, input.role_id).await?;

    let hashed = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let create_dto = CreateUser {
        tenant_id: tenant.id,
        role_id: role.id,
        email: input.email.trim().to_lowercase(),
        password_hash: hashed,
        first_name: input.first_name,
        last_name: input.last_name,
        phone: input.phone,
    };

    let user = UserRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(
        user_id = user.id,
        tenant_id = tenant.id,
        role = %role.name,
        actor = scope.user_id(),
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(UserResponse::from_user(&user, role.name))),
    ))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    let (limit, offset) = params.page();
    let users = UserRepo::list(&state.pool, scope.path(), limit, offset).await?;

    // Pre-fetch all roles to avoid N+1 queries.
    let roles = RoleRepo::list(&state.pool).await?;

    let responses = users
        .iter()
        .map(|u| UserResponse::from_user(u, role_name(&roles, u.role_id)))
        .collect();

    Ok(Json(DataResponse::new(responses)))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    let user = find_user_in_scope(&state, &scope, id).await?;
    let response = user_to_response(&state, &user).await?;
    Ok(Json(DataResponse::new(response)))
}

/// PUT /api/admin/users/{id}
///
/// Update profile fields, role, tenant or active flag (not the password).
pub async fn update_user(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    input.validate()?;
    find_user_in_scope(&state, &scope, id).await?;

    if let Some(tenant_id) = input.tenant_id {
        scope.tenant_in_scope(&state.pool, tenant_id).await?;
    }
    if let Some(role_id) = input.role_id {
        assignable_role(&state, &scope, role_id).await?;
    }
    if id == scope.user_id() && input.is_active == Some(false) {
        return Err(AppError::Core(CoreError::Conflict(
            "You cannot deactivate your own account".into(),
        )));
    }

    let update_dto = UpdateUser {
        email: input.email.map(|e| e.trim().to_lowercase()),
        first_name: input.first_name,
        last_name: input.last_name,
        phone: input.phone,
        role_id: input.role_id,
        tenant_id: input.tenant_id,
        is_active: input.is_active,
    };

    let user = UserRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    if !user.is_active {
        RefreshTokenRepo::revoke_all_for_user(&state.pool, id).await?;
    }
    tracing::info!(user_id = id, actor = scope.user_id(), "User updated");

    let response = user_to_response(&state, &user).await?;
    Ok(Json(DataResponse::new(response)))
}

/// DELETE /api/admin/users/{id}
///
/// Soft-deactivate a user and revoke their sessions. Returns 204 No Content.
pub async fn deactivate_user(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    find_user_in_scope(&state, &scope, id).await?;

    if id == scope.user_id() {
        return Err(AppError::Core(CoreError::Conflict(
            "You cannot deactivate your own account".into(),
        )));
    }

    if !UserRepo::deactivate(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "User is already inactive".into(),
        )));
    }
    RefreshTokenRepo::revoke_all_for_user(&state.pool, id).await?;
    tracing::info!(user_id = id, actor = scope.user_id(), "User deactivated");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/users/{id}/reset-password
///
/// Set a new password, clear any lockout and revoke existing sessions.
pub async fn reset_password(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    scope.require(&state.pool, PERM_USERS_MANAGE).await?;
    find_user_in_scope(&state, &scope, id).await?;

    validate_password_strength(&input.new_password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let hashed = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if !UserRepo::update_password(&state.pool, id, &hashed).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "User", id }));
    }
    RefreshTokenRepo::revoke_all_for_user(&state.pool, id).await?;
    tracing::info!(user_id = id, actor = scope.user_id(), "Password reset");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_user_in_scope(state: &AppState, scope: &TenantScope, id: DbId) -> AppResult<User> {
    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;
    scope
        .ensure_owned(&state.pool, user.tenant_id, "User", id)
        .await?;
    Ok(user)
}

/// Load a role the caller may hand out. Only a super admin creates super admins.
async fn assignable_role(state: &AppState, scope: &TenantScope, role_id: DbId) -> AppResult<Role> {
    let role = RoleRepo::find_by_id(&state.pool, role_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!("Unknown role id {role_id}")))
        })?;
    if is_super_admin(&role.name) && !is_super_admin(&scope.user.role) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only a super admin can grant the super admin role".into(),
        )));
    }
    Ok(role)
}

fn role_name(roles: &[Role], role_id: DbId) -> String {
    roles
        .iter()
        .find(|r| r.id == role_id)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn user_to_response(state: &AppState, user: &User) -> AppResult<UserResponse> {
    let role = RoleRepo::find_by_id(&state.pool, user.role_id).await?;
    let name = role.map(|r| r.name).unwrap_or_else(|| "unknown".to_string());
    Ok(UserResponse::from_user(user, name))
}
