//! Handlers for the `/auth` resource (login, refresh, logout) and the
//! current-user profile.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use crou_core::error::CoreError;
use crou_core::event_types::{ENTITY_USER, EVT_USER_LOCKED};
use crou_db::models::refresh_token::CreateRefreshToken;
use crou_db::models::role::Role;
use crou_db::models::tenant::Tenant;
use crou_db::models::user::{User, UserResponse};
use crou_db::repositories::{RefreshTokenRepo, RoleRepo, TenantRepo, UserRepo};
use crou_events::PlatformEvent;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, hash_refresh_token, TokenSubject,
};
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// `GET /users/me` payload.
#[derive(Debug, Serialize)]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: UserResponse,
    pub tenant: Tenant,
    pub permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/login
///
/// Authenticate with email + password. Five consecutive failures lock the
/// account for fifteen minutes.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    input.validate()?;
    let invalid = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid email or password".into(),
        ))
    };

    let email = input.email.trim().to_lowercase();
    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is temporarily locked. Try again later.".into(),
            )));
        }
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        let failures = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failures >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, failures, "Account locked after failed logins");
            state.publish(
                PlatformEvent::new(EVT_USER_LOCKED)
                    .with_source(ENTITY_USER, user.id)
                    .with_tenant(user.tenant_id)
                    .with_payload(serde_json::json!({
                        "email": user.email,
                        "lockedUntil": lock_until,
                    })),
            );
        }
        return Err(invalid());
    }

    UserRepo::record_successful_login(&state.pool, user.id).await?;
    let role = resolve_role(&state, user.role_id).await?;
    tracing::info!(user_id = user.id, role = %role.name, "User logged in");

    let response = issue_tokens(&state, &user, &role.name, &headers).await?;
    Ok(Json(DataResponse::new(response)))
}

/// POST /api/auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is revoked
/// atomically, so replaying it (or racing a second refresh) fails with 401.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let rejected = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid or expired refresh token".into(),
        ))
    };

    let token_hash = hash_refresh_token(&input.refresh_token);
    let current = RefreshTokenRepo::find_active_by_hash(&state.pool, &token_hash)
        .await?
        .ok_or_else(rejected)?;

    let user = UserRepo::find_by_id(&state.pool, current.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let role = resolve_role(&state, user.role_id).await?;

    let (refresh_plaintext, refresh_hash) = generate_refresh_token();
    let replacement = new_refresh_row(&state, user.id, refresh_hash, &headers);
    RefreshTokenRepo::rotate(&state.pool, &token_hash, &replacement)
        .await?
        .ok_or_else(rejected)?;

    let tokens = TokenPair {
        access_token: access_token_for(&state, &user, &role.name)?,
        refresh_token: refresh_plaintext,
        expires_in: state.config.jwt.access_expires_in(),
    };

    Ok(Json(DataResponse::new(AuthResponse {
        user: UserResponse::from_user(&user, role.name),
        tokens,
    })))
}

/// POST /api/auth/logout
///
/// Revoke every refresh token of the authenticated user. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> AppResult<StatusCode> {
    let revoked = RefreshTokenRepo::revoke_all_for_user(&state.pool, user.user_id).await?;
    tracing::info!(user_id = user.user_id, revoked, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/me
///
/// The authenticated user with their tenant, role and permission codes.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<CurrentUser>>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }))?;
    let tenant = TenantRepo::find_by_id(&state.pool, user.tenant_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Tenant",
            id: user.tenant_id,
        }))?;
    let role = resolve_role(&state, user.role_id).await?;
    let permissions = RoleRepo::permission_codes(&state.pool, role.id).await?;

    Ok(Json(DataResponse::new(CurrentUser {
        user: UserResponse::from_user(&user, role.name),
        tenant,
        permissions,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn resolve_role(state: &AppState, role_id: crou_core::types::DbId) -> AppResult<Role> {
    RoleRepo::find_by_id(&state.pool, role_id)
        .await?
        .ok_or_else(|| AppError::InternalError(format!("Role {role_id} is missing")))
}

fn access_token_for(state: &AppState, user: &User, role: &str) -> AppResult<String> {
    let subject = TokenSubject {
        user_id: user.id,
        tenant_id: user.tenant_id,
        role_id: user.role_id,
        role,
    };
    generate_access_token(subject, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))
}

fn new_refresh_row(
    state: &AppState,
    user_id: crou_core::types::DbId,
    token_hash: String,
    headers: &HeaderMap,
) -> CreateRefreshToken {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    CreateRefreshToken {
        user_id,
        token_hash,
        expires_at: Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days),
        user_agent: header("user-agent"),
        ip_address: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string())),
    }
}

/// Generate an access token and a persisted refresh token for `user`.
async fn issue_tokens(
    state: &AppState,
    user: &User,
    role: &str,
    headers: &HeaderMap,
) -> AppResult<AuthResponse> {
    let access_token = access_token_for(state, user, role)?;

    let (refresh_plaintext, refresh_hash) = generate_refresh_token();
    RefreshTokenRepo::create(&state.pool, &new_refresh_row(state, user.id, refresh_hash, headers))
        .await?;

    Ok(AuthResponse {
        user: UserResponse::from_user(user, role.to_string()),
        tokens: TokenPair {
            access_token,
            refresh_token: refresh_plaintext,
            expires_in: state.config.jwt.access_expires_in(),
        },
    })
}
