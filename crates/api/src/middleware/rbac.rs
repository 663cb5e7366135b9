//! Permission checks.
//!
//! Roles carry `resource:action` permissions seeded in the database. The
//! super admin role bypasses the lookup.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use crou_core::error::CoreError;
use crou_core::roles::is_super_admin;
use crou_db::repositories::RoleRepo;
use crou_db::DbPool;

use super::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Requires any authenticated user (any valid role).
///
/// Equivalent to [`AuthUser`] but self-documenting in route handlers.
///
/// ```ignore
/// async fn any_authed(RequireAuth(user): RequireAuth) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAuth(user))
    }
}

/// Fail with 403 unless the user's role grants `permission`.
pub async fn require_permission(pool: &DbPool, user: &AuthUser, permission: &str) -> AppResult<()> {
    if is_super_admin(&user.role) {
        return Ok(());
    }
    if RoleRepo::has_permission(pool, user.role_id, permission).await? {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(format!(
            "Missing permission '{permission}'"
        ))))
    }
}
