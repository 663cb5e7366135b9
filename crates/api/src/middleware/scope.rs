//! Tenant scoping.
//!
//! A user may act on resources owned by their own tenant or any tenant
//! below it. Ministry users therefore see everything, a CROU user only
//! their CROU. Subtree membership is a prefix test on materialized paths.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use crou_core::error::CoreError;
use crou_core::tenant;
use crou_core::types::DbId;
use crou_db::models::tenant::Tenant;
use crou_db::repositories::TenantRepo;
use crou_db::DbPool;

use super::auth::AuthUser;
use super::rbac::require_permission;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The authenticated user together with their tenant.
///
/// Rejects with 401 when the token is missing or invalid and with 403 when
/// the user's tenant has been deactivated.
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub user: AuthUser,
    pub tenant: Tenant,
}

impl FromRequestParts<AppState> for TenantScope {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let tenant = TenantRepo::find_by_id(&state.pool, user.tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("User tenant no longer exists".into()))
            })?;
        if !tenant.is_active {
            return Err(AppError::Core(CoreError::Forbidden(
                "User tenant is deactivated".into(),
            )));
        }
        Ok(TenantScope { user, tenant })
    }
}

impl TenantScope {
    pub fn user_id(&self) -> DbId {
        self.user.user_id
    }

    /// Materialized path of the caller's tenant; list queries match its prefix.
    pub fn path(&self) -> &str {
        &self.tenant.path
    }

    /// See [`require_permission`].
    pub async fn require(&self, pool: &DbPool, permission: &str) -> AppResult<()> {
        require_permission(pool, &self.user, permission).await
    }

    /// Whether a tenant with `path` lies in the caller's subtree.
    pub fn covers(&self, path: &str) -> bool {
        tenant::is_within(&self.tenant.path, path)
    }

    /// Load a tenant and check that it is in scope.
    ///
    /// Out-of-scope tenants are reported as not found so their existence
    /// does not leak across the hierarchy.
    pub async fn tenant_in_scope(&self, pool: &DbPool, tenant_id: DbId) -> AppResult<Tenant> {
        let not_found = || {
            AppError::Core(CoreError::NotFound {
                entity: "Tenant",
                id: tenant_id,
            })
        };
        let found = TenantRepo::find_by_id(pool, tenant_id)
            .await?
            .ok_or_else(not_found)?;
        if self.covers(&found.path) {
            Ok(found)
        } else {
            Err(not_found())
        }
    }

    /// Check that an entity owned by `tenant_id` is visible to the caller.
    ///
    /// `entity`/`id` name the entity in the 404 returned otherwise.
    pub async fn ensure_owned(
        &self,
        pool: &DbPool,
        tenant_id: DbId,
        entity: &'static str,
        id: DbId,
    ) -> AppResult<()> {
        if tenant_id == self.tenant.id {
            return Ok(());
        }
        match TenantRepo::find_by_id(pool, tenant_id).await? {
            Some(owner) if self.covers(&owner.path) => Ok(()),
            _ => Err(AppError::Core(CoreError::NotFound { entity, id })),
        }
    }

    /// Subtree path for a list query: the requested tenant's when given
    /// (and in scope), otherwise the caller's.
    pub async fn list_path(&self, pool: &DbPool, tenant_id: Option<DbId>) -> AppResult<String> {
        match tenant_id {
            Some(id) => Ok(self.tenant_in_scope(pool, id).await?.path),
            None => Ok(self.tenant.path.clone()),
        }
    }

    /// Tenant to own a new resource: the requested one (checked) or the caller's.
    pub async fn owner_tenant(&self, pool: &DbPool, tenant_id: Option<DbId>) -> AppResult<Tenant> {
        match tenant_id {
            Some(id) if id != self.tenant.id => self.tenant_in_scope(pool, id).await,
            _ => Ok(self.tenant.clone()),
        }
    }
}
