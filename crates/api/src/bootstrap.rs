//! First-run setup: root ministry tenant and the initial super admin.

use crou_core::roles::ROLE_SUPER_ADMIN;
use crou_core::tenant::{self, TenantType};
use crou_db::models::tenant::{CreateTenant, Tenant};
use crou_db::models::user::{CreateUser, User};
use crou_db::repositories::{RoleRepo, TenantRepo, UserRepo};
use crou_db::DbPool;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};

/// Credentials and naming for the first-run bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_email: String,
    pub admin_password: String,
    pub root_code: String,
    pub root_name: String,
}

impl BootstrapConfig {
    /// Read `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ROOT_TENANT_CODE` and
    /// `ROOT_TENANT_NAME`. `None` unless both admin variables are set.
    pub fn from_env() -> Option<Self> {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            admin_email: non_empty("ADMIN_EMAIL")?,
            admin_password: non_empty("ADMIN_PASSWORD")?,
            root_code: non_empty("ROOT_TENANT_CODE").unwrap_or_else(|| "MINISTRY".into()),
            root_name: non_empty("ROOT_TENANT_NAME").unwrap_or_else(|| "Ministry".into()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid bootstrap configuration: {0}")]
    Invalid(String),
    #[error("Role '{0}' is not seeded")]
    MissingRole(&'static str),
}

/// Create the root tenant and super admin when the database has no tenant.
///
/// Returns `None` when tenants already exist. A failed user insert removes
/// the tenant again.
pub async fn ensure_root(
    pool: &DbPool,
    config: &BootstrapConfig,
) -> Result<Option<(Tenant, User)>, BootstrapError> {
    if TenantRepo::any_exists(pool).await? {
        return Ok(None);
    }

    let code = config.root_code.trim().to_uppercase();
    tenant::validate_code(&code).map_err(|e| BootstrapError::Invalid(e.to_string()))?;
    validate_password_strength(&config.admin_password, MIN_PASSWORD_LENGTH)
        .map_err(BootstrapError::Invalid)?;
    let email = config.admin_email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(BootstrapError::Invalid(format!(
            "ADMIN_EMAIL '{email}' is not an email address"
        )));
    }
    let password_hash = hash_password(&config.admin_password)
        .map_err(|e| BootstrapError::Invalid(format!("Password hashing failed: {e}")))?;

    let role = RoleRepo::find_by_name(pool, ROLE_SUPER_ADMIN)
        .await?
        .ok_or(BootstrapError::MissingRole(ROLE_SUPER_ADMIN))?;

    let root = TenantRepo::create(
        pool,
        &CreateTenant {
            code,
            name: config.root_name.clone(),
            tenant_type: TenantType::Ministere,
            parent_id: None,
            parent_path: None,
            service_type: None,
        },
    )
    .await?;

    let admin = match UserRepo::create(
        pool,
        &CreateUser {
            tenant_id: root.id,
            role_id: role.id,
            email,
            password_hash,
            first_name: "Super".into(),
            last_name: "Admin".into(),
            phone: None,
        },
    )
    .await
    {
        Ok(user) => user,
        Err(e) => {
            // Leave the database empty so the next start retries.
            if let Err(cleanup) = sqlx::query("DELETE FROM tenants WHERE id = $1")
                .bind(root.id)
                .execute(pool)
                .await
            {
                tracing::error!(error = %cleanup, tenant_id = root.id, "Failed to remove root tenant");
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        tenant_id = root.id,
        code = %root.code,
        user_id = admin.id,
        email = %admin.email,
        "Bootstrapped root tenant and super admin"
    );
    Ok(Some((root, admin)))
}
