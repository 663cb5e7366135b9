//! Repository for the `tenants` table.

use crou_core::types::DbId;
use sqlx::PgPool;

use crate::models::tenant::{CreateTenant, Tenant, UpdateTenant};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, code, name, tenant_type, parent_id, path, level, service_type, \
                       is_active, created_at, updated_at";

/// Provides CRUD and hierarchy queries for tenants.
pub struct TenantRepo;

impl TenantRepo {
    /// Insert a tenant and compute its materialized path from the new id in
    /// the same statement.
    pub async fn create(pool: &PgPool, input: &CreateTenant) -> Result<Tenant, sqlx::Error> {
        let query = format!(
            "WITH new_id AS (SELECT nextval(pg_get_serial_sequence('tenants', 'id')) AS id)
             INSERT INTO tenants (id, code, name, tenant_type, parent_id, path, level, service_type)
             SELECT id, $1, $2, $3, $4, COALESCE($5, '/') || id::text || '/', $6, $7
             FROM new_id
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(&input.code)
            .bind(&input.name)
            .bind(input.tenant_type.as_str())
            .bind(input.parent_id)
            .bind(&input.parent_path)
            .bind(input.tenant_type.level())
            .bind(&input.service_type)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE id = $1");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE code = $1");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// List tenants in the subtree rooted at `scope_path`, shallowest first.
    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        tenant_type: Option<&str>,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tenants
             WHERE path LIKE $1 || '%'
               AND ($2::text IS NULL OR tenant_type = $2)
               AND ($3 OR is_active)
             ORDER BY level, code
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(scope_path)
            .bind(tenant_type)
            .bind(include_inactive)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Direct children of a tenant.
    pub async fn children(pool: &PgPool, id: DbId) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE parent_id = $1 ORDER BY code");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .fetch_all(pool)
            .await
    }

    /// Every tenant strictly below `path`.
    pub async fn descendants(pool: &PgPool, path: &str) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tenants
             WHERE path LIKE $1 || '%' AND path <> $1
             ORDER BY level, code"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(path)
            .fetch_all(pool)
            .await
    }

    /// Tenants with the given ids, root first.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tenants WHERE id = ANY($1) ORDER BY level");
        sqlx::query_as::<_, Tenant>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Update a tenant. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTenant,
    ) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!(
            "UPDATE tenants SET
                name = COALESCE($2, name),
                service_type = COALESCE($3, service_type),
                is_active = COALESCE($4, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.service_type)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Number of active direct children.
    pub async fn count_active_children(pool: &PgPool, id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tenants WHERE parent_id = $1 AND is_active")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Soft-deactivate a tenant. Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE tenants SET is_active = false WHERE id = $1 AND is_active = true")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any tenant exists yet (used by first-run bootstrap).
    pub async fn any_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tenants)")
            .fetch_one(pool)
            .await?;
        Ok(exists)
    }
}
