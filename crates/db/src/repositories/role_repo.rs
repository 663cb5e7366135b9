//! Repository for `roles`, `permissions` and `role_permissions`.

use crou_core::types::DbId;
use sqlx::PgPool;

use crate::models::role::{Permission, Role};

const COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Read access to the seeded RBAC tables.
pub struct RoleRepo;

impl RoleRepo {
    pub async fn list(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM roles ORDER BY id");
        sqlx::query_as::<_, Role>(&query).fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Role>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM roles WHERE id = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM roles WHERE name = $1");
        sqlx::query_as::<_, Role>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Permissions granted to a role, ordered by code.
    pub async fn permissions(pool: &PgPool, role_id: DbId) -> Result<Vec<Permission>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            "SELECT p.id, p.code, p.description
             FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = $1
             ORDER BY p.code",
        )
        .bind(role_id)
        .fetch_all(pool)
        .await
    }

    /// Permission codes granted to a role.
    pub async fn permission_codes(pool: &PgPool, role_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT p.code FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = $1
             ORDER BY p.code",
        )
        .bind(role_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(code,)| code).collect())
    }

    pub async fn has_permission(
        pool: &PgPool,
        role_id: DbId,
        code: &str,
    ) -> Result<bool, sqlx::Error> {
        let (granted,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM role_permissions rp
                JOIN permissions p ON p.id = rp.permission_id
                WHERE rp.role_id = $1 AND p.code = $2
             )",
        )
        .bind(role_id)
        .bind(code)
        .fetch_one(pool)
        .await?;
        Ok(granted)
    }
}
