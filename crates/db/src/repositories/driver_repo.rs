//! Repository for the `drivers` table.

use crou_core::types::DbId;
use sqlx::PgPool;

use super::qualified;
use crate::models::transport::{CreateDriver, Driver, UpdateDriver};

const COLUMNS: &str = "id, tenant_id, full_name, license_number, license_expires_on, phone, \
                       is_active, created_at, updated_at";

pub struct DriverRepo;

impl DriverRepo {
    pub async fn create(pool: &PgPool, input: &CreateDriver) -> Result<Driver, sqlx::Error> {
        let query = format!(
            "INSERT INTO drivers (tenant_id, full_name, license_number, license_expires_on, phone)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Driver>(&query)
            .bind(input.tenant_id)
            .bind(&input.full_name)
            .bind(&input.license_number)
            .bind(input.license_expires_on)
            .bind(&input.phone)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Driver>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM drivers WHERE id = $1");
        sqlx::query_as::<_, Driver>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Driver>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM drivers d
             JOIN tenants t ON t.id = d.tenant_id
             WHERE t.path LIKE $1 || '%'
             ORDER BY d.full_name
             LIMIT $2 OFFSET $3",
            cols = qualified("d", COLUMNS)
        );
        sqlx::query_as::<_, Driver>(&query)
            .bind(scope_path)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateDriver,
    ) -> Result<Option<Driver>, sqlx::Error> {
        let query = format!(
            "UPDATE drivers SET
                full_name = COALESCE($2, full_name),
                license_expires_on = COALESCE($3, license_expires_on),
                phone = COALESCE($4, phone),
                is_active = COALESCE($5, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Driver>(&query)
            .bind(id)
            .bind(&input.full_name)
            .bind(input.license_expires_on)
            .bind(&input.phone)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate a driver and detach them from every route.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result =
            sqlx::query("UPDATE drivers SET is_active = false WHERE id = $1 AND is_active = true")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        sqlx::query("UPDATE transport_routes SET driver_id = NULL WHERE driver_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
