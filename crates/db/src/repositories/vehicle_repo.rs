//! Repository for the `vehicles` table.

use crou_core::status::StatusEnum;
use crou_core::transport::VehicleStatus;
use crou_core::types::DbId;
use sqlx::PgPool;

use super::qualified;
use crate::models::transport::{CreateVehicle, UpdateVehicle, Vehicle};

const COLUMNS: &str = "id, tenant_id, plate_number, brand, model, capacity, status_id, \
                       created_at, updated_at";

pub struct VehicleRepo;

impl VehicleRepo {
    pub async fn create(pool: &PgPool, input: &CreateVehicle) -> Result<Vehicle, sqlx::Error> {
        let query = format!(
            "INSERT INTO vehicles (tenant_id, plate_number, brand, model, capacity)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(input.tenant_id)
            .bind(&input.plate_number)
            .bind(&input.brand)
            .bind(&input.model)
            .bind(input.capacity)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Vehicle>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM vehicles WHERE id = $1");
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Vehicle>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM vehicles v
             JOIN tenants t ON t.id = v.tenant_id
             WHERE t.path LIKE $1 || '%'
             ORDER BY v.plate_number
             LIMIT $2 OFFSET $3",
            cols = qualified("v", COLUMNS)
        );
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(scope_path)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateVehicle,
    ) -> Result<Option<Vehicle>, sqlx::Error> {
        let query = format!(
            "UPDATE vehicles SET
                brand = COALESCE($2, brand),
                model = COALESCE($3, model),
                capacity = COALESCE($4, capacity)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .bind(&input.brand)
            .bind(&input.model)
            .bind(input.capacity)
            .fetch_optional(pool)
            .await
    }

    /// Change status if the vehicle is still in `from`.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        from: VehicleStatus,
        to: VehicleStatus,
    ) -> Result<Option<Vehicle>, sqlx::Error> {
        let query = format!(
            "UPDATE vehicles SET status_id = $3 WHERE id = $1 AND status_id = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vehicle>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .fetch_optional(pool)
            .await
    }

    /// Retire a vehicle and detach it from every route. Returns `true` if
    /// the vehicle existed and was not already retired.
    pub async fn retire(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query("UPDATE vehicles SET status_id = $2 WHERE id = $1 AND status_id <> $2")
            .bind(id)
            .bind(VehicleStatus::Retired.id())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE transport_routes SET vehicle_id = NULL WHERE vehicle_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
