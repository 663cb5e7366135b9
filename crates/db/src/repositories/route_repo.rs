//! Repository for the `transport_routes` table.

use crou_core::types::DbId;
use sqlx::PgPool;

use super::qualified;
use crate::models::transport::{CreateRoute, TransportRoute, UpdateRoute};

const COLUMNS: &str = "id, tenant_id, code, name, origin, destination, departure_time, \
                       vehicle_id, driver_id, is_active, created_at, updated_at";

pub struct RouteRepo;

impl RouteRepo {
    pub async fn create(pool: &PgPool, input: &CreateRoute) -> Result<TransportRoute, sqlx::Error> {
        let query = format!(
            "INSERT INTO transport_routes (tenant_id, code, name, origin, destination, departure_time)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransportRoute>(&query)
            .bind(input.tenant_id)
            .bind(&input.code)
            .bind(&input.name)
            .bind(&input.origin)
            .bind(&input.destination)
            .bind(input.departure_time)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TransportRoute>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transport_routes WHERE id = $1");
        sqlx::query_as::<_, TransportRoute>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransportRoute>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM transport_routes r
             JOIN tenants t ON t.id = r.tenant_id
             WHERE t.path LIKE $1 || '%'
             ORDER BY r.code
             LIMIT $2 OFFSET $3",
            cols = qualified("r", COLUMNS)
        );
        sqlx::query_as::<_, TransportRoute>(&query)
            .bind(scope_path)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRoute,
    ) -> Result<Option<TransportRoute>, sqlx::Error> {
        let query = format!(
            "UPDATE transport_routes SET
                name = COALESCE($2, name),
                origin = COALESCE($3, origin),
                destination = COALESCE($4, destination),
                departure_time = COALESCE($5, departure_time),
                is_active = COALESCE($6, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransportRoute>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.origin)
            .bind(&input.destination)
            .bind(input.departure_time)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Set the vehicle and/or driver of a route; `None` leaves a slot unchanged.
    pub async fn assign(
        pool: &PgPool,
        id: DbId,
        vehicle_id: Option<DbId>,
        driver_id: Option<DbId>,
    ) -> Result<Option<TransportRoute>, sqlx::Error> {
        let query = format!(
            "UPDATE transport_routes SET
                vehicle_id = COALESCE($2, vehicle_id),
                driver_id = COALESCE($3, driver_id)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransportRoute>(&query)
            .bind(id)
            .bind(vehicle_id)
            .bind(driver_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transport_routes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
