//! Repository for the `housing_occupancies` table.

use crou_core::housing::{BedStatus, OccupancyStatus};
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::housing::Occupancy;

const COLUMNS: &str = "id, bed_id, application_id, student_ref, student_name, start_date, \
                       end_date, status_id, created_at, updated_at";

pub struct OccupancyRepo;

impl OccupancyRepo {
    /// Open an active occupancy. The partial unique index rejects a second
    /// active occupancy on the same bed.
    pub async fn create(
        conn: &mut PgConnection,
        bed_id: DbId,
        application_id: Option<DbId>,
        student_ref: &str,
        student_name: &str,
    ) -> Result<Occupancy, sqlx::Error> {
        let query = format!(
            "INSERT INTO housing_occupancies (bed_id, application_id, student_ref, student_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Occupancy>(&query)
            .bind(bed_id)
            .bind(application_id)
            .bind(student_ref)
            .bind(student_name)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Occupancy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM housing_occupancies WHERE id = $1");
        sqlx::query_as::<_, Occupancy>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Tenant owning the bed of an occupancy.
    pub async fn tenant_of(pool: &PgPool, id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as(
            "SELECT r.tenant_id FROM housing_occupancies o
             JOIN beds b ON b.id = o.bed_id
             JOIN rooms r ON r.id = b.room_id
             WHERE o.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(tenant_id,)| tenant_id))
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        status: Option<OccupancyStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Occupancy>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM housing_occupancies o
             JOIN beds b ON b.id = o.bed_id
             JOIN rooms r ON r.id = b.room_id
             JOIN tenants t ON t.id = r.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::smallint IS NULL OR o.status_id = $2)
             ORDER BY o.start_date DESC, o.id DESC
             LIMIT $3 OFFSET $4",
            cols = qualified("o", COLUMNS)
        );
        sqlx::query_as::<_, Occupancy>(&query)
            .bind(scope_path)
            .bind(status.map(StatusId::from))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// End an active occupancy and free its bed. Returns `None` if the
    /// occupancy was not active.
    pub async fn end(pool: &PgPool, id: DbId) -> Result<Option<Occupancy>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE housing_occupancies SET status_id = $3, end_date = CURRENT_DATE
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        let Some(occupancy) = sqlx::query_as::<_, Occupancy>(&query)
            .bind(id)
            .bind(OccupancyStatus::Active.id())
            .bind(OccupancyStatus::Ended.id())
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE beds SET status_id = $3 WHERE id = $1 AND status_id = $2")
            .bind(occupancy.bed_id)
            .bind(BedStatus::Occupied.id())
            .bind(BedStatus::Available.id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(occupancy))
    }
}
