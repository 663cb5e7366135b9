//! Repository for `rooms` and their `beds`.

use crou_core::housing::BedStatus;
use crou_core::status::StatusEnum;
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::housing::{Bed, CreateRoom, FreeBed, Room, UpdateRoom};

const COLUMNS: &str = "id, tenant_id, residence, number, floor, capacity, gender, is_active, \
                       created_at, updated_at";

const BED_COLUMNS: &str = "id, room_id, label, status_id, created_at, updated_at";

/// Rooms, plus the beds generated from their capacity.
pub struct RoomRepo;

impl RoomRepo {
    /// Insert a room and one bed per label in a single transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRoom,
        bed_labels: &[String],
    ) -> Result<(Room, Vec<Bed>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO rooms (tenant_id, residence, number, floor, capacity, gender)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let room = sqlx::query_as::<_, Room>(&query)
            .bind(input.tenant_id)
            .bind(&input.residence)
            .bind(&input.number)
            .bind(input.floor)
            .bind(input.capacity)
            .bind(input.gender.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let beds = Self::insert_beds(&mut tx, room.id, bed_labels).await?;

        tx.commit().await?;
        Ok((room, beds))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        residence: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Room>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM rooms r
             JOIN tenants t ON t.id = r.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::text IS NULL OR r.residence = $2)
             ORDER BY r.residence, length(r.number), r.number
             LIMIT $3 OFFSET $4",
            cols = qualified("r", COLUMNS)
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(scope_path)
            .bind(residence)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update room fields and reconcile beds with the new capacity:
    /// `add_labels` are created, and `remove_count` available beds with the
    /// highest labels are deleted. Beds that ever held an occupancy are
    /// never deleted.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRoom,
        add_labels: &[String],
        remove_count: i64,
    ) -> Result<Option<Room>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE rooms SET
                residence = COALESCE($2, residence),
                floor = COALESCE($3, floor),
                capacity = COALESCE($4, capacity),
                gender = COALESCE($5, gender),
                is_active = COALESCE($6, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let room = sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .bind(&input.residence)
            .bind(input.floor)
            .bind(input.capacity)
            .bind(input.gender.map(|g| g.as_str()))
            .bind(input.is_active)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(room) = room else {
            tx.rollback().await?;
            return Ok(None);
        };

        Self::insert_beds(&mut tx, id, add_labels).await?;

        if remove_count > 0 {
            sqlx::query(
                "DELETE FROM beds WHERE id IN (
                    SELECT id FROM beds
                    WHERE room_id = $1 AND status_id = $2
                      AND NOT EXISTS (
                          SELECT 1 FROM housing_occupancies o WHERE o.bed_id = beds.id
                      )
                    ORDER BY length(label) DESC, label DESC
                    LIMIT $3
                 )",
            )
            .bind(id)
            .bind(BedStatus::Available.id())
            .bind(remove_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(room))
    }

    /// Delete a room and its beds. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn beds(pool: &PgPool, room_id: DbId) -> Result<Vec<Bed>, sqlx::Error> {
        let query = format!(
            "SELECT {BED_COLUMNS} FROM beds WHERE room_id = $1 ORDER BY length(label), label"
        );
        sqlx::query_as::<_, Bed>(&query)
            .bind(room_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_bed(pool: &PgPool, bed_id: DbId) -> Result<Option<Bed>, sqlx::Error> {
        let query = format!("SELECT {BED_COLUMNS} FROM beds WHERE id = $1");
        sqlx::query_as::<_, Bed>(&query)
            .bind(bed_id)
            .fetch_optional(pool)
            .await
    }

    /// Number of beds in a room that are not available.
    pub async fn count_beds_in_use(pool: &PgPool, room_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM beds WHERE room_id = $1 AND status_id <> $2")
                .bind(room_id)
                .bind(BedStatus::Available.id())
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Available beds of a room that never held an occupancy, i.e. the
    /// ones a capacity shrink may delete.
    pub async fn count_removable_beds(pool: &PgPool, room_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM beds b
             WHERE b.room_id = $1 AND b.status_id = $2
               AND NOT EXISTS (SELECT 1 FROM housing_occupancies o WHERE o.bed_id = b.id)",
        )
        .bind(room_id)
        .bind(BedStatus::Available.id())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Whether any bed of the room has held an occupancy, active or ended.
    pub async fn has_occupancy_history(pool: &PgPool, room_id: DbId) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM housing_occupancies o
                 JOIN beds b ON b.id = o.bed_id
                 WHERE b.room_id = $1
             )",
        )
        .bind(room_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Set a bed's status if it is currently `from`.
    pub async fn set_bed_status<'e, E>(
        executor: E,
        bed_id: DbId,
        from: BedStatus,
        to: BedStatus,
    ) -> Result<Option<Bed>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE beds SET status_id = $3 WHERE id = $1 AND status_id = $2 RETURNING {BED_COLUMNS}"
        );
        sqlx::query_as::<_, Bed>(&query)
            .bind(bed_id)
            .bind(from.id())
            .bind(to.id())
            .fetch_optional(executor)
            .await
    }

    /// Available beds in active rooms of a tenant, joined with room data for
    /// the assignment planner.
    pub async fn free_beds(pool: &PgPool, tenant_id: DbId) -> Result<Vec<FreeBed>, sqlx::Error> {
        sqlx::query_as::<_, FreeBed>(
            "SELECT b.id, b.room_id, r.residence, r.number AS room_number, b.label,
                    r.gender AS room_gender
             FROM beds b
             JOIN rooms r ON r.id = b.room_id
             WHERE r.tenant_id = $1 AND r.is_active AND b.status_id = $2",
        )
        .bind(tenant_id)
        .bind(BedStatus::Available.id())
        .fetch_all(pool)
        .await
    }

    async fn insert_beds(
        conn: &mut PgConnection,
        room_id: DbId,
        labels: &[String],
    ) -> Result<Vec<Bed>, sqlx::Error> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "INSERT INTO beds (room_id, label)
             SELECT $1, label FROM UNNEST($2::text[]) AS label
             RETURNING {BED_COLUMNS}"
        );
        sqlx::query_as::<_, Bed>(&query)
            .bind(room_id)
            .bind(labels)
            .fetch_all(conn)
            .await
    }
}
