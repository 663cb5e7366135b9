//! Repository for `meal_tickets` and the `ticket_sequences` counter.

use chrono::NaiveDate;
use crou_core::restauration::TicketStatus;
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::restauration::{MealTicket, NewTicket, TicketBatch};

const COLUMNS: &str = "id, tenant_id, ticket_number, qr_code, meal_type, price, valid_from, \
                       valid_until, status_id, batch_ref, used_at, used_meal_id, created_by, \
                       created_at, updated_at";

pub struct TicketRepo;

impl TicketRepo {
    /// Reserve `count` consecutive sequence numbers for a tenant and issue
    /// date. Returns the first reserved number.
    pub async fn reserve_sequence(
        conn: &mut PgConnection,
        tenant_id: DbId,
        issue_date: NaiveDate,
        count: i64,
    ) -> Result<i64, sqlx::Error> {
        let (last,): (i64,) = sqlx::query_as(
            "INSERT INTO ticket_sequences (tenant_id, issue_date, last_seq)
             VALUES ($1, $2, $3)
             ON CONFLICT (tenant_id, issue_date)
             DO UPDATE SET last_seq = ticket_sequences.last_seq + EXCLUDED.last_seq
             RETURNING last_seq",
        )
        .bind(tenant_id)
        .bind(issue_date)
        .bind(count)
        .fetch_one(conn)
        .await?;
        Ok(last - count + 1)
    }

    /// Insert a batch of tickets sharing the attributes in `batch`.
    pub async fn insert_batch(
        conn: &mut PgConnection,
        batch: &TicketBatch,
        tickets: &[NewTicket],
    ) -> Result<Vec<MealTicket>, sqlx::Error> {
        let numbers: Vec<&str> = tickets.iter().map(|t| t.ticket_number.as_str()).collect();
        let codes: Vec<&str> = tickets.iter().map(|t| t.qr_code.as_str()).collect();
        let query = format!(
            "INSERT INTO meal_tickets
                (tenant_id, ticket_number, qr_code, meal_type, price, valid_from, valid_until,
                 batch_ref, created_by)
             SELECT $1, t.number, t.code, $4, $5, $6, $7, $8, $9
             FROM UNNEST($2::text[], $3::text[]) AS t(number, code)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MealTicket>(&query)
            .bind(batch.tenant_id)
            .bind(&numbers)
            .bind(&codes)
            .bind(batch.meal_type.map(|m| m.as_str()))
            .bind(batch.price)
            .bind(batch.valid_from)
            .bind(batch.valid_until)
            .bind(&batch.batch_ref)
            .bind(batch.created_by)
            .fetch_all(conn)
            .await
    }

    /// Look a ticket up by its printed number or its QR payload.
    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<MealTicket>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM meal_tickets WHERE ticket_number = $1 OR qr_code = $1");
        sqlx::query_as::<_, MealTicket>(&query)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        status: Option<TicketStatus>,
        batch_ref: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MealTicket>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM meal_tickets m
             JOIN tenants t ON t.id = m.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::smallint IS NULL OR m.status_id = $2)
               AND ($3::text IS NULL OR m.batch_ref = $3)
             ORDER BY m.id DESC
             LIMIT $4 OFFSET $5",
            cols = qualified("m", COLUMNS)
        );
        sqlx::query_as::<_, MealTicket>(&query)
            .bind(scope_path)
            .bind(status.map(StatusId::from))
            .bind(batch_ref)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Consume an active, unexpired ticket at a meal.
    ///
    /// The status check lives in the `WHERE` clause, so a ticket is used at
    /// most once even under concurrent scans. Returns `None` when the ticket
    /// was not usable at the time of the update.
    pub async fn consume(
        conn: &mut PgConnection,
        id: DbId,
        meal_id: DbId,
        today: NaiveDate,
    ) -> Result<Option<MealTicket>, sqlx::Error> {
        let query = format!(
            "UPDATE meal_tickets SET status_id = $3, used_at = NOW(), used_meal_id = $4
             WHERE id = $1 AND status_id = $2 AND valid_until >= $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MealTicket>(&query)
            .bind(id)
            .bind(TicketStatus::Active.id())
            .bind(TicketStatus::Used.id())
            .bind(meal_id)
            .bind(today)
            .fetch_optional(conn)
            .await
    }

    /// Cancel an active ticket. Returns `None` if it was not active.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<MealTicket>, sqlx::Error> {
        let query = format!(
            "UPDATE meal_tickets SET status_id = $3
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MealTicket>(&query)
            .bind(id)
            .bind(TicketStatus::Active.id())
            .bind(TicketStatus::Cancelled.id())
            .fetch_optional(pool)
            .await
    }

    /// Expire every active ticket whose validity ended before `today`.
    /// Returns the number of expired tickets.
    pub async fn expire_overdue(pool: &PgPool, today: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE meal_tickets SET status_id = $2 WHERE status_id = $1 AND valid_until < $3",
        )
        .bind(TicketStatus::Active.id())
        .bind(TicketStatus::Expired.id())
        .bind(today)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
