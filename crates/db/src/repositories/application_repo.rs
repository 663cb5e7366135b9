//! Repository for the `housing_applications` table.

use crou_core::housing::ApplicationStatus;
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::housing::{CreateApplication, HousingApplication};

const COLUMNS: &str = "id, campaign_id, student_ref, student_name, gender, priority_score, \
                       preferred_residence, status_id, bed_id, unassigned_reason, submitted_at, \
                       decided_at, created_at, updated_at";

pub struct ApplicationRepo;

impl ApplicationRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateApplication,
    ) -> Result<HousingApplication, sqlx::Error> {
        let query = format!(
            "INSERT INTO housing_applications
                (campaign_id, student_ref, student_name, gender, priority_score, preferred_residence)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HousingApplication>(&query)
            .bind(input.campaign_id)
            .bind(&input.student_ref)
            .bind(&input.student_name)
            .bind(input.gender.as_str())
            .bind(input.priority_score)
            .bind(&input.preferred_residence)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<HousingApplication>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM housing_applications WHERE id = $1");
        sqlx::query_as::<_, HousingApplication>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        campaign_id: DbId,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HousingApplication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM housing_applications
             WHERE campaign_id = $1
               AND ($2::smallint IS NULL OR status_id = $2)
             ORDER BY priority_score DESC, submitted_at, id
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, HousingApplication>(&query)
            .bind(campaign_id)
            .bind(status.map(StatusId::from))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Every pending application of a campaign, unordered.
    pub async fn pending(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<HousingApplication>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM housing_applications WHERE campaign_id = $1 AND status_id = $2"
        );
        sqlx::query_as::<_, HousingApplication>(&query)
            .bind(campaign_id)
            .bind(ApplicationStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Withdraw a pending application. Returns `None` if it was not pending.
    pub async fn withdraw(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<HousingApplication>, sqlx::Error> {
        let query = format!(
            "UPDATE housing_applications SET status_id = $3, decided_at = NOW()
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HousingApplication>(&query)
            .bind(id)
            .bind(ApplicationStatus::Pending.id())
            .bind(ApplicationStatus::Withdrawn.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a pending application as assigned to `bed_id`.
    /// Returns `false` if the application was no longer pending.
    pub async fn mark_assigned(
        conn: &mut PgConnection,
        id: DbId,
        bed_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE housing_applications
             SET status_id = $3, bed_id = $4, unassigned_reason = NULL, decided_at = NOW()
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(ApplicationStatus::Pending.id())
        .bind(ApplicationStatus::Assigned.id())
        .bind(bed_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a pending application as unassigned with a reason code.
    pub async fn mark_unassigned(
        conn: &mut PgConnection,
        id: DbId,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE housing_applications
             SET status_id = $3, unassigned_reason = $4, decided_at = NOW()
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(ApplicationStatus::Pending.id())
        .bind(ApplicationStatus::Unassigned.id())
        .bind(reason)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
