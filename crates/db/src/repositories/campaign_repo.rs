//! Repository for the `housing_campaigns` table.

use crou_core::housing::{ApplicationStatus, CampaignStatus};
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::housing::{CampaignReport, CreateCampaign, HousingCampaign, ResidenceCount, UpdateCampaign};

const COLUMNS: &str = "id, tenant_id, name, academic_year, starts_on, ends_on, status_id, \
                       total_to_process, processed_count, assigned_count, unassigned_count, \
                       processing_started_at, processing_finished_at, last_error, created_by, \
                       created_at, updated_at";

pub struct CampaignRepo;

impl CampaignRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateCampaign,
    ) -> Result<HousingCampaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO housing_campaigns (tenant_id, name, academic_year, starts_on, ends_on, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(input.tenant_id)
            .bind(&input.name)
            .bind(&input.academic_year)
            .bind(input.starts_on)
            .bind(input.ends_on)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<HousingCampaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM housing_campaigns WHERE id = $1");
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HousingCampaign>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM housing_campaigns c
             JOIN tenants t ON t.id = c.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::smallint IS NULL OR c.status_id = $2)
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $3 OFFSET $4",
            cols = qualified("c", COLUMNS)
        );
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(scope_path)
            .bind(status.map(StatusId::from))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Edit a campaign that has not started processing.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCampaign,
    ) -> Result<Option<HousingCampaign>, sqlx::Error> {
        let query = format!(
            "UPDATE housing_campaigns SET
                name = COALESCE($2, name),
                academic_year = COALESCE($3, academic_year),
                starts_on = COALESCE($4, starts_on),
                ends_on = COALESCE($5, ends_on)
             WHERE id = $1 AND status_id = ANY($6)
             RETURNING {COLUMNS}"
        );
        let editable: Vec<StatusId> = CampaignStatus::ALL
            .iter()
            .filter(|s| s.is_editable())
            .map(|s| s.id())
            .collect();
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.academic_year)
            .bind(input.starts_on)
            .bind(input.ends_on)
            .bind(editable)
            .fetch_optional(pool)
            .await
    }

    /// Move a campaign from `from` to `to` if it is still in `from`.
    ///
    /// Entering `processing` resets the progress counters and stamps the
    /// start time with `total` as the work size; leaving it stamps the
    /// finish time and records `error` (if any).
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
        total: Option<i32>,
        error: Option<&str>,
    ) -> Result<Option<HousingCampaign>, sqlx::Error> {
        let query = format!(
            "UPDATE housing_campaigns SET
                status_id = $3,
                total_to_process = CASE WHEN $3 = $6 THEN COALESCE($4, 0) ELSE total_to_process END,
                processed_count = CASE WHEN $3 = $6 THEN 0 ELSE processed_count END,
                assigned_count = CASE WHEN $3 = $6 THEN 0 ELSE assigned_count END,
                unassigned_count = CASE WHEN $3 = $6 THEN 0 ELSE unassigned_count END,
                processing_started_at = CASE WHEN $3 = $6 THEN NOW() ELSE processing_started_at END,
                processing_finished_at = CASE
                    WHEN $3 = $6 THEN NULL
                    WHEN $2 = $6 THEN NOW()
                    ELSE processing_finished_at END,
                last_error = CASE WHEN $3 = $6 THEN NULL ELSE COALESCE($5, last_error) END
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(total)
            .bind(error)
            .bind(CampaignStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    /// Send every campaign still marked `processing` back to `closed` with
    /// `error` recorded. Counters and committed assignments are kept.
    pub async fn reset_processing(
        pool: &PgPool,
        error: &str,
    ) -> Result<Vec<HousingCampaign>, sqlx::Error> {
        let query = format!(
            "UPDATE housing_campaigns SET
                status_id = $2,
                processing_finished_at = NOW(),
                last_error = $3
             WHERE status_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HousingCampaign>(&query)
            .bind(CampaignStatus::Processing.id())
            .bind(CampaignStatus::Closed.id())
            .bind(error)
            .fetch_all(pool)
            .await
    }

    /// Add a committed chunk's outcome to the progress counters.
    pub async fn add_progress(
        conn: &mut PgConnection,
        id: DbId,
        assigned: i32,
        unassigned: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE housing_campaigns SET
                processed_count = processed_count + $2 + $3,
                assigned_count = assigned_count + $2,
                unassigned_count = unassigned_count + $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(assigned)
        .bind(unassigned)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Count applications by outcome and assigned beds by residence.
    pub async fn report(pool: &PgPool, id: DbId) -> Result<CampaignReport, sqlx::Error> {
        let counts: Vec<(StatusId, i64)> = sqlx::query_as(
            "SELECT status_id, COUNT(*) FROM housing_applications
             WHERE campaign_id = $1 GROUP BY status_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let by_residence = sqlx::query_as::<_, ResidenceCount>(
            "SELECT r.residence, COUNT(*) AS assigned
             FROM housing_applications a
             JOIN beds b ON b.id = a.bed_id
             JOIN rooms r ON r.id = b.room_id
             WHERE a.campaign_id = $1 AND a.status_id = $2
             GROUP BY r.residence
             ORDER BY r.residence",
        )
        .bind(id)
        .bind(ApplicationStatus::Assigned.id())
        .fetch_all(pool)
        .await?;

        let mut report = CampaignReport {
            campaign_id: id,
            by_residence,
            ..Default::default()
        };
        for (status_id, count) in counts {
            report.total_applications += count;
            match ApplicationStatus::from_id(status_id) {
                Some(ApplicationStatus::Pending) => report.pending = count,
                Some(ApplicationStatus::Assigned) => report.assigned = count,
                Some(ApplicationStatus::Unassigned) => report.unassigned = count,
                Some(ApplicationStatus::Withdrawn) => report.withdrawn = count,
                None => {}
            }
        }
        report.assignment_rate = crou_core::reporting::rate(
            report.assigned,
            report.total_applications - report.withdrawn,
        );
        Ok(report)
    }
}
