//! Handlers for housing campaigns and their applications.
//!
//! Draft → Open → Closed → Processing → Completed. Closed campaigns can be
//! reopened, and anything before processing can be cancelled. Processing
//! runs in the background, see [`crate::engine::housing_batch`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use crou_core::error::CoreError;
use crou_core::event_types::{ENTITY_CAMPAIGN, EVT_CAMPAIGN_CLOSED, EVT_CAMPAIGN_OPENED};
use crou_core::housing::{self, ApplicationStatus, CampaignStatus, Gender};
use crou_core::roles::{PERM_HOUSING_PROCESS, PERM_HOUSING_READ, PERM_HOUSING_WRITE};
use crou_core::status::{ensure_transition, StatusEnum};
use crou_core::types::DbId;
use crou_db::models::housing::{
    CampaignProgress, CampaignReport, CreateApplication, CreateCampaign, HousingApplication,
    HousingCampaign, UpdateCampaign,
};
use crou_db::repositories::{ApplicationRepo, CampaignRepo};
use crou_events::PlatformEvent;
use serde::Deserialize;
use validator::Validate;

use crate::engine::housing_batch::HousingBatch;
use crate::error::{AppError, AppResult};
use crate::middleware::scope::TenantScope;
use crate::query::parse_status_filter;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub tenant_id: Option<DbId>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 4, max = 20, message = "must be 4-20 characters"))]
    pub academic_year: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 4, max = 20, message = "must be 4-20 characters"))]
    pub academic_year: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub student_ref: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub student_name: String,
    /// `M` or `F`.
    pub gender: String,
    #[validate(range(min = 0, max = 1000, message = "must be between 0 and 1000"))]
    #[serde(default)]
    pub priority_score: i32,
    pub preferred_residence: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListParams {
    pub tenant_id: Option<DbId>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Campaign CRUD
// ---------------------------------------------------------------------------

/// POST /api/housing/campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Json(input): Json<CreateCampaignRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<HousingCampaign>>)> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    input.validate()?;
    validate_dates(input.starts_on, input.ends_on)?;
    let owner = scope.owner_tenant(&state.pool, input.tenant_id).await?;

    let create_dto = CreateCampaign {
        tenant_id: owner.id,
        name: input.name,
        academic_year: input.academic_year,
        starts_on: input.starts_on,
        ends_on: input.ends_on,
        created_by: Some(scope.user_id()),
    };
    let created = CampaignRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(campaign_id = created.id, tenant_id = owner.id, actor = scope.user_id(), "Campaign created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/housing/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<StatusListParams>,
) -> AppResult<Json<DataResponse<Vec<HousingCampaign>>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let status = parse_status_filter::<CampaignStatus>(params.status.as_deref())?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let campaigns = CampaignRepo::list(&state.pool, &path, status, limit, offset).await?;
    Ok(Json(DataResponse::new(campaigns)))
}

/// GET /api/housing/campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(campaign)))
}

/// PUT /api/housing/campaigns/{id}
pub async fn update_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCampaignRequest>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    input.validate()?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    let status = campaign.status()?;
    if !status.is_editable() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Campaign cannot be edited while '{}'",
            status.as_str()
        ))));
    }
    validate_dates(
        input.starts_on.or(campaign.starts_on),
        input.ends_on.or(campaign.ends_on),
    )?;

    let update_dto = UpdateCampaign {
        name: input.name,
        academic_year: input.academic_year,
        starts_on: input.starts_on,
        ends_on: input.ends_on,
    };
    let updated = CampaignRepo::update(&state.pool, id, &update_dto)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Conflict("Campaign is no longer editable".into())))?;
    tracing::info!(campaign_id = id, actor = scope.user_id(), "Campaign updated");
    Ok(Json(DataResponse::new(updated)))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/housing/campaigns/{id}/open
pub async fn open_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    if campaign.status()? != CampaignStatus::Draft {
        return Err(AppError::Core(CoreError::Conflict(
            "Only a draft campaign can be opened; use reopen for a closed one".into(),
        )));
    }
    let updated = transition(&state, &scope, &campaign, CampaignStatus::Open).await?;
    publish(&state, &scope, EVT_CAMPAIGN_OPENED, &updated);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/housing/campaigns/{id}/close
pub async fn close_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    // Processing → Closed belongs to the batch run (failure or shutdown).
    if campaign.status()? == CampaignStatus::Processing {
        return Err(AppError::Core(CoreError::Conflict(
            "Campaign is being processed".into(),
        )));
    }
    let updated = transition(&state, &scope, &campaign, CampaignStatus::Closed).await?;
    publish(&state, &scope, EVT_CAMPAIGN_CLOSED, &updated);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/housing/campaigns/{id}/reopen
pub async fn reopen_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    if campaign.status()? != CampaignStatus::Closed {
        return Err(AppError::Core(CoreError::Conflict(
            "Only a closed campaign can be reopened".into(),
        )));
    }
    let updated = transition(&state, &scope, &campaign, CampaignStatus::Open).await?;
    publish(&state, &scope, EVT_CAMPAIGN_OPENED, &updated);
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/housing/campaigns/{id}/cancel
pub async fn cancel_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingCampaign>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    let updated = transition(&state, &scope, &campaign, CampaignStatus::Cancelled).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// POST /api/housing/campaigns/{id}/process
///
/// Starts bed assignment in the background and answers 202 with the
/// initial progress. Poll `GET …/progress` for updates.
pub async fn process_campaign(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<CampaignProgress>>)> {
    scope.require(&state.pool, PERM_HOUSING_PROCESS).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    ensure_transition(campaign.status()?, CampaignStatus::Processing)?;

    let batch = HousingBatch::new(
        state.pool.clone(),
        state.event_bus.clone(),
        state.config.housing_batch_chunk_size,
        state.batch_tasks.clone(),
    );
    let started = batch.start(&campaign, scope.user_id()).await?;
    let progress = CampaignProgress::from_campaign(&started)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse::new(progress))))
}

/// GET /api/housing/campaigns/{id}/progress
pub async fn campaign_progress(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CampaignProgress>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let campaign = find_campaign_in_scope(&state, &scope, id).await?;
    Ok(Json(DataResponse::new(CampaignProgress::from_campaign(&campaign)?)))
}

/// GET /api/housing/campaigns/{id}/report
pub async fn campaign_report(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CampaignReport>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    find_campaign_in_scope(&state, &scope, id).await?;
    let report = CampaignRepo::report(&state.pool, id).await?;
    Ok(Json(DataResponse::new(report)))
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// POST /api/housing/campaigns/{id}/applications
pub async fn create_application(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(campaign_id): Path<DbId>,
    Json(input): Json<CreateApplicationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<HousingApplication>>)> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    input.validate()?;
    let gender = Gender::parse(&input.gender)?;
    let campaign = find_campaign_in_scope(&state, &scope, campaign_id).await?;
    housing::ensure_accepting_applications(campaign.status()?)?;

    let create_dto = CreateApplication {
        campaign_id,
        student_ref: input.student_ref.trim().to_string(),
        student_name: input.student_name,
        gender,
        priority_score: input.priority_score,
        preferred_residence: input
            .preferred_residence
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    };
    let created = ApplicationRepo::create(&state.pool, &create_dto).await?;
    tracing::info!(application_id = created.id, campaign_id, actor = scope.user_id(), "Application submitted");
    Ok((StatusCode::CREATED, Json(DataResponse::new(created))))
}

/// GET /api/housing/campaigns/{id}/applications
pub async fn list_applications(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(campaign_id): Path<DbId>,
    Query(params): Query<StatusListParams>,
) -> AppResult<Json<DataResponse<Vec<HousingApplication>>>> {
    scope.require(&state.pool, PERM_HOUSING_READ).await?;
    let status = parse_status_filter::<ApplicationStatus>(params.status.as_deref())?;
    find_campaign_in_scope(&state, &scope, campaign_id).await?;
    let (limit, offset) = crou_core::pagination::page(params.limit, params.offset);
    let rows = ApplicationRepo::list(&state.pool, campaign_id, status, limit, offset).await?;
    Ok(Json(DataResponse::new(rows)))
}

/// POST /api/housing/applications/{id}/withdraw
pub async fn withdraw_application(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HousingApplication>>> {
    scope.require(&state.pool, PERM_HOUSING_WRITE).await?;
    let application = ApplicationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Application", id }))?;
    let campaign = CampaignRepo::find_by_id(&state.pool, application.campaign_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Application", id }))?;
    scope.ensure_owned(&state.pool, campaign.tenant_id, "Application", id).await?;
    housing::ensure_accepting_applications(campaign.status()?)?;

    let withdrawn = ApplicationRepo::withdraw(&state.pool, id).await?.ok_or_else(|| {
        AppError::Core(CoreError::Conflict("Application is no longer pending".into()))
    })?;
    tracing::info!(application_id = id, actor = scope.user_id(), "Application withdrawn");
    Ok(Json(DataResponse::new(withdrawn)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_campaign_in_scope(
    state: &AppState,
    scope: &TenantScope,
    id: DbId,
) -> AppResult<HousingCampaign> {
    let campaign = CampaignRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Campaign", id }))?;
    scope.ensure_owned(&state.pool, campaign.tenant_id, "Campaign", id).await?;
    Ok(campaign)
}

async fn transition(
    state: &AppState,
    scope: &TenantScope,
    campaign: &HousingCampaign,
    to: CampaignStatus,
) -> AppResult<HousingCampaign> {
    let from = campaign.status()?;
    ensure_transition(from, to)?;
    let updated = CampaignRepo::transition(&state.pool, campaign.id, from, to, None, None)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Campaign status changed concurrently; reload and retry".into(),
            ))
        })?;
    tracing::info!(
        campaign_id = campaign.id,
        from = from.as_str(),
        to = to.as_str(),
        actor = scope.user_id(),
        "Campaign status changed"
    );
    Ok(updated)
}

fn validate_dates(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> Result<(), CoreError> {
    match (starts_on, ends_on) {
        (Some(start), Some(end)) if end < start => Err(CoreError::Validation(format!(
            "endsOn ({end}) is before startsOn ({start})"
        ))),
        _ => Ok(()),
    }
}

fn publish(state: &AppState, scope: &TenantScope, event_type: &str, campaign: &HousingCampaign) {
    state.publish(
        PlatformEvent::new(event_type)
            .with_source(ENTITY_CAMPAIGN, campaign.id)
            .with_actor(scope.user_id())
            .with_tenant(campaign.tenant_id)
            .with_payload(serde_json::json!({
                "name": campaign.name,
                "academicYear": campaign.academic_year,
            })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_ordered() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        assert!(validate_dates(d("2026-09-01"), d("2026-10-01")).is_ok());
        assert!(validate_dates(d("2026-09-01"), None).is_ok());
        assert!(validate_dates(d("2026-10-01"), d("2026-09-01")).is_err());
    }
}
