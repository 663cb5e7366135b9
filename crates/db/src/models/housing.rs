//! Rooms, beds, campaigns, applications and occupancies.

use chrono::NaiveDate;
use crou_core::error::CoreError;
use crou_core::housing::{
    ApplicationCandidate, ApplicationStatus, BedCandidate, BedStatus, CampaignStatus, Gender,
    OccupancyStatus, RoomGender,
};
use crou_core::status::{self, StatusEnum, StatusId};
use crou_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `rooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: DbId,
    pub tenant_id: DbId,
    pub residence: String,
    pub number: String,
    pub floor: Option<i32>,
    pub capacity: i32,
    pub gender: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    pub tenant_id: DbId,
    pub residence: String,
    pub number: String,
    pub floor: Option<i32>,
    pub capacity: i32,
    pub gender: RoomGender,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoom {
    pub residence: Option<String>,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    pub gender: Option<RoomGender>,
    pub is_active: Option<bool>,
}

/// A row from the `beds` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: DbId,
    pub room_id: DbId,
    pub label: String,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<BedStatus, _>")]
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Available bed joined with its room, as fed to the assignment planner.
#[derive(Debug, Clone, FromRow)]
pub struct FreeBed {
    pub id: DbId,
    pub room_id: DbId,
    pub residence: String,
    pub room_number: String,
    pub label: String,
    pub room_gender: String,
}

impl FreeBed {
    pub fn into_candidate(self) -> Result<BedCandidate, CoreError> {
        Ok(BedCandidate {
            id: self.id,
            room_id: self.room_id,
            residence: self.residence,
            room_number: self.room_number,
            label: self.label,
            room_gender: RoomGender::parse(&self.room_gender)?,
        })
    }
}

/// A row from the `housing_campaigns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingCampaign {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub academic_year: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<CampaignStatus, _>")]
    pub status_id: StatusId,
    pub total_to_process: i32,
    pub processed_count: i32,
    pub assigned_count: i32,
    pub unassigned_count: i32,
    pub processing_started_at: Option<Timestamp>,
    pub processing_finished_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HousingCampaign {
    pub fn status(&self) -> Result<CampaignStatus, CoreError> {
        CampaignStatus::try_from_id(self.status_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    pub tenant_id: DbId,
    pub name: String,
    pub academic_year: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub created_by: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub academic_year: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

/// Snapshot polled by clients while a campaign is processing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgress {
    pub campaign_id: DbId,
    pub status: CampaignStatus,
    pub total: i32,
    pub processed: i32,
    pub assigned: i32,
    pub unassigned: i32,
    pub percent: i64,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl CampaignProgress {
    pub fn from_campaign(campaign: &HousingCampaign) -> Result<Self, CoreError> {
        Ok(Self {
            campaign_id: campaign.id,
            status: campaign.status()?,
            total: campaign.total_to_process,
            processed: campaign.processed_count,
            assigned: campaign.assigned_count,
            unassigned: campaign.unassigned_count,
            percent: crou_core::housing::progress_percent(
                i64::from(campaign.processed_count),
                i64::from(campaign.total_to_process),
            ),
            started_at: campaign.processing_started_at,
            finished_at: campaign.processing_finished_at,
            last_error: campaign.last_error.clone(),
        })
    }
}

/// A row from the `housing_applications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingApplication {
    pub id: DbId,
    pub campaign_id: DbId,
    pub student_ref: String,
    pub student_name: String,
    pub gender: String,
    pub priority_score: i32,
    pub preferred_residence: Option<String>,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<ApplicationStatus, _>")]
    pub status_id: StatusId,
    pub bed_id: Option<DbId>,
    pub unassigned_reason: Option<String>,
    pub submitted_at: Timestamp,
    pub decided_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HousingApplication {
    pub fn status(&self) -> Result<ApplicationStatus, CoreError> {
        ApplicationStatus::try_from_id(self.status_id)
    }

    pub fn to_candidate(&self) -> Result<ApplicationCandidate, CoreError> {
        Ok(ApplicationCandidate {
            id: self.id,
            gender: Gender::parse(&self.gender)?,
            priority_score: self.priority_score,
            submitted_at: self.submitted_at,
            preferred_residence: self.preferred_residence.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateApplication {
    pub campaign_id: DbId,
    pub student_ref: String,
    pub student_name: String,
    pub gender: Gender,
    pub priority_score: i32,
    pub preferred_residence: Option<String>,
}

/// A row from the `housing_occupancies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub id: DbId,
    pub bed_id: DbId,
    pub application_id: Option<DbId>,
    pub student_ref: String,
    pub student_name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<OccupancyStatus, _>")]
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-campaign outcome counts for the campaign report.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReport {
    pub campaign_id: DbId,
    pub total_applications: i64,
    pub pending: i64,
    pub assigned: i64,
    pub unassigned: i64,
    pub withdrawn: i64,
    pub assignment_rate: f64,
    pub by_residence: Vec<ResidenceCount>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidenceCount {
    pub residence: String,
    pub assigned: i64,
}
