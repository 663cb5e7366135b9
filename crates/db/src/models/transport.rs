//! Vehicles, drivers and routes.

use chrono::{NaiveDate, NaiveTime};
use crou_core::error::CoreError;
use crou_core::status::{self, StatusEnum, StatusId};
use crou_core::transport::VehicleStatus;
use crou_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `vehicles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: DbId,
    pub tenant_id: DbId,
    pub plate_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub capacity: i32,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<VehicleStatus, _>")]
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Vehicle {
    pub fn status(&self) -> Result<VehicleStatus, CoreError> {
        VehicleStatus::try_from_id(self.status_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateVehicle {
    pub tenant_id: DbId,
    pub plate_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub capacity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVehicle {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub capacity: Option<i32>,
}

/// A row from the `drivers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DbId,
    pub tenant_id: DbId,
    pub full_name: String,
    pub license_number: String,
    pub license_expires_on: NaiveDate,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateDriver {
    pub tenant_id: DbId,
    pub full_name: String,
    pub license_number: String,
    pub license_expires_on: NaiveDate,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDriver {
    pub full_name: Option<String>,
    pub license_expires_on: Option<NaiveDate>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// A row from the `transport_routes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportRoute {
    pub id: DbId,
    pub tenant_id: DbId,
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: Option<NaiveTime>,
    pub vehicle_id: Option<DbId>,
    pub driver_id: Option<DbId>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoute {
    pub tenant_id: DbId,
    pub code: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoute {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_time: Option<NaiveTime>,
    pub is_active: Option<bool>,
}
