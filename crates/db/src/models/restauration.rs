//! Restaurants, menus, meal tickets, meal sessions and stock.

use chrono::NaiveDate;
use crou_core::error::CoreError;
use crou_core::restauration::{MealStatus, MealType, TicketStatus};
use crou_core::status::{self, StatusEnum, StatusId};
use crou_core::types::{Amount, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `restaurants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: DbId,
    pub tenant_id: DbId,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateRestaurant {
    pub tenant_id: DbId,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRestaurant {
    pub name: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

/// A row from the `menus` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub id: DbId,
    pub restaurant_id: DbId,
    pub menu_date: NaiveDate,
    pub meal_type: String,
    pub description: String,
    pub price: Amount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateMenu {
    pub restaurant_id: DbId,
    pub menu_date: NaiveDate,
    pub meal_type: MealType,
    pub description: String,
    pub price: Amount,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenu {
    pub description: Option<String>,
    pub price: Option<Amount>,
}

/// A row from the `meal_tickets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealTicket {
    pub id: DbId,
    pub tenant_id: DbId,
    pub ticket_number: String,
    pub qr_code: String,
    pub meal_type: Option<String>,
    pub price: Amount,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<TicketStatus, _>")]
    pub status_id: StatusId,
    pub batch_ref: String,
    pub used_at: Option<Timestamp>,
    pub used_meal_id: Option<DbId>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MealTicket {
    pub fn status(&self) -> Result<TicketStatus, CoreError> {
        TicketStatus::try_from_id(self.status_id)
    }

    pub fn meal(&self) -> Result<Option<MealType>, CoreError> {
        self.meal_type.as_deref().map(MealType::parse).transpose()
    }
}

/// One ticket of a generated batch, numbered and hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_number: String,
    pub qr_code: String,
}

/// Shared attributes of a ticket batch.
#[derive(Debug)]
pub struct TicketBatch {
    pub tenant_id: DbId,
    pub meal_type: Option<MealType>,
    pub price: Amount,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub batch_ref: String,
    pub created_by: Option<DbId>,
}

/// A row from the `meals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: DbId,
    pub restaurant_id: DbId,
    pub menu_id: Option<DbId>,
    pub service_date: NaiveDate,
    pub meal_type: String,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<MealStatus, _>")]
    pub status_id: StatusId,
    pub expected_count: Option<i32>,
    pub served_count: i32,
    pub started_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Meal {
    pub fn status(&self) -> Result<MealStatus, CoreError> {
        MealStatus::try_from_id(self.status_id)
    }

    pub fn meal(&self) -> Result<MealType, CoreError> {
        MealType::parse(&self.meal_type)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMeal {
    pub restaurant_id: DbId,
    pub menu_id: Option<DbId>,
    pub service_date: NaiveDate,
    pub meal_type: MealType,
    pub expected_count: Option<i32>,
}

/// A row from the `stock_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: DbId,
    pub restaurant_id: DbId,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub alert_threshold: f64,
    pub unit_cost: Option<Amount>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateStockItem {
    pub restaurant_id: DbId,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub alert_threshold: f64,
    pub unit_cost: Option<Amount>,
}

/// A row from the `stock_movements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: DbId,
    pub stock_item_id: DbId,
    pub kind: String,
    pub quantity: f64,
    pub resulting_quantity: f64,
    pub reason: Option<String>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}
