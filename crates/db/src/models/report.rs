//! Aggregates backing the reporting endpoints.

use crou_core::types::{Amount, DbId};
use serde::Serialize;
use sqlx::FromRow;

/// One budget line of the consolidated budget export.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetReportRow {
    pub tenant_id: DbId,
    pub tenant_code: String,
    pub tenant_name: String,
    pub tenant_type: String,
    pub fiscal_year: i32,
    pub status: String,
    pub initial_amount: Amount,
    pub received_amount: Amount,
    pub allocated_amount: Amount,
    pub spent_amount: Amount,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceTotals {
    pub budget_count: i64,
    pub total_amount: Amount,
    pub allocated_amount: Amount,
    pub spent_amount: Amount,
    pub pending_allocations: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingTotals {
    pub room_count: i64,
    pub bed_count: i64,
    pub occupied_beds: i64,
    pub maintenance_beds: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurationTotals {
    pub restaurant_count: i64,
    pub active_tickets: i64,
    pub used_tickets: i64,
    pub low_stock_items: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportTotals {
    pub vehicle_count: i64,
    pub available_vehicles: i64,
    pub driver_count: i64,
    pub route_count: i64,
}
