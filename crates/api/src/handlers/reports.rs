//! Consolidated reporting across the caller's tenant subtree.

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::Json;
use crou_core::budget::{execution_rate, BudgetAmounts};
use crou_core::reporting::{rate, render_csv};
use crou_core::roles::PERM_REPORTS_READ;
use crou_core::types::DbId;
use crou_db::models::report::{
    BudgetReportRow, FinanceTotals, HousingTotals, RestaurationTotals, TransportTotals,
};
use crou_db::repositories::ReportRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::scope::TenantScope;
use crate::response::DataResponse;
use crate::state::AppState;

const BUDGET_CSV_HEADER: [&str; 10] = [
    "tenant_code",
    "tenant_name",
    "tenant_type",
    "fiscal_year",
    "status",
    "initial_amount",
    "received_amount",
    "allocated_amount",
    "spent_amount",
    "available_amount",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub tenant_id: Option<DbId>,
    pub fiscal_year: Option<i32>,
}

/// Percentages derived from the raw totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewRates {
    /// Spent over total budget.
    pub budget_execution: f64,
    pub budget_allocation: f64,
    pub bed_occupancy: f64,
    pub ticket_usage: f64,
    pub vehicle_availability: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub tenant_id: DbId,
    pub fiscal_year: Option<i32>,
    pub finance: FinanceTotals,
    pub housing: HousingTotals,
    pub restauration: RestaurationTotals,
    pub transport: TransportTotals,
    pub rates: OverviewRates,
}

/// GET /api/reports/overview
pub async fn overview(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<DataResponse<Overview>>> {
    scope.require(&state.pool, PERM_REPORTS_READ).await?;
    let tenant = scope.owner_tenant(&state.pool, params.tenant_id).await?;

    let finance = ReportRepo::finance_totals(&state.pool, &tenant.path, params.fiscal_year).await?;
    let housing = ReportRepo::housing_totals(&state.pool, &tenant.path).await?;
    let restauration = ReportRepo::restauration_totals(&state.pool, &tenant.path).await?;
    let transport = ReportRepo::transport_totals(&state.pool, &tenant.path).await?;

    let rates = compute_rates(&finance, &housing, &restauration, &transport);
    Ok(Json(DataResponse::new(Overview {
        tenant_id: tenant.id,
        fiscal_year: params.fiscal_year,
        finance,
        housing,
        restauration,
        transport,
        rates,
    })))
}

/// GET /api/reports/budgets.csv
///
/// One line per budget in scope. Returns `text/csv`.
pub async fn budgets_csv(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(params): Query<ReportParams>,
) -> AppResult<(StatusCode, [(HeaderName, &'static str); 2], String)> {
    scope.require(&state.pool, PERM_REPORTS_READ).await?;
    let path = scope.list_path(&state.pool, params.tenant_id).await?;
    let rows = ReportRepo::budget_rows(&state.pool, &path, params.fiscal_year).await?;
    tracing::debug!(rows = rows.len(), actor = scope.user_id(), "Budget export rendered");

    let csv = render_csv(&BUDGET_CSV_HEADER, rows.iter().map(budget_csv_row));
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"budgets.csv\""),
        ],
        csv,
    ))
}

fn budget_csv_row(row: &BudgetReportRow) -> Vec<String> {
    let available = BudgetAmounts {
        initial: row.initial_amount,
        received: row.received_amount,
        allocated: row.allocated_amount,
        spent: row.spent_amount,
    }
    .available();
    vec![
        row.tenant_code.clone(),
        row.tenant_name.clone(),
        row.tenant_type.clone(),
        row.fiscal_year.to_string(),
        row.status.clone(),
        row.initial_amount.to_string(),
        row.received_amount.to_string(),
        row.allocated_amount.to_string(),
        row.spent_amount.to_string(),
        available.to_string(),
    ]
}

fn compute_rates(
    finance: &FinanceTotals,
    housing: &HousingTotals,
    restauration: &RestaurationTotals,
    transport: &TransportTotals,
) -> OverviewRates {
    let issued = restauration.active_tickets + restauration.used_tickets;
    OverviewRates {
        budget_execution: execution_rate(finance.spent_amount, finance.total_amount),
        budget_allocation: rate(finance.allocated_amount, finance.total_amount),
        bed_occupancy: rate(housing.occupied_beds, housing.bed_count),
        ticket_usage: rate(restauration.used_tickets, issued),
        vehicle_availability: rate(transport.available_vehicles, transport.vehicle_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_handle_empty_totals() {
        let rates = compute_rates(
            &FinanceTotals::default(),
            &HousingTotals::default(),
            &RestaurationTotals::default(),
            &TransportTotals::default(),
        );
        assert_eq!(rates.budget_execution, 0.0);
        assert_eq!(rates.bed_occupancy, 0.0);
        assert_eq!(rates.ticket_usage, 0.0);
    }

    #[test]
    fn rates_from_totals() {
        let finance = FinanceTotals {
            budget_count: 2,
            total_amount: 1_000,
            allocated_amount: 250,
            spent_amount: 500,
            pending_allocations: 0,
        };
        let housing = HousingTotals {
            room_count: 1,
            bed_count: 4,
            occupied_beds: 3,
            maintenance_beds: 0,
        };
        let rates = compute_rates(
            &finance,
            &housing,
            &RestaurationTotals::default(),
            &TransportTotals::default(),
        );
        assert_eq!(rates.budget_execution, 50.0);
        assert_eq!(rates.budget_allocation, 25.0);
        assert_eq!(rates.bed_occupancy, 75.0);
    }

    #[test]
    fn csv_row_includes_available_amount() {
        let row = BudgetReportRow {
            tenant_id: 2,
            tenant_code: "CROU-NY".into(),
            tenant_name: "CROU Niamey".into(),
            tenant_type: "crou".into(),
            fiscal_year: 2026,
            status: "approved".into(),
            initial_amount: 1_000,
            received_amount: 200,
            allocated_amount: 300,
            spent_amount: 100,
        };
        let cells = budget_csv_row(&row);
        assert_eq!(cells.len(), BUDGET_CSV_HEADER.len());
        assert_eq!(cells.last().map(String::as_str), Some("800"));
    }
}
