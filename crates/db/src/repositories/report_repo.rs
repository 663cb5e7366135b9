//! Read-only aggregates over a tenant subtree.
//!
//! Every query takes the materialized path of the caller's scope and only
//! counts rows owned by tenants under it.

use crou_core::budget::AllocationStatus;
use crou_core::housing::BedStatus;
use crou_core::restauration::TicketStatus;
use crou_core::status::StatusEnum;
use crou_core::transport::VehicleStatus;
use sqlx::PgPool;

use crate::models::report::{
    BudgetReportRow, FinanceTotals, HousingTotals, RestaurationTotals, TransportTotals,
};

pub struct ReportRepo;

impl ReportRepo {
    /// One row per budget in scope, ordered by tenant path then year.
    pub async fn budget_rows(
        pool: &PgPool,
        scope_path: &str,
        fiscal_year: Option<i32>,
    ) -> Result<Vec<BudgetReportRow>, sqlx::Error> {
        sqlx::query_as::<_, BudgetReportRow>(
            "SELECT t.id AS tenant_id, t.code AS tenant_code, t.name AS tenant_name,
                    t.tenant_type, b.fiscal_year, s.name AS status,
                    b.initial_amount, b.received_amount, b.allocated_amount, b.spent_amount
             FROM budgets b
             JOIN tenants t ON t.id = b.tenant_id
             JOIN budget_statuses s ON s.id = b.status_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::INTEGER IS NULL OR b.fiscal_year = $2)
             ORDER BY t.path, b.fiscal_year",
        )
        .bind(scope_path)
        .bind(fiscal_year)
        .fetch_all(pool)
        .await
    }

    pub async fn finance_totals(
        pool: &PgPool,
        scope_path: &str,
        fiscal_year: Option<i32>,
    ) -> Result<FinanceTotals, sqlx::Error> {
        sqlx::query_as::<_, FinanceTotals>(
            "SELECT
                COUNT(b.id) AS budget_count,
                COALESCE(SUM(b.initial_amount + b.received_amount), 0)::BIGINT AS total_amount,
                COALESCE(SUM(b.allocated_amount), 0)::BIGINT AS allocated_amount,
                COALESCE(SUM(b.spent_amount), 0)::BIGINT AS spent_amount,
                (SELECT COUNT(*) FROM budget_allocations a
                   JOIN budgets sb ON sb.id = a.source_budget_id
                   JOIN tenants st ON st.id = sb.tenant_id
                  WHERE st.path LIKE $1 || '%'
                    AND a.status_id = $3
                    AND ($2::INTEGER IS NULL OR sb.fiscal_year = $2)) AS pending_allocations
             FROM budgets b
             JOIN tenants t ON t.id = b.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::INTEGER IS NULL OR b.fiscal_year = $2)",
        )
        .bind(scope_path)
        .bind(fiscal_year)
        .bind(AllocationStatus::Pending.id())
        .fetch_one(pool)
        .await
    }

    pub async fn housing_totals(
        pool: &PgPool,
        scope_path: &str,
    ) -> Result<HousingTotals, sqlx::Error> {
        sqlx::query_as::<_, HousingTotals>(
            "SELECT
                COUNT(DISTINCT r.id) AS room_count,
                COUNT(b.id) AS bed_count,
                COUNT(b.id) FILTER (WHERE b.status_id = $2) AS occupied_beds,
                COUNT(b.id) FILTER (WHERE b.status_id = $3) AS maintenance_beds
             FROM rooms r
             JOIN tenants t ON t.id = r.tenant_id
             LEFT JOIN beds b ON b.room_id = r.id
             WHERE t.path LIKE $1 || '%' AND r.is_active = true",
        )
        .bind(scope_path)
        .bind(BedStatus::Occupied.id())
        .bind(BedStatus::Maintenance.id())
        .fetch_one(pool)
        .await
    }

    pub async fn restauration_totals(
        pool: &PgPool,
        scope_path: &str,
    ) -> Result<RestaurationTotals, sqlx::Error> {
        sqlx::query_as::<_, RestaurationTotals>(
            "SELECT
                (SELECT COUNT(*) FROM restaurants r
                   JOIN tenants t ON t.id = r.tenant_id
                  WHERE t.path LIKE $1 || '%' AND r.is_active = true) AS restaurant_count,
                (SELECT COUNT(*) FROM meal_tickets mt
                   JOIN tenants t ON t.id = mt.tenant_id
                  WHERE t.path LIKE $1 || '%' AND mt.status_id = $2) AS active_tickets,
                (SELECT COUNT(*) FROM meal_tickets mt
                   JOIN tenants t ON t.id = mt.tenant_id
                  WHERE t.path LIKE $1 || '%' AND mt.status_id = $3) AS used_tickets,
                (SELECT COUNT(*) FROM stock_items s
                   JOIN restaurants r ON r.id = s.restaurant_id
                   JOIN tenants t ON t.id = r.tenant_id
                  WHERE t.path LIKE $1 || '%' AND s.quantity <= s.alert_threshold) AS low_stock_items",
        )
        .bind(scope_path)
        .bind(TicketStatus::Active.id())
        .bind(TicketStatus::Used.id())
        .fetch_one(pool)
        .await
    }

    pub async fn transport_totals(
        pool: &PgPool,
        scope_path: &str,
    ) -> Result<TransportTotals, sqlx::Error> {
        sqlx::query_as::<_, TransportTotals>(
            "SELECT
                (SELECT COUNT(*) FROM vehicles v
                   JOIN tenants t ON t.id = v.tenant_id
                  WHERE t.path LIKE $1 || '%' AND v.status_id <> $3) AS vehicle_count,
                (SELECT COUNT(*) FROM vehicles v
                   JOIN tenants t ON t.id = v.tenant_id
                  WHERE t.path LIKE $1 || '%' AND v.status_id = $2) AS available_vehicles,
                (SELECT COUNT(*) FROM drivers d
                   JOIN tenants t ON t.id = d.tenant_id
                  WHERE t.path LIKE $1 || '%' AND d.is_active = true) AS driver_count,
                (SELECT COUNT(*) FROM transport_routes r
                   JOIN tenants t ON t.id = r.tenant_id
                  WHERE t.path LIKE $1 || '%' AND r.is_active = true) AS route_count",
        )
        .bind(scope_path)
        .bind(VehicleStatus::Available.id())
        .bind(VehicleStatus::Retired.id())
        .fetch_one(pool)
        .await
    }
}
