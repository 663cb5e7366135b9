//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Steps that must run inside
//! a caller-held transaction take `&mut PgConnection` instead.
//!
//! List methods scoped to a tenant subtree take the caller's materialized
//! tenant path and match every tenant whose path starts with it.

pub mod allocation_repo;
pub mod application_repo;
pub mod budget_repo;
pub mod campaign_repo;
pub mod driver_repo;
pub mod event_repo;
pub mod meal_repo;
pub mod notification_repo;
pub mod occupancy_repo;
pub mod refresh_token_repo;
pub mod report_repo;
pub mod restaurant_repo;
pub mod role_repo;
pub mod room_repo;
pub mod route_repo;
pub mod stock_repo;
pub mod tenant_repo;
pub mod ticket_repo;
pub mod transaction_repo;
pub mod user_repo;
pub mod vehicle_repo;

pub use allocation_repo::AllocationRepo;
pub use application_repo::ApplicationRepo;
pub use budget_repo::BudgetRepo;
pub use campaign_repo::CampaignRepo;
pub use driver_repo::DriverRepo;
pub use event_repo::EventRepo;
pub use meal_repo::MealRepo;
pub use notification_repo::NotificationRepo;
pub use occupancy_repo::OccupancyRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use report_repo::ReportRepo;
pub use restaurant_repo::RestaurantRepo;
pub use role_repo::RoleRepo;
pub use room_repo::RoomRepo;
pub use route_repo::RouteRepo;
pub use stock_repo::StockRepo;
pub use tenant_repo::TenantRepo;
pub use ticket_repo::TicketRepo;
pub use transaction_repo::TransactionRepo;
pub use user_repo::UserRepo;
pub use vehicle_repo::VehicleRepo;

/// A column list qualified with a table alias, for joins.
pub(crate) fn qualified(alias: &str, columns: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
