pub mod admin;
pub mod auth;
pub mod finance;
pub mod health;
pub mod housing;
pub mod notifications;
pub mod reports;
pub mod restauration;
pub mod tenants;
pub mod transport;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/login                           login (public)
/// /auth/refresh                         refresh (public)
/// /auth/logout                          logout (requires auth)
/// /users/me                             current user profile
///
/// /admin/users                          user management (users:manage)
/// /roles                                role catalogue
/// /tenants                              tenant hierarchy (tenants:*)
///
/// /budgets                              budgets and their transactions
/// /allocations                          allocations between budgets
/// /transactions                         transaction validation
///
/// /housing/rooms, /beds, /campaigns,
///   /applications, /occupancies         housing
/// /restauration/restaurants, /menus,
///   /meals, /tickets, /stock            food service
/// /transport/vehicles, /drivers,
///   /routes                             fleet
///
/// /notifications                        current user's inbox
/// /reports                              consolidated reports (reports:read)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication and the current user.
        .nest("/auth", auth::router())
        .nest("/users", auth::users_router())
        // Administration.
        .nest("/admin", admin::router())
        .nest("/roles", admin::roles_router())
        .nest("/tenants", tenants::router())
        // Finance.
        .nest("/budgets", finance::budgets_router())
        .nest("/allocations", finance::allocations_router())
        .nest("/transactions", finance::transactions_router())
        // Services.
        .nest("/housing", housing::router())
        .nest("/restauration", restauration::router())
        .nest("/transport", transport::router())
        // Cross-cutting.
        .nest("/notifications", notifications::router())
        .nest("/reports", reports::router())
}
