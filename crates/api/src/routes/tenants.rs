//! Route definitions for the `/tenants` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::tenants;
use crate::state::AppState;

/// Routes mounted at `/tenants`.
///
/// ```text
/// GET    /                   -> list_tenants
/// POST   /                   -> create_tenant
/// GET    /{id}               -> get_tenant
/// PUT    /{id}               -> update_tenant
/// DELETE /{id}               -> deactivate_tenant
/// GET    /{id}/children      -> list_children
/// GET    /{id}/descendants   -> list_descendants
/// GET    /{id}/ancestors     -> list_ancestors
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tenants::list_tenants).post(tenants::create_tenant))
        .route(
            "/{id}",
            get(tenants::get_tenant)
                .put(tenants::update_tenant)
                .delete(tenants::deactivate_tenant),
        )
        .route("/{id}/children", get(tenants::list_children))
        .route("/{id}/descendants", get(tenants::list_descendants))
        .route("/{id}/ancestors", get(tenants::list_ancestors))
}
