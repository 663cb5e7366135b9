//! Route definitions for the `/transport` module.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::transport;
use crate::state::AppState;

/// Routes mounted at `/transport`.
///
/// ```text
/// GET    /vehicles               -> list_vehicles
/// POST   /vehicles               -> create_vehicle
/// GET    /vehicles/{id}          -> get_vehicle
/// PUT    /vehicles/{id}          -> update_vehicle
/// DELETE /vehicles/{id}          -> retire_vehicle
/// PUT    /vehicles/{id}/status   -> set_vehicle_status
/// GET    /drivers                -> list_drivers
/// POST   /drivers                -> create_driver
/// GET    /drivers/{id}           -> get_driver
/// PUT    /drivers/{id}           -> update_driver
/// DELETE /drivers/{id}           -> deactivate_driver
/// GET    /routes                 -> list_routes
/// POST   /routes                 -> create_route
/// GET    /routes/{id}            -> get_route
/// PUT    /routes/{id}            -> update_route
/// DELETE /routes/{id}            -> delete_route
/// POST   /routes/{id}/assign     -> assign_route
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/vehicles",
            get(transport::list_vehicles).post(transport::create_vehicle),
        )
        .route(
            "/vehicles/{id}",
            get(transport::get_vehicle)
                .put(transport::update_vehicle)
                .delete(transport::retire_vehicle),
        )
        .route("/vehicles/{id}/status", put(transport::set_vehicle_status))
        .route(
            "/drivers",
            get(transport::list_drivers).post(transport::create_driver),
        )
        .route(
            "/drivers/{id}",
            get(transport::get_driver)
                .put(transport::update_driver)
                .delete(transport::deactivate_driver),
        )
        .route(
            "/routes",
            get(transport::list_routes).post(transport::create_route),
        )
        .route(
            "/routes/{id}",
            get(transport::get_route)
                .put(transport::update_route)
                .delete(transport::delete_route),
        )
        .route("/routes/{id}/assign", post(transport::assign_route))
}
