//! Route definitions for the `/restauration` module.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{restaurants, stock, tickets};
use crate::state::AppState;

/// Routes mounted at `/restauration`.
///
/// ```text
/// GET    /restaurants                    -> list_restaurants
/// POST   /restaurants                    -> create_restaurant
/// GET    /restaurants/{id}               -> get_restaurant
/// PUT    /restaurants/{id}               -> update_restaurant
/// DELETE /restaurants/{id}               -> deactivate_restaurant
/// GET    /restaurants/{id}/menus         -> list_menus
/// POST   /restaurants/{id}/menus         -> create_menu
/// PUT    /menus/{id}                     -> update_menu
/// DELETE /menus/{id}                     -> delete_menu
/// GET    /restaurants/{id}/meals         -> list_meals
/// POST   /restaurants/{id}/meals         -> create_meal
/// POST   /meals/{id}/start               -> start_meal
/// POST   /meals/{id}/close               -> close_meal
/// POST   /meals/{id}/tickets             -> scan_ticket
///
/// POST   /tickets/batch                  -> generate_batch
/// GET    /tickets                        -> list_tickets
/// GET    /tickets/{number}               -> get_ticket
/// POST   /tickets/{number}/cancel        -> cancel_ticket
///
/// GET    /restaurants/{id}/stock         -> list_stock
/// POST   /restaurants/{id}/stock         -> create_stock_item
/// GET    /stock/low                      -> low_stock
/// GET    /stock/{id}/movements           -> list_movements
/// POST   /stock/{id}/movements           -> record_movement
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        // Restaurants, menus and meals
        .route(
            "/restaurants",
            get(restaurants::list_restaurants).post(restaurants::create_restaurant),
        )
        .route(
            "/restaurants/{id}",
            get(restaurants::get_restaurant)
                .put(restaurants::update_restaurant)
                .delete(restaurants::deactivate_restaurant),
        )
        .route(
            "/restaurants/{id}/menus",
            get(restaurants::list_menus).post(restaurants::create_menu),
        )
        .route(
            "/menus/{id}",
            put(restaurants::update_menu).delete(restaurants::delete_menu),
        )
        .route(
            "/restaurants/{id}/meals",
            get(restaurants::list_meals).post(restaurants::create_meal),
        )
        .route("/meals/{id}/start", post(restaurants::start_meal))
        .route("/meals/{id}/close", post(restaurants::close_meal))
        .route("/meals/{id}/tickets", post(tickets::scan_ticket))
        // Tickets
        .route("/tickets/batch", post(tickets::generate_batch))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/{number}", get(tickets::get_ticket))
        .route("/tickets/{number}/cancel", post(tickets::cancel_ticket))
        // Stock
        .route(
            "/restaurants/{id}/stock",
            get(stock::list_stock).post(stock::create_stock_item),
        )
        .route("/stock/low", get(stock::low_stock))
        .route(
            "/stock/{id}/movements",
            get(stock::list_movements).post(stock::record_movement),
        )
}
