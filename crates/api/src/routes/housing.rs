//! Route definitions for the `/housing` module.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{campaigns, housing};
use crate::state::AppState;

/// Routes mounted at `/housing`.
///
/// ```text
/// GET    /rooms                              -> list_rooms
/// POST   /rooms                              -> create_room
/// GET    /rooms/{id}                         -> get_room
/// PUT    /rooms/{id}                         -> update_room
/// DELETE /rooms/{id}                         -> delete_room
/// GET    /rooms/{id}/beds                    -> list_beds
/// PUT    /beds/{id}/status                   -> set_bed_status
///
/// GET    /campaigns                          -> list_campaigns
/// POST   /campaigns                          -> create_campaign
/// GET    /campaigns/{id}                     -> get_campaign
/// PUT    /campaigns/{id}                     -> update_campaign
/// POST   /campaigns/{id}/open                -> open_campaign
/// POST   /campaigns/{id}/close               -> close_campaign
/// POST   /campaigns/{id}/reopen              -> reopen_campaign
/// POST   /campaigns/{id}/cancel              -> cancel_campaign
/// POST   /campaigns/{id}/process             -> process_campaign (202)
/// GET    /campaigns/{id}/progress            -> campaign_progress
/// GET    /campaigns/{id}/report              -> campaign_report
/// GET    /campaigns/{id}/applications        -> list_applications
/// POST   /campaigns/{id}/applications        -> create_application
/// POST   /applications/{id}/withdraw         -> withdraw_application
///
/// GET    /occupancies                        -> list_occupancies
/// POST   /occupancies/{id}/end               -> end_occupancy
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        // Rooms and beds
        .route("/rooms", get(housing::list_rooms).post(housing::create_room))
        .route(
            "/rooms/{id}",
            get(housing::get_room)
                .put(housing::update_room)
                .delete(housing::delete_room),
        )
        .route("/rooms/{id}/beds", get(housing::list_beds))
        .route("/beds/{id}/status", put(housing::set_bed_status))
        // Campaigns
        .route(
            "/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/campaigns/{id}",
            get(campaigns::get_campaign).put(campaigns::update_campaign),
        )
        .route("/campaigns/{id}/open", post(campaigns::open_campaign))
        .route("/campaigns/{id}/close", post(campaigns::close_campaign))
        .route("/campaigns/{id}/reopen", post(campaigns::reopen_campaign))
        .route("/campaigns/{id}/cancel", post(campaigns::cancel_campaign))
        .route("/campaigns/{id}/process", post(campaigns::process_campaign))
        .route("/campaigns/{id}/progress", get(campaigns::campaign_progress))
        .route("/campaigns/{id}/report", get(campaigns::campaign_report))
        .route(
            "/campaigns/{id}/applications",
            get(campaigns::list_applications).post(campaigns::create_application),
        )
        .route(
            "/applications/{id}/withdraw",
            post(campaigns::withdraw_application),
        )
        // Occupancies
        .route("/occupancies", get(housing::list_occupancies))
        .route("/occupancies/{id}/end", post(housing::end_occupancy))
}
