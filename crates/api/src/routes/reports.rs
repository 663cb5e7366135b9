//! Route definitions for the `/reports` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::reports;
use crate::state::AppState;

/// Routes mounted at `/reports`.
///
/// ```text
/// GET    /overview         -> overview
/// GET    /budgets.csv      -> budgets_csv
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(reports::overview))
        .route("/budgets.csv", get(reports::budgets_csv))
}
