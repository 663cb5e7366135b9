//! Route definitions for budgets, allocations and transactions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{allocations, budgets, transactions};
use crate::state::AppState;

/// Routes mounted at `/budgets`.
///
/// ```text
/// GET    /                      -> list_budgets
/// POST   /                      -> create_budget
/// GET    /{id}                  -> get_budget
/// PUT    /{id}                  -> update_budget
/// POST   /{id}/submit           -> submit_budget
/// POST   /{id}/approve          -> approve_budget
/// POST   /{id}/reject           -> reject_budget
/// POST   /{id}/close            -> close_budget
/// POST   /{id}/revise           -> revise_budget
/// GET    /{id}/transactions     -> list_transactions
/// POST   /{id}/transactions     -> create_transaction
/// ```
pub fn budgets_router() -> Router<AppState> {
    Router::new()
        .route("/", get(budgets::list_budgets).post(budgets::create_budget))
        .route("/{id}", get(budgets::get_budget).put(budgets::update_budget))
        .route("/{id}/submit", post(budgets::submit_budget))
        .route("/{id}/approve", post(budgets::approve_budget))
        .route("/{id}/reject", post(budgets::reject_budget))
        .route("/{id}/close", post(budgets::close_budget))
        .route("/{id}/revise", post(budgets::revise_budget))
        .route(
            "/{id}/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
}

/// Routes mounted at `/allocations`.
///
/// ```text
/// GET    /                 -> list_allocations
/// POST   /                 -> create_allocation
/// GET    /{id}             -> get_allocation
/// POST   /{id}/approve     -> approve_allocation
/// POST   /{id}/reject      -> reject_allocation
/// POST   /{id}/execute     -> execute_allocation
/// POST   /{id}/cancel      -> cancel_allocation
/// ```
pub fn allocations_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(allocations::list_allocations).post(allocations::create_allocation),
        )
        .route("/{id}", get(allocations::get_allocation))
        .route("/{id}/approve", post(allocations::approve_allocation))
        .route("/{id}/reject", post(allocations::reject_allocation))
        .route("/{id}/execute", post(allocations::execute_allocation))
        .route("/{id}/cancel", post(allocations::cancel_allocation))
}

/// Routes mounted at `/transactions`.
///
/// ```text
/// POST   /{id}/validate    -> validate_transaction
/// POST   /{id}/reject      -> reject_transaction
/// ```
pub fn transactions_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/validate", post(transactions::validate_transaction))
        .route("/{id}/reject", post(transactions::reject_transaction))
}
