//! Liveness and readiness probe, mounted at the root.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use crou_db::repositories::TenantRepo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, `degraded` (database unreachable) or `uninitialized` (no
    /// tenant yet, nobody can log in).
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub bootstrapped: bool,
}

/// GET /health
///
/// Answers 503 while the database is unreachable so load balancers stop
/// routing to this instance.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_healthy = crou_db::health_check(&state.pool).await.is_ok();
    let bootstrapped = db_healthy
        && TenantRepo::any_exists(&state.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Health check could not inspect tenants");
                false
            });

    let (code, status) = match (db_healthy, bootstrapped) {
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        (true, false) => (StatusCode::OK, "uninitialized"),
        (true, true) => (StatusCode::OK, "ok"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            db_healthy,
            bootstrapped,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
