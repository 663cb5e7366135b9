//! Health endpoint and router fallback.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, seed_hierarchy};
use sqlx::PgPool;

/// A fresh database is reachable but has no tenant yet.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_before_bootstrap(pool: PgPool) {
    let response = get(build_test_app(pool), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "uninitialized");
    assert_eq!(json["dbHealthy"], true);
    assert_eq!(json["bootstrapped"], false);
    assert!(json["version"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_reports_database(pool: PgPool) {
    seed_hierarchy(&pool).await;
    let response = get(build_test_app(pool), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["bootstrapped"], true);
}

/// Unmatched paths get the JSON error envelope and a request id.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_api_route_is_404(pool: PgPool) {
    let app = build_test_app(pool);
    let response = get(app, "/api/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
