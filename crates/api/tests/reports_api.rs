//! Consolidated overview and CSV export.

mod common;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use common::{
    body_text, build_test_app, create_user, expect_data, get_auth, post_json_auth, seed_hierarchy,
    token_for, Hierarchy,
};
use crou_core::types::DbId;
use sqlx::PgPool;

async fn budget(pool: &PgPool, token: &str, tenant_id: DbId, title: &str, initial: i64) {
    let body = serde_json::json!({
        "tenantId": tenant_id,
        "fiscalYear": 2026,
        "title": title,
        "initialAmount": initial,
    });
    let response = post_json_auth(build_test_app(pool.clone()), "/api/budgets", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Region and both CROUs get a budget; the ministry user creates them all.
async fn seed_budgets(pool: &PgPool) -> Hierarchy {
    let tree = seed_hierarchy(pool).await;
    let user = create_user(pool, tree.ministry.id, "gestionnaire", "gest@min.ne").await;
    let token = token_for(&user, "gestionnaire");
    budget(pool, &token, tree.region.id, "Région Niamey", 1_000_000).await;
    budget(pool, &token, tree.crou.id, "CROU Niamey", 400_000).await;
    budget(pool, &token, tree.other_crou.id, "Fonctionnement, Dosso", 250_000).await;
    tree
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overview_covers_subtree(pool: PgPool) {
    let tree = seed_budgets(&pool).await;
    let reader = create_user(&pool, tree.region.id, "lecteur", "lect@region.ne").await;
    let token = token_for(&reader, "lecteur");

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/reports/overview", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["tenantId"], tree.region.id);
    assert_eq!(data["finance"]["budgetCount"], 3);
    assert_eq!(data["finance"]["totalAmount"], 1_650_000);
    assert_eq!(data["rates"]["budgetExecution"], 0.0);
    assert_eq!(data["housing"]["bedCount"], 0);

    // Narrowed to one CROU.
    let data = expect_data(
        get_auth(
            build_test_app(pool.clone()),
            &format!("/api/reports/overview?tenantId={}&fiscalYear=2026", tree.crou.id),
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["finance"]["budgetCount"], 1);
    assert_eq!(data["finance"]["totalAmount"], 400_000);

    // Another year has nothing.
    let data = expect_data(
        get_auth(build_test_app(pool), "/api/reports/overview?fiscalYear=2025", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["finance"]["budgetCount"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overview_outside_scope_is_404(pool: PgPool) {
    let tree = seed_budgets(&pool).await;
    let reader = create_user(&pool, tree.crou.id, "lecteur", "lect@crou.ne").await;

    let response = get_auth(
        build_test_app(pool),
        &format!("/api/reports/overview?tenantId={}", tree.other_crou.id),
        &token_for(&reader, "lecteur"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_budget_csv_export(pool: PgPool) {
    let tree = seed_budgets(&pool).await;
    let reader = create_user(&pool, tree.region.id, "lecteur", "lect@region.ne").await;

    let response =
        get_auth(build_test_app(pool), "/api/reports/budgets.csv", &token_for(&reader, "lecteur")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE].to_str().unwrap(),
        "text/csv; charset=utf-8"
    );

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "tenant_code,tenant_name,tenant_type,fiscal_year,status,initial_amount,\
         received_amount,allocated_amount,spent_amount,available_amount"
    );
    // Ordered by hierarchy path: the region first.
    assert_eq!(lines[1], "REG-NY,REG-NY tenant,region,2026,draft,1000000,0,0,0,1000000");
    assert!(lines[2..].iter().any(|l| l.starts_with("CROU-NY,")));
    assert!(lines[2..].iter().any(|l| l.starts_with("CROU-DS,")));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reports_require_authentication(pool: PgPool) {
    let response = common::get(build_test_app(pool), "/api/reports/overview").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
