//! HTTP-level integration tests for vehicles, drivers and routes.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    build_test_app, create_user, delete_auth, expect_data, get_auth, post_json_auth,
    put_json_auth, seed_hierarchy, token_for,
};
use crou_core::types::DbId;
use serde_json::json;
use sqlx::PgPool;

async fn fleet_token(pool: &PgPool) -> (String, common::Hierarchy) {
    let tree = seed_hierarchy(pool).await;
    let user = create_user(pool, tree.crou.id, "gestionnaire", "transport@crou.ne").await;
    (token_for(&user, "gestionnaire"), tree)
}

async fn create_vehicle(pool: &PgPool, token: &str, plate: &str) -> DbId {
    let data = expect_data(
        post_json_auth(
            build_test_app(pool.clone()),
            "/api/transport/vehicles",
            json!({ "plateNumber": plate, "brand": "Toyota", "model": "Coaster", "capacity": 30 }),
            token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    data["id"].as_i64().unwrap()
}

async fn create_driver(pool: &PgPool, token: &str, license: &str, expires_in_days: i64) -> DbId {
    let expires = Utc::now().date_naive() + Duration::days(expires_in_days);
    let data = expect_data(
        post_json_auth(
            build_test_app(pool.clone()),
            "/api/transport/drivers",
            json!({ "fullName": "Moussa Issoufou", "licenseNumber": license, "licenseExpiresOn": expires }),
            token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    data["id"].as_i64().unwrap()
}

async fn create_route(pool: &PgPool, token: &str, code: &str) -> DbId {
    let data = expect_data(
        post_json_auth(
            build_test_app(pool.clone()),
            "/api/transport/routes",
            json!({
                "code": code,
                "name": "Cité universitaire - Campus",
                "origin": "Cité universitaire",
                "destination": "Campus principal",
                "departureTime": "07:15:00",
            }),
            token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    data["id"].as_i64().unwrap()
}

async fn assign(pool: &PgPool, token: &str, route: DbId, body: serde_json::Value) -> axum::response::Response {
    post_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/transport/routes/{route}/assign"),
        body,
        token,
    )
    .await
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_vehicle_normalizes_plate(pool: PgPool) {
    let (token, tree) = fleet_token(&pool).await;
    let id = create_vehicle(&pool, &token, " ny-4521-a ").await;

    let data = expect_data(
        get_auth(build_test_app(pool), &format!("/api/transport/vehicles/{id}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["plateNumber"], "NY-4521-A");
    assert_eq!(data["status"], "available");
    assert_eq!(data["tenantId"], tree.crou.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_vehicle_validation(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;

    for body in [
        json!({ "plateNumber": "not a plate", "capacity": 30 }),
        json!({ "plateNumber": "NY-1", "capacity": 0 }),
        json!({ "plateNumber": "NY-2", "capacity": 121 }),
    ] {
        let response =
            post_json_auth(build_test_app(pool.clone()), "/api/transport/vehicles", body, &token).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    create_vehicle(&pool, &token, "NY-100").await;
    let response = post_json_auth(
        build_test_app(pool),
        "/api/transport/vehicles",
        json!({ "plateNumber": "ny-100", "capacity": 12 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_vehicle_status_changes(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    let id = create_vehicle(&pool, &token, "NY-200").await;
    let uri = format!("/api/transport/vehicles/{id}/status");

    let data = expect_data(
        put_json_auth(build_test_app(pool.clone()), &uri, json!({ "status": "maintenance" }), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["status"], "maintenance");

    // Same status again is not a transition.
    let response =
        put_json_auth(build_test_app(pool.clone()), &uri, json!({ "status": "maintenance" }), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        put_json_auth(build_test_app(pool.clone()), &uri, json!({ "status": "retired" }), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response =
        put_json_auth(build_test_app(pool), &uri, json!({ "status": "flying" }), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Retirement is terminal.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retire_vehicle(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    let id = create_vehicle(&pool, &token, "NY-300").await;
    let uri = format!("/api/transport/vehicles/{id}");

    let response = delete_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = delete_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &format!("{uri}/status"),
        json!({ "status": "available" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let data = expect_data(get_auth(build_test_app(pool), &uri, &token).await, StatusCode::OK).await;
    assert_eq!(data["status"], "retired");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_vehicles_are_scoped(pool: PgPool) {
    let (token, tree) = fleet_token(&pool).await;
    let id = create_vehicle(&pool, &token, "NY-400").await;

    let outsider = create_user(&pool, tree.other_crou.id, "gestionnaire", "transport@ds.ne").await;
    let outsider = token_for(&outsider, "gestionnaire");
    let response = get_auth(
        build_test_app(pool.clone()),
        &format!("/api/transport/vehicles/{id}"),
        &outsider,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/transport/vehicles", &outsider).await,
        StatusCode::OK,
    )
    .await;
    assert!(data.as_array().unwrap().is_empty());

    // The region sees its CROUs' fleets.
    let regional = create_user(&pool, tree.region.id, "lecteur", "lect@region.ne").await;
    let data = expect_data(
        get_auth(build_test_app(pool), "/api/transport/vehicles", &token_for(&regional, "lecteur")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_agent_cannot_register_vehicle(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let agent = create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;
    let response = post_json_auth(
        build_test_app(pool),
        "/api/transport/vehicles",
        json!({ "plateNumber": "NY-500", "capacity": 30 }),
        &token_for(&agent, "agent"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_driver_lifecycle(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    let id = create_driver(&pool, &token, "ne-2024-001", 365).await;
    let uri = format!("/api/transport/drivers/{id}");

    let data = expect_data(get_auth(build_test_app(pool.clone()), &uri, &token).await, StatusCode::OK).await;
    assert_eq!(data["licenseNumber"], "NE-2024-001");
    assert_eq!(data["isActive"], true);

    let data = expect_data(
        put_json_auth(build_test_app(pool.clone()), &uri, json!({ "phone": "+227 90 00 00 00" }), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["phone"], "+227 90 00 00 00");

    let response = delete_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = delete_auth(build_test_app(pool), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_license_conflicts(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    create_driver(&pool, &token, "NE-2024-002", 365).await;

    let response = post_json_auth(
        build_test_app(pool),
        "/api/transport/drivers",
        json!({
            "fullName": "Aïcha Mahamadou",
            "licenseNumber": "ne-2024-002",
            "licenseExpiresOn": Utc::now().date_naive(),
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_assign_route(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    let vehicle = create_vehicle(&pool, &token, "NY-600").await;
    let driver = create_driver(&pool, &token, "NE-2024-003", 30).await;
    let route = create_route(&pool, &token, "l1").await;

    let data = expect_data(
        assign(&pool, &token, route, json!({ "vehicleId": vehicle, "driverId": driver })).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["code"], "L1");
    assert_eq!(data["vehicleId"], vehicle);
    assert_eq!(data["driverId"], driver);
    assert_eq!(data["departureTime"], "07:15:00");

    // Retiring the vehicle detaches it.
    delete_auth(build_test_app(pool.clone()), &format!("/api/transport/vehicles/{vehicle}"), &token).await;
    let data = expect_data(
        get_auth(build_test_app(pool), &format!("/api/transport/routes/{route}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert!(data["vehicleId"].is_null());
    assert_eq!(data["driverId"], driver);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_assign_route_rules(pool: PgPool) {
    let (token, tree) = fleet_token(&pool).await;
    let route = create_route(&pool, &token, "L2").await;

    let response = assign(&pool, &token, route, json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Vehicle under maintenance.
    let vehicle = create_vehicle(&pool, &token, "NY-700").await;
    put_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/transport/vehicles/{vehicle}/status"),
        json!({ "status": "maintenance" }),
        &token,
    )
    .await;
    let response = assign(&pool, &token, route, json!({ "vehicleId": vehicle })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Expired license.
    let expired = create_driver(&pool, &token, "NE-2020-004", -1).await;
    let response = assign(&pool, &token, route, json!({ "driverId": expired })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Inactive driver.
    let inactive = create_driver(&pool, &token, "NE-2024-005", 100).await;
    delete_auth(build_test_app(pool.clone()), &format!("/api/transport/drivers/{inactive}"), &token).await;
    let response = assign(&pool, &token, route, json!({ "driverId": inactive })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Another CROU's vehicle is invisible.
    let outsider = create_user(&pool, tree.other_crou.id, "gestionnaire", "transport@ds.ne").await;
    let foreign = create_vehicle(&pool, &token_for(&outsider, "gestionnaire"), "DS-100").await;
    let response = assign(&pool, &token, route, json!({ "vehicleId": foreign })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_inactive_route_refuses_assignment(pool: PgPool) {
    let (token, _) = fleet_token(&pool).await;
    let route = create_route(&pool, &token, "L3").await;
    let vehicle = create_vehicle(&pool, &token, "NY-800").await;

    let data = expect_data(
        put_json_auth(
            build_test_app(pool.clone()),
            &format!("/api/transport/routes/{route}"),
            json!({ "isActive": false }),
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["isActive"], false);

    let response = assign(&pool, &token, route, json!({ "vehicleId": vehicle })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        delete_auth(build_test_app(pool), &format!("/api/transport/routes/{route}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
