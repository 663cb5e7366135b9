#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use crou_api::auth::jwt::{generate_access_token, JwtConfig, TokenSubject};
use crou_api::auth::password::hash_password;
use crou_api::config::{LogFormat, ServerConfig};
use crou_api::engine::housing_batch::BatchTasks;
use crou_api::router::build_app_router;
use crou_api::state::AppState;
use crou_core::tenant::TenantType;
use crou_core::types::DbId;
use crou_db::models::tenant::{CreateTenant, Tenant};
use crou_db::models::user::{CreateUser, User};
use crou_db::repositories::{RoleRepo, TenantRepo, UserRepo};
use crou_events::EventBus;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "niamey2026pass";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: String::new(),
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        ticket_qr_secret: "test-qr-secret".to_string(),
        housing_batch_chunk_size: 2,
        log_format: LogFormat::Text,
    }
}

/// Build the full application router over `pool`, same middleware as production.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
        batch_tasks: BatchTasks::new(),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Ministry → region → two CROUs.
pub struct Hierarchy {
    pub ministry: Tenant,
    pub region: Tenant,
    pub crou: Tenant,
    pub other_crou: Tenant,
}

pub async fn create_tenant(
    pool: &PgPool,
    code: &str,
    tenant_type: TenantType,
    parent: Option<&Tenant>,
) -> Tenant {
    TenantRepo::create(
        pool,
        &CreateTenant {
            code: code.to_string(),
            name: format!("{code} tenant"),
            tenant_type,
            parent_id: parent.map(|p| p.id),
            parent_path: parent.map(|p| p.path.clone()),
            service_type: None,
        },
    )
    .await
    .expect("tenant creation should succeed")
}

pub async fn seed_hierarchy(pool: &PgPool) -> Hierarchy {
    let ministry = create_tenant(pool, "MIN", TenantType::Ministere, None).await;
    let region = create_tenant(pool, "REG-NY", TenantType::Region, Some(&ministry)).await;
    let crou = create_tenant(pool, "CROU-NY", TenantType::Crou, Some(&region)).await;
    let other_crou = create_tenant(pool, "CROU-DS", TenantType::Crou, Some(&region)).await;
    Hierarchy {
        ministry,
        region,
        crou,
        other_crou,
    }
}

/// Create an active user with the seeded role `role` and [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, tenant_id: DbId, role: &str, email: &str) -> User {
    let role_row = RoleRepo::find_by_name(pool, role)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("role {role} should be seeded"));
    UserRepo::create(
        pool,
        &CreateUser {
            tenant_id,
            role_id: role_row.id,
            email: email.to_string(),
            password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
            first_name: "Test".to_string(),
            last_name: role.to_string(),
            phone: None,
        },
    )
    .await
    .expect("user creation should succeed")
}

/// Access token for `user`, signed with the test secret.
pub fn token_for(user: &User, role: &str) -> String {
    generate_access_token(
        TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role_id: user.role_id,
            role,
        },
        &test_config().jwt,
    )
    .expect("token generation should succeed")
}

/// Create a user and return their access token.
pub async fn login_as(pool: &PgPool, tenant_id: DbId, role: &str, email: &str) -> String {
    let user = create_user(pool, tenant_id, role, email).await;
    token_for(&user, role)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Assert the status, then return the `data` member of the body.
pub async fn expect_data(response: Response, status: StatusCode) -> serde_json::Value {
    let actual = response.status();
    let json = body_json(response).await;
    assert_eq!(actual, status, "unexpected status, body: {json}");
    json["data"].clone()
}
