//! HTTP-level integration tests for authentication and user administration.
//!
//! Covers login, token refresh and rotation, logout, account lockout,
//! the `/users/me` profile, and admin user management.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, create_user, delete_auth, expect_data, get, get_auth, post_json,
    post_json_auth, post_auth, seed_hierarchy, token_for, TEST_PASSWORD,
};
use crou_db::repositories::{RoleRepo, UserRepo};
use sqlx::PgPool;

async fn login(app: axum::Router, email: &str, password: &str) -> axum::response::Response {
    post_json(
        app,
        "/api/auth/login",
        serde_json::json!({ "email": email, "password": password }),
    )
    .await
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Successful login returns both tokens and the user without a password hash.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_success(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "gestionnaire", "gest@crou.ne").await;

    let data = expect_data(
        login(build_test_app(pool), "gest@crou.ne", TEST_PASSWORD).await,
        StatusCode::OK,
    )
    .await;

    assert!(data["tokens"]["accessToken"].is_string());
    assert!(data["tokens"]["refreshToken"].is_string());
    assert_eq!(data["tokens"]["expiresIn"], 15 * 60);
    assert_eq!(data["user"]["email"], "gest@crou.ne");
    assert_eq!(data["user"]["role"], "gestionnaire");
    assert_eq!(data["user"]["tenantId"], tree.crou.id);
    assert!(data["user"].get("passwordHash").is_none());
}

/// Emails are matched case-insensitively.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_normalizes_email(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    let response = login(build_test_app(pool), "  Agent@CROU.ne ", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_wrong_password(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    let response = login(build_test_app(pool), "agent@crou.ne", "wrong-password-1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Invalid email or password");
}

/// Unknown emails get the same answer as wrong passwords.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_unknown_email(pool: PgPool) {
    let response = login(build_test_app(pool), "nobody@crou.ne", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid email or password");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_deactivated_user(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;
    UserRepo::deactivate(&pool, user.id).await.unwrap();

    let response = login(build_test_app(pool), "agent@crou.ne", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Five consecutive failures lock the account, even for the right password.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_account_lockout(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    for _ in 0..5 {
        let response =
            login(build_test_app(pool.clone()), "agent@crou.ne", "wrong-password-1").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = login(build_test_app(pool.clone()), "agent@crou.ne", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let locked = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(locked.locked_until.is_some());
}

/// A successful login resets the failure counter.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_successful_login_resets_failures(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    for _ in 0..3 {
        login(build_test_app(pool.clone()), "agent@crou.ne", "wrong-password-1").await;
    }
    let response = login(build_test_app(pool.clone()), "agent@crou.ne", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let refreshed = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(refreshed.failed_login_count, 0);
    assert!(refreshed.last_login_at.is_some());
}

// ---------------------------------------------------------------------------
// Refresh and logout
// ---------------------------------------------------------------------------

/// Refresh rotates the token: the old one stops working.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_rotates_token(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    let data = expect_data(
        login(build_test_app(pool.clone()), "agent@crou.ne", TEST_PASSWORD).await,
        StatusCode::OK,
    )
    .await;
    let original = data["tokens"]["refreshToken"].as_str().unwrap().to_string();

    let body = serde_json::json!({ "refreshToken": original });
    let refreshed = expect_data(
        post_json(build_test_app(pool.clone()), "/api/auth/refresh", body.clone()).await,
        StatusCode::OK,
    )
    .await;
    let rotated = refreshed["tokens"]["refreshToken"].as_str().unwrap();
    assert_ne!(rotated, original);

    let replay = post_json(build_test_app(pool), "/api/auth/refresh", body).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_with_garbage_token(pool: PgPool) {
    let body = serde_json::json!({ "refreshToken": "not-a-real-token" });
    let response = post_json(build_test_app(pool), "/api/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Logout revokes every refresh token of the user.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_logout_revokes_refresh_tokens(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    let data = expect_data(
        login(build_test_app(pool.clone()), "agent@crou.ne", TEST_PASSWORD).await,
        StatusCode::OK,
    )
    .await;
    let access = data["tokens"]["accessToken"].as_str().unwrap();
    let refresh = data["tokens"]["refreshToken"].as_str().unwrap();

    let response = post_auth(build_test_app(pool.clone()), "/api/auth/logout", access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "refreshToken": refresh });
    let response = post_json(build_test_app(pool), "/api/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Authentication guard
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_protected_route_requires_token(pool: PgPool) {
    let response = get(build_test_app(pool), "/api/users/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_protected_route_rejects_bad_token(pool: PgPool) {
    let response = get_auth(build_test_app(pool), "/api/users/me", "not.a.jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// `/users/me` returns the profile, the tenant and the permission codes.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_me_returns_profile_and_permissions(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "lecteur", "lecteur@crou.ne").await;
    let token = token_for(&user, "lecteur");

    let data = expect_data(
        get_auth(build_test_app(pool), "/api/users/me", &token).await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(data["email"], "lecteur@crou.ne");
    assert_eq!(data["role"], "lecteur");
    assert_eq!(data["tenant"]["code"], "CROU-NY");
    let permissions: Vec<&str> = data["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"budget:read"));
    assert!(permissions.iter().all(|p| p.ends_with(":read")));
}

// ---------------------------------------------------------------------------
// Admin user management
// ---------------------------------------------------------------------------

/// An admin creates a user in a tenant of their subtree; the new user can log in.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_creates_user(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.region.id, "admin", "admin@region.ne").await;
    let token = token_for(&admin, "admin");
    let agent_role = RoleRepo::find_by_name(&pool, "agent").await.unwrap().unwrap();

    let body = serde_json::json!({
        "tenantId": tree.crou.id,
        "roleId": agent_role.id,
        "email": "New.Agent@crou.ne",
        "password": "Secur3Password",
        "firstName": "Aïcha",
        "lastName": "Issa",
    });
    let data = expect_data(
        post_json_auth(build_test_app(pool.clone()), "/api/admin/users", body, &token).await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(data["email"], "new.agent@crou.ne");
    assert_eq!(data["role"], "agent");
    assert_eq!(data["tenantId"], tree.crou.id);

    let response = login(build_test_app(pool), "new.agent@crou.ne", "Secur3Password").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_user_rejects_weak_password(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.crou.id, "admin", "admin@crou.ne").await;
    let token = token_for(&admin, "admin");
    let agent_role = RoleRepo::find_by_name(&pool, "agent").await.unwrap().unwrap();

    let body = serde_json::json!({
        "roleId": agent_role.id,
        "email": "weak@crou.ne",
        "password": "short",
        "firstName": "Weak",
        "lastName": "Password",
    });
    let response = post_json_auth(build_test_app(pool), "/api/admin/users", body, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_user_duplicate_email(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.crou.id, "admin", "admin@crou.ne").await;
    let token = token_for(&admin, "admin");

    let body = serde_json::json!({
        "roleId": admin.role_id,
        "email": "admin@crou.ne",
        "password": "Secur3Password",
        "firstName": "Dup",
        "lastName": "Licate",
    });
    let response = post_json_auth(build_test_app(pool), "/api/admin/users", body, &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

/// Only a super admin can hand out the super admin role.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_cannot_grant_super_admin(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.region.id, "admin", "admin@region.ne").await;
    let token = token_for(&admin, "admin");
    let super_role = RoleRepo::find_by_name(&pool, "super_admin").await.unwrap().unwrap();

    let body = serde_json::json!({
        "roleId": super_role.id,
        "email": "escalate@region.ne",
        "password": "Secur3Password",
        "firstName": "Esca",
        "lastName": "Late",
    });
    let response = post_json_auth(build_test_app(pool), "/api/admin/users", body, &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Users outside the caller's subtree are invisible.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_cannot_see_sibling_users(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.crou.id, "admin", "admin@crou.ne").await;
    let token = token_for(&admin, "admin");
    let other = create_user(&pool, tree.other_crou.id, "agent", "agent@other.ne").await;

    let uri = format!("/api/admin/users/{}", other.id);
    let response = get_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(build_test_app(pool), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Non-admins lack `users:manage`.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_gestionnaire_cannot_manage_users(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "gestionnaire", "gest@crou.ne").await;
    let token = token_for(&user, "gestionnaire");

    let response = get_auth(build_test_app(pool), "/api/admin/users", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_deactivates_user(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let admin = create_user(&pool, tree.region.id, "admin", "admin@region.ne").await;
    let token = token_for(&admin, "admin");
    let agent = create_user(&pool, tree.crou.id, "agent", "agent@crou.ne").await;

    let uri = format!("/api/admin/users/{}", agent.id);
    let response = delete_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = login(build_test_app(pool), "agent@crou.ne", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_roles(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let user = create_user(&pool, tree.crou.id, "lecteur", "lecteur@crou.ne").await;
    let token = token_for(&user, "lecteur");

    let data = expect_data(
        get_auth(build_test_app(pool), "/api/roles", &token).await,
        StatusCode::OK,
    )
    .await;
    let names: Vec<&str> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    for expected in ["super_admin", "admin", "gestionnaire", "agent", "lecteur"] {
        assert!(names.contains(&expected), "missing role {expected}");
    }
}
