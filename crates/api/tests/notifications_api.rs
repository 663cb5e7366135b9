//! Notification routing and the `/api/notifications` endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    build_test_app, create_user, expect_data, get_auth, post_auth, seed_hierarchy, token_for,
};
use crou_api::notifications::NotificationRouter;
use crou_core::event_types::{EVT_BUDGET_SUBMITTED, EVT_CAMPAIGN_COMPLETED};
use crou_events::{EventPersistence, PersistedEvent, PlatformEvent};
use sqlx::PgPool;

async fn persist_and_route(pool: &PgPool, event: PlatformEvent) -> usize {
    let id = EventPersistence::persist(pool, &event)
        .await
        .expect("event should persist");
    NotificationRouter::new(pool.clone())
        .route_event(&PersistedEvent { id, event })
        .await
        .expect("routing should succeed")
}

/// A submission reaches approvers in the CROU's ancestry, not the
/// submitter, not readers and not sibling CROUs.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submission_notifies_ancestor_approvers(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let submitter = create_user(&pool, tree.crou.id, "gestionnaire", "gest@crou.ne").await;
    let regional = create_user(&pool, tree.region.id, "gestionnaire", "gest@region.ne").await;
    let minister = create_user(&pool, tree.ministry.id, "admin", "admin@min.ne").await;
    let reader = create_user(&pool, tree.region.id, "lecteur", "lect@region.ne").await;
    let sibling = create_user(&pool, tree.other_crou.id, "gestionnaire", "gest@ds.ne").await;

    let event = PlatformEvent::new(EVT_BUDGET_SUBMITTED)
        .with_actor(submitter.id)
        .with_tenant(tree.crou.id)
        .with_payload(serde_json::json!({ "title": "Budget 2026", "fiscalYear": 2026 }));
    assert_eq!(persist_and_route(&pool, event).await, 2);

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/notifications", &token_for(&regional, "gestionnaire")).await,
        StatusCode::OK,
    )
    .await;
    let list = data.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Budget 'Budget 2026' submitted for approval");
    assert_eq!(list[0]["body"], "Fiscal year 2026");
    assert_eq!(list[0]["isRead"], false);

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/notifications/unread-count", &token_for(&minister, "admin")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["count"], 1);

    for (user, role) in [(&submitter, "gestionnaire"), (&reader, "lecteur"), (&sibling, "gestionnaire")] {
        let data = expect_data(
            get_auth(build_test_app(pool.clone()), "/api/notifications/unread-count", &token_for(user, role)).await,
            StatusCode::OK,
        )
        .await;
        assert_eq!(data["count"], 0, "{} should not be notified", user.email);
    }
}

/// Batch outcomes are delivered to the user who started the run.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_campaign_outcome_reaches_actor(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let operator = create_user(&pool, tree.crou.id, "gestionnaire", "gest@crou.ne").await;

    let event = PlatformEvent::new(EVT_CAMPAIGN_COMPLETED)
        .with_actor(operator.id)
        .with_tenant(tree.crou.id)
        .with_payload(serde_json::json!({ "name": "Rentrée", "assigned": 3, "unassigned": 2 }));
    assert_eq!(persist_and_route(&pool, event).await, 1);

    let data = expect_data(
        get_auth(build_test_app(pool), "/api/notifications", &token_for(&operator, "gestionnaire")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data[0]["body"], "3 assigned, 2 unassigned");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_event_has_no_recipients(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    create_user(&pool, tree.crou.id, "admin", "admin@crou.ne").await;
    let event = PlatformEvent::new("something.else").with_tenant(tree.crou.id);
    assert_eq!(persist_and_route(&pool, event).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mark_read(pool: PgPool) {
    let tree = seed_hierarchy(&pool).await;
    let submitter = create_user(&pool, tree.crou.id, "gestionnaire", "gest@crou.ne").await;
    let regional = create_user(&pool, tree.region.id, "gestionnaire", "gest@region.ne").await;
    let minister = create_user(&pool, tree.ministry.id, "gestionnaire", "gest@min.ne").await;
    let token = token_for(&regional, "gestionnaire");

    for title in ["A", "B"] {
        let event = PlatformEvent::new(EVT_BUDGET_SUBMITTED)
            .with_actor(submitter.id)
            .with_tenant(tree.crou.id)
            .with_payload(serde_json::json!({ "title": title, "fiscalYear": 2026 }));
        persist_and_route(&pool, event).await;
    }

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/notifications", &token).await,
        StatusCode::OK,
    )
    .await;
    let id = data[0]["id"].as_i64().unwrap();
    let uri = format!("/api/notifications/{id}/read");

    // Someone else's notification is invisible.
    let response =
        post_auth(build_test_app(pool.clone()), &uri, &token_for(&minister, "gestionnaire")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = post_auth(build_test_app(pool.clone()), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let data = expect_data(
        get_auth(build_test_app(pool.clone()), "/api/notifications?unreadOnly=true", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data.as_array().unwrap().len(), 1);

    let data = expect_data(
        post_auth(build_test_app(pool.clone()), "/api/notifications/read-all", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["markedRead"], 1);

    let data = expect_data(
        get_auth(build_test_app(pool), "/api/notifications/unread-count", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(data["count"], 0);
}
