//! Integration tests for tenants and users against a real database.

use crou_core::tenant::TenantType;
use crou_db::models::tenant::{CreateTenant, Tenant, UpdateTenant};
use crou_db::models::user::CreateUser;
use crou_db::repositories::{RoleRepo, TenantRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_tenant(pool: &PgPool, code: &str, kind: TenantType, parent: Option<&Tenant>) -> Tenant {
    TenantRepo::create(
        pool,
        &CreateTenant {
            code: code.to_string(),
            name: format!("Tenant {code}"),
            tenant_type: kind,
            parent_id: parent.map(|p| p.id),
            parent_path: parent.map(|p| p.path.clone()),
            service_type: None,
        },
    )
    .await
    .unwrap()
}

/// Ministry -> two regions -> one CROU under the first region.
async fn seed_tree(pool: &PgPool) -> (Tenant, Tenant, Tenant, Tenant) {
    let ministry = create_tenant(pool, "MESR", TenantType::Ministere, None).await;
    let niamey = create_tenant(pool, "REG-NY", TenantType::Region, Some(&ministry)).await;
    let zinder = create_tenant(pool, "REG-ZR", TenantType::Region, Some(&ministry)).await;
    let crou = create_tenant(pool, "CROU-NY", TenantType::Crou, Some(&niamey)).await;
    (ministry, niamey, zinder, crou)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_paths_are_materialized(pool: PgPool) {
    let (ministry, niamey, _, crou) = seed_tree(&pool).await;

    assert_eq!(ministry.path, format!("/{}/", ministry.id));
    assert_eq!(niamey.path, format!("/{}/{}/", ministry.id, niamey.id));
    assert_eq!(crou.path, format!("{}{}/", niamey.path, crou.id));
    assert_eq!(crou.level, 2);
    assert_eq!(crou.kind().unwrap(), TenantType::Crou);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_subtree_listing(pool: PgPool) {
    let (ministry, niamey, zinder, crou) = seed_tree(&pool).await;

    let all = TenantRepo::list(&pool, &ministry.path, None, false, 50, 0).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].id, ministry.id, "shallowest first");

    let region = TenantRepo::descendants(&pool, &niamey.path).await.unwrap();
    let ids: Vec<_> = region.iter().map(|t| t.id).collect();
    assert!(ids.contains(&crou.id));
    assert!(!ids.contains(&zinder.id));
    assert!(!ids.contains(&ministry.id));

    let regions = TenantRepo::list(&pool, &ministry.path, Some("region"), false, 50, 0)
        .await
        .unwrap();
    assert_eq!(regions.len(), 2);

    let children = TenantRepo::children(&pool, ministry.id).await.unwrap();
    assert_eq!(children.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_code_rejected(pool: PgPool) {
    let (ministry, _, _, _) = seed_tree(&pool).await;

    let err = TenantRepo::create(
        &pool,
        &CreateTenant {
            code: "REG-NY".to_string(),
            name: "Duplicate".to_string(),
            tenant_type: TenantType::Region,
            parent_id: Some(ministry.id),
            parent_path: Some(ministry.path.clone()),
            service_type: None,
        },
    )
    .await
    .unwrap_err();

    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("uq_tenants_code"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deactivate_and_update(pool: PgPool) {
    let (ministry, niamey, _, crou) = seed_tree(&pool).await;

    assert_eq!(TenantRepo::count_active_children(&pool, niamey.id).await.unwrap(), 1);
    assert!(TenantRepo::deactivate(&pool, crou.id).await.unwrap());
    assert_eq!(TenantRepo::count_active_children(&pool, niamey.id).await.unwrap(), 0);

    let active = TenantRepo::list(&pool, &ministry.path, None, false, 50, 0).await.unwrap();
    assert_eq!(active.len(), 3);
    let everything = TenantRepo::list(&pool, &ministry.path, None, true, 50, 0).await.unwrap();
    assert_eq!(everything.len(), 4);

    let renamed = TenantRepo::update(
        &pool,
        niamey.id,
        &UpdateTenant {
            name: Some("Region de Niamey".to_string()),
            service_type: None,
            is_active: None,
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(renamed.name, "Region de Niamey");
    assert_eq!(renamed.path, niamey.path);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_lockout_counters(pool: PgPool) {
    let (ministry, _, _, _) = seed_tree(&pool).await;
    let role = RoleRepo::find_by_name(&pool, "agent").await.unwrap().unwrap();

    let user = UserRepo::create(
        &pool,
        &CreateUser {
            tenant_id: ministry.id,
            role_id: role.id,
            email: "agent@crou.ne".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            first_name: "Awa".to_string(),
            last_name: "Issa".to_string(),
            phone: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(UserRepo::increment_failed_login(&pool, user.id).await.unwrap(), 1);
    assert_eq!(UserRepo::increment_failed_login(&pool, user.id).await.unwrap(), 2);

    UserRepo::record_successful_login(&pool, user.id).await.unwrap();
    let reloaded = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.failed_login_count, 0);
    assert!(reloaded.last_login_at.is_some());

    let found = UserRepo::find_by_email(&pool, "agent@crou.ne").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));
}
