use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify lookup tables and seeds.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    crou_db::health_check(&pool).await.unwrap();

    let tables = [
        "budget_statuses",
        "allocation_statuses",
        "transaction_statuses",
        "bed_statuses",
        "campaign_statuses",
        "application_statuses",
        "occupancy_statuses",
        "ticket_statuses",
        "meal_statuses",
        "vehicle_statuses",
        "roles",
        "permissions",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert!(count.0 > 0, "{table} should have seed data, got 0 rows");
    }
}

/// Lookup ids must line up with the status enums in crou-core.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_ids_match_enums(pool: PgPool) {
    use crou_core::budget::BudgetStatus;
    use crou_core::housing::CampaignStatus;
    use crou_core::restauration::TicketStatus;
    use crou_core::status::StatusEnum;
    use crou_core::transport::VehicleStatus;

    async fn names(pool: &PgPool, table: &str) -> Vec<(i16, String)> {
        sqlx::query_as(&format!("SELECT id, name FROM {table} ORDER BY id"))
            .fetch_all(pool)
            .await
            .unwrap()
    }

    fn labels<S: StatusEnum>() -> Vec<(i16, String)> {
        S::ALL.iter().map(|s| (s.id(), s.as_str().to_string())).collect()
    }

    assert_eq!(names(&pool, "budget_statuses").await, labels::<BudgetStatus>());
    assert_eq!(names(&pool, "campaign_statuses").await, labels::<CampaignStatus>());
    assert_eq!(names(&pool, "ticket_statuses").await, labels::<TicketStatus>());
    assert_eq!(names(&pool, "vehicle_statuses").await, labels::<VehicleStatus>());
}

/// Every seeded role exists and the super admin holds every permission.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_role_seeds(pool: PgPool) {
    use crou_core::roles::{ALL_PERMISSIONS, ROLE_VIEWER, ROLE_SUPER_ADMIN};
    use crou_db::repositories::RoleRepo;

    let admin = RoleRepo::find_by_name(&pool, ROLE_SUPER_ADMIN)
        .await
        .unwrap()
        .expect("super_admin seeded");
    let codes = RoleRepo::permission_codes(&pool, admin.id).await.unwrap();
    for perm in ALL_PERMISSIONS {
        assert!(codes.iter().any(|c| c == *perm), "super_admin missing {perm}");
    }

    let reader = RoleRepo::find_by_name(&pool, ROLE_VIEWER)
        .await
        .unwrap()
        .expect("lecteur seeded");
    let codes = RoleRepo::permission_codes(&pool, reader.id).await.unwrap();
    assert!(!codes.is_empty());
    assert!(codes.iter().all(|c| c.ends_with(":read")));
}

/// Foreign keys carry `fk_` names so errors quote a stable constraint.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_foreign_keys_are_named(pool: PgPool) {
    let unnamed: Vec<(String,)> = sqlx::query_as(
        "SELECT conname::text FROM pg_constraint c
         JOIN pg_namespace n ON n.oid = c.connamespace
         WHERE c.contype = 'f' AND n.nspname = current_schema()
           AND left(c.conname, 3) <> 'fk_'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert!(unnamed.is_empty(), "unnamed foreign keys: {unnamed:?}");

    let (occupancy_bed,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'fk_housing_occupancies_bed')",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(occupancy_bed);
}
