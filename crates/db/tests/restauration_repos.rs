//! Ticket numbering, single-use consumption and stock movements.

use chrono::NaiveDate;
use crou_core::restauration::{
    qr_code, ticket_number, MealStatus, MealType, MovementKind, TicketStatus,
};
use crou_core::tenant::TenantType;
use crou_db::models::restauration::{
    CreateMeal, CreateRestaurant, CreateStockItem, NewTicket, TicketBatch,
};
use crou_db::models::tenant::CreateTenant;
use crou_db::repositories::{MealRepo, RestaurantRepo, StockRepo, TenantRepo, TicketRepo};
use sqlx::PgPool;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

async fn ministry(pool: &PgPool) -> (i64, String) {
    let tenant = TenantRepo::create(
        pool,
        &CreateTenant {
            code: "MESR".to_string(),
            name: "Ministere".to_string(),
            tenant_type: TenantType::Ministere,
            parent_id: None,
            parent_path: None,
            service_type: None,
        },
    )
    .await
    .unwrap();
    (tenant.id, tenant.path)
}

async fn issue(pool: &PgPool, tenant_id: i64, count: i64) -> Vec<String> {
    let mut tx = pool.begin().await.unwrap();
    let first = TicketRepo::reserve_sequence(&mut tx, tenant_id, day(17), count)
        .await
        .unwrap();
    let tickets: Vec<NewTicket> = (first..first + count)
        .map(|seq| {
            let number = ticket_number("MESR", day(17), seq);
            NewTicket {
                qr_code: qr_code("secret", &number),
                ticket_number: number,
            }
        })
        .collect();
    let batch = TicketBatch {
        tenant_id,
        meal_type: Some(MealType::Lunch),
        price: 100,
        valid_from: day(17),
        valid_until: day(20),
        batch_ref: format!("BATCH-{first}"),
        created_by: None,
    };
    let rows = TicketRepo::insert_batch(&mut tx, &batch, &tickets).await.unwrap();
    tx.commit().await.unwrap();
    rows.into_iter().map(|t| t.ticket_number).collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ticket_numbers_continue_across_batches(pool: PgPool) {
    let (tenant_id, _) = ministry(&pool).await;

    let first = issue(&pool, tenant_id, 3).await;
    let second = issue(&pool, tenant_id, 2).await;

    assert_eq!(first[0], "TKT-MESR-20261017-000001");
    assert_eq!(first[2], "TKT-MESR-20261017-000003");
    assert_eq!(second, ["TKT-MESR-20261017-000004", "TKT-MESR-20261017-000005"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ticket_consumed_once(pool: PgPool) {
    let (tenant_id, _) = ministry(&pool).await;
    let numbers = issue(&pool, tenant_id, 1).await;

    let restaurant = RestaurantRepo::create(
        &pool,
        &CreateRestaurant {
            tenant_id,
            code: "RU-1".to_string(),
            name: "Restaurant central".to_string(),
            location: None,
            capacity: Some(400),
        },
    )
    .await
    .unwrap();
    let meal = MealRepo::create(
        &pool,
        &CreateMeal {
            restaurant_id: restaurant.id,
            menu_id: None,
            service_date: day(17),
            meal_type: MealType::Lunch,
            expected_count: None,
        },
    )
    .await
    .unwrap();
    MealRepo::transition(&pool, meal.id, MealStatus::Planned, MealStatus::Serving)
        .await
        .unwrap()
        .unwrap();

    // Lookup works by number and by QR payload.
    let ticket = TicketRepo::find_by_code(&pool, &numbers[0]).await.unwrap().unwrap();
    let by_qr = TicketRepo::find_by_code(&pool, &ticket.qr_code).await.unwrap().unwrap();
    assert_eq!(by_qr.id, ticket.id);

    let mut tx = pool.begin().await.unwrap();
    let used = TicketRepo::consume(&mut tx, ticket.id, meal.id, day(18)).await.unwrap();
    assert_eq!(used.unwrap().status().unwrap(), TicketStatus::Used);
    assert_eq!(MealRepo::increment_served(&mut tx, meal.id).await.unwrap(), Some(1));
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let replay = TicketRepo::consume(&mut tx, ticket.id, meal.id, day(18)).await.unwrap();
    assert!(replay.is_none());

    let meal = MealRepo::find_by_id(&pool, meal.id).await.unwrap().unwrap();
    assert_eq!(meal.served_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overdue_tickets_expire(pool: PgPool) {
    let (tenant_id, path) = ministry(&pool).await;
    issue(&pool, tenant_id, 2).await;

    assert_eq!(TicketRepo::expire_overdue(&pool, day(20)).await.unwrap(), 0);
    assert_eq!(TicketRepo::expire_overdue(&pool, day(21)).await.unwrap(), 2);

    let expired = TicketRepo::list(&pool, &path, Some(TicketStatus::Expired), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(expired.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stock_movements_and_low_stock(pool: PgPool) {
    let (tenant_id, path) = ministry(&pool).await;
    let restaurant = RestaurantRepo::create(
        &pool,
        &CreateRestaurant {
            tenant_id,
            code: "RU-2".to_string(),
            name: "Restaurant annexe".to_string(),
            location: None,
            capacity: None,
        },
    )
    .await
    .unwrap();
    let rice = StockRepo::create(
        &pool,
        &CreateStockItem {
            restaurant_id: restaurant.id,
            name: "Riz".to_string(),
            unit: "kg".to_string(),
            quantity: 50.0,
            alert_threshold: 20.0,
            unit_cost: Some(450),
        },
    )
    .await
    .unwrap();
    assert!(StockRepo::low_stock(&pool, &path).await.unwrap().is_empty());

    let mut tx = pool.begin().await.unwrap();
    StockRepo::lock(&mut tx, rice.id).await.unwrap().unwrap();
    let movement =
        StockRepo::record_movement(&mut tx, rice.id, MovementKind::Out, 35.0, 15.0, Some("service"), None)
            .await
            .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(movement.resulting_quantity, 15.0);

    let low = StockRepo::low_stock(&pool, &path).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].quantity, 15.0);

    let history = StockRepo::movements(&pool, rice.id, 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, "out");
}
