//! Repository for `stock_items` and `stock_movements`.

use crou_core::restauration::MovementKind;
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::restauration::{CreateStockItem, StockItem, StockMovement};

const COLUMNS: &str = "id, restaurant_id, name, unit, quantity, alert_threshold, unit_cost, \
                       created_at, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, stock_item_id, kind, quantity, resulting_quantity, reason, created_by, created_at";

pub struct StockRepo;

impl StockRepo {
    pub async fn create(pool: &PgPool, input: &CreateStockItem) -> Result<StockItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO stock_items (restaurant_id, name, unit, quantity, alert_threshold, unit_cost)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StockItem>(&query)
            .bind(input.restaurant_id)
            .bind(&input.name)
            .bind(&input.unit)
            .bind(input.quantity)
            .bind(input.alert_threshold)
            .bind(input.unit_cost)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StockItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stock_items WHERE id = $1");
        sqlx::query_as::<_, StockItem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<StockItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stock_items WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, StockItem>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(pool: &PgPool, restaurant_id: DbId) -> Result<Vec<StockItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stock_items WHERE restaurant_id = $1 ORDER BY name");
        sqlx::query_as::<_, StockItem>(&query)
            .bind(restaurant_id)
            .fetch_all(pool)
            .await
    }

    /// Items at or below their alert threshold across the subtree.
    pub async fn low_stock(pool: &PgPool, scope_path: &str) -> Result<Vec<StockItem>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM stock_items s
             JOIN restaurants r ON r.id = s.restaurant_id
             JOIN tenants t ON t.id = r.tenant_id
             WHERE t.path LIKE $1 || '%' AND s.quantity <= s.alert_threshold
             ORDER BY s.quantity - s.alert_threshold, s.name",
            cols = qualified("s", COLUMNS)
        );
        sqlx::query_as::<_, StockItem>(&query)
            .bind(scope_path)
            .fetch_all(pool)
            .await
    }

    /// Write the new quantity of a locked item and log the movement.
    pub async fn record_movement(
        conn: &mut PgConnection,
        item_id: DbId,
        kind: MovementKind,
        quantity: f64,
        resulting_quantity: f64,
        reason: Option<&str>,
        actor: Option<DbId>,
    ) -> Result<StockMovement, sqlx::Error> {
        sqlx::query("UPDATE stock_items SET quantity = $2 WHERE id = $1")
            .bind(item_id)
            .bind(resulting_quantity)
            .execute(&mut *conn)
            .await?;

        let query = format!(
            "INSERT INTO stock_movements (stock_item_id, kind, quantity, resulting_quantity, reason, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MOVEMENT_COLUMNS}"
        );
        sqlx::query_as::<_, StockMovement>(&query)
            .bind(item_id)
            .bind(kind.as_str())
            .bind(quantity)
            .bind(resulting_quantity)
            .bind(reason)
            .bind(actor)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn movements(
        pool: &PgPool,
        item_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StockMovement>, sqlx::Error> {
        let query = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements
             WHERE stock_item_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, StockMovement>(&query)
            .bind(item_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
