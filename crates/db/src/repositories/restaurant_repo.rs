//! Repository for `restaurants` and their `menus`.

use chrono::NaiveDate;
use crou_core::types::DbId;
use sqlx::PgPool;

use super::qualified;
use crate::models::restauration::{CreateMenu, CreateRestaurant, Menu, Restaurant, UpdateMenu, UpdateRestaurant};

const COLUMNS: &str = "id, tenant_id, code, name, location, capacity, is_active, created_at, updated_at";

const MENU_COLUMNS: &str = "id, restaurant_id, menu_date, meal_type, description, price, \
                            created_at, updated_at";

pub struct RestaurantRepo;

impl RestaurantRepo {
    pub async fn create(pool: &PgPool, input: &CreateRestaurant) -> Result<Restaurant, sqlx::Error> {
        let query = format!(
            "INSERT INTO restaurants (tenant_id, code, name, location, capacity)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Restaurant>(&query)
            .bind(input.tenant_id)
            .bind(&input.code)
            .bind(&input.name)
            .bind(&input.location)
            .bind(input.capacity)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Restaurant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM restaurants WHERE id = $1");
        sqlx::query_as::<_, Restaurant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Restaurant>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM restaurants r
             JOIN tenants t ON t.id = r.tenant_id
             WHERE t.path LIKE $1 || '%' AND ($2 OR r.is_active)
             ORDER BY r.name
             LIMIT $3 OFFSET $4",
            cols = qualified("r", COLUMNS)
        );
        sqlx::query_as::<_, Restaurant>(&query)
            .bind(scope_path)
            .bind(include_inactive)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateRestaurant,
    ) -> Result<Option<Restaurant>, sqlx::Error> {
        let query = format!(
            "UPDATE restaurants SET
                name = COALESCE($2, name),
                location = COALESCE($3, location),
                capacity = COALESCE($4, capacity),
                is_active = COALESCE($5, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Restaurant>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.location)
            .bind(input.capacity)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Soft-deactivate a restaurant. Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE restaurants SET is_active = false WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- menus --------------------------------------------------------------

    pub async fn create_menu(pool: &PgPool, input: &CreateMenu) -> Result<Menu, sqlx::Error> {
        let query = format!(
            "INSERT INTO menus (restaurant_id, menu_date, meal_type, description, price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {MENU_COLUMNS}"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(input.restaurant_id)
            .bind(input.menu_date)
            .bind(input.meal_type.as_str())
            .bind(&input.description)
            .bind(input.price)
            .fetch_one(pool)
            .await
    }

    pub async fn find_menu(pool: &PgPool, id: DbId) -> Result<Option<Menu>, sqlx::Error> {
        let query = format!("SELECT {MENU_COLUMNS} FROM menus WHERE id = $1");
        sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Menus of a restaurant between two dates (inclusive).
    pub async fn list_menus(
        pool: &PgPool,
        restaurant_id: DbId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Menu>, sqlx::Error> {
        let query = format!(
            "SELECT {MENU_COLUMNS} FROM menus
             WHERE restaurant_id = $1
               AND ($2::date IS NULL OR menu_date >= $2)
               AND ($3::date IS NULL OR menu_date <= $3)
             ORDER BY menu_date,
                      CASE meal_type WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 ELSE 2 END"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(restaurant_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    pub async fn update_menu(
        pool: &PgPool,
        id: DbId,
        input: &UpdateMenu,
    ) -> Result<Option<Menu>, sqlx::Error> {
        let query = format!(
            "UPDATE menus SET
                description = COALESCE($2, description),
                price = COALESCE($3, price)
             WHERE id = $1
             RETURNING {MENU_COLUMNS}"
        );
        sqlx::query_as::<_, Menu>(&query)
            .bind(id)
            .bind(&input.description)
            .bind(input.price)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_menu(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
