//! Repository for the `meals` table (meal service sessions).

use chrono::NaiveDate;
use crou_core::restauration::MealStatus;
use crou_core::status::StatusEnum;
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::restauration::{CreateMeal, Meal};

const COLUMNS: &str = "id, restaurant_id, menu_id, service_date, meal_type, status_id, \
                       expected_count, served_count, started_at, closed_at, created_at, updated_at";

pub struct MealRepo;

impl MealRepo {
    pub async fn create(pool: &PgPool, input: &CreateMeal) -> Result<Meal, sqlx::Error> {
        let query = format!(
            "INSERT INTO meals (restaurant_id, menu_id, service_date, meal_type, expected_count)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Meal>(&query)
            .bind(input.restaurant_id)
            .bind(input.menu_id)
            .bind(input.service_date)
            .bind(input.meal_type.as_str())
            .bind(input.expected_count)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Meal>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM meals WHERE id = $1");
        sqlx::query_as::<_, Meal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        restaurant_id: DbId,
        date: Option<NaiveDate>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Meal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM meals
             WHERE restaurant_id = $1 AND ($2::date IS NULL OR service_date = $2)
             ORDER BY service_date DESC,
                      CASE meal_type WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 ELSE 2 END
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Meal>(&query)
            .bind(restaurant_id)
            .bind(date)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Start or close service if the meal is still in `from`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: MealStatus,
        to: MealStatus,
    ) -> Result<Option<Meal>, sqlx::Error> {
        let query = format!(
            "UPDATE meals SET
                status_id = $3,
                started_at = CASE WHEN $3 = $4 THEN NOW() ELSE started_at END,
                closed_at = CASE WHEN $3 = $5 THEN NOW() ELSE closed_at END
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Meal>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(MealStatus::Serving.id())
            .bind(MealStatus::Closed.id())
            .fetch_optional(pool)
            .await
    }

    /// Count one more served ticket while the meal is serving and return
    /// the new count. `None` if service has closed in the meantime.
    pub async fn increment_served(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<i32>, sqlx::Error> {
        let row: Option<(i32,)> = sqlx::query_as(
            "UPDATE meals SET served_count = served_count + 1
             WHERE id = $1 AND status_id = $2
             RETURNING served_count",
        )
        .bind(id)
        .bind(MealStatus::Serving.id())
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|(count,)| count))
    }
}
