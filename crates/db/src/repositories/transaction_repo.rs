//! Repository for the `budget_transactions` table.

use crou_core::budget::TransactionStatus;
use crou_core::status::StatusEnum;
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::budget::{BudgetTransaction, CreateTransaction};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, budget_id, amount, category, description, reference, transaction_date, \
                       status_id, rejection_reason, created_by, validated_by, validated_at, \
                       created_at, updated_at";

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateTransaction,
    ) -> Result<BudgetTransaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO budget_transactions
                (budget_id, amount, category, description, reference, transaction_date, created_by)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, CURRENT_DATE), $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetTransaction>(&query)
            .bind(input.budget_id)
            .bind(input.amount)
            .bind(&input.category)
            .bind(&input.description)
            .bind(&input.reference)
            .bind(input.transaction_date)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<BudgetTransaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budget_transactions WHERE id = $1");
        sqlx::query_as::<_, BudgetTransaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<BudgetTransaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budget_transactions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, BudgetTransaction>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list_for_budget(
        pool: &PgPool,
        budget_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BudgetTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM budget_transactions
             WHERE budget_id = $1
             ORDER BY transaction_date DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, BudgetTransaction>(&query)
            .bind(budget_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Validate or reject a pending transaction. Returns `None` if it was
    /// no longer pending.
    pub async fn decide<'e, E>(
        executor: E,
        id: DbId,
        to: TransactionStatus,
        actor: DbId,
        reason: Option<&str>,
    ) -> Result<Option<BudgetTransaction>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE budget_transactions SET
                status_id = $3,
                validated_by = $4,
                validated_at = NOW(),
                rejection_reason = $5
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetTransaction>(&query)
            .bind(id)
            .bind(TransactionStatus::Pending.id())
            .bind(to.id())
            .bind(actor)
            .bind(reason)
            .fetch_optional(executor)
            .await
    }
}
