//! Repository for the `budgets` table.

use crou_core::budget::{AllocationStatus, BudgetStatus};
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::{Amount, DbId};
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::budget::{Budget, CreateBudget, UpdateBudget};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tenant_id, fiscal_year, title, initial_amount, received_amount, \
                       allocated_amount, spent_amount, status_id, rejection_reason, submitted_at, \
                       approved_at, approved_by, created_by, created_at, updated_at";

/// Provides CRUD, status transitions and amount bookkeeping for budgets.
pub struct BudgetRepo;

impl BudgetRepo {
    pub async fn create(pool: &PgPool, input: &CreateBudget) -> Result<Budget, sqlx::Error> {
        let query = format!(
            "INSERT INTO budgets (tenant_id, fiscal_year, title, initial_amount, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Budget>(&query)
            .bind(input.tenant_id)
            .bind(input.fiscal_year)
            .bind(&input.title)
            .bind(input.initial_amount)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Budget>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budgets WHERE id = $1");
        sqlx::query_as::<_, Budget>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load a budget and hold a row lock until the caller's transaction ends.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<Budget>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budgets WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Budget>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List budgets of tenants in the subtree at `scope_path`.
    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        fiscal_year: Option<i32>,
        status: Option<BudgetStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Budget>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM budgets b
             JOIN tenants t ON t.id = b.tenant_id
             WHERE t.path LIKE $1 || '%'
               AND ($2::int IS NULL OR b.fiscal_year = $2)
               AND ($3::smallint IS NULL OR b.status_id = $3)
             ORDER BY b.fiscal_year DESC, t.level, t.code
             LIMIT $4 OFFSET $5",
            cols = qualified("b", COLUMNS)
        );
        sqlx::query_as::<_, Budget>(&query)
            .bind(scope_path)
            .bind(fiscal_year)
            .bind(status.map(StatusId::from))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Edit title/initial amount while the budget is still editable.
    /// Returns `None` when the budget is missing or no longer editable.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateBudget,
    ) -> Result<Option<Budget>, sqlx::Error> {
        let query = format!(
            "UPDATE budgets SET
                title = COALESCE($2, title),
                initial_amount = COALESCE($3, initial_amount)
             WHERE id = $1 AND status_id IN ($4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Budget>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(input.initial_amount)
            .bind(BudgetStatus::Draft.id())
            .bind(BudgetStatus::Rejected.id())
            .fetch_optional(pool)
            .await
    }

    /// Move a budget from `from` to `to` if it is still in `from`.
    ///
    /// Stamps `submitted_at`, `approved_at`/`approved_by` or
    /// `rejection_reason` according to the target status. Returns `None`
    /// when the row was not in `from` (lost race or stale client).
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: BudgetStatus,
        to: BudgetStatus,
        actor: DbId,
        reason: Option<&str>,
    ) -> Result<Option<Budget>, sqlx::Error> {
        let query = format!(
            "UPDATE budgets SET
                status_id = $3,
                submitted_at = CASE WHEN $3 = $6 THEN NOW() ELSE submitted_at END,
                approved_at = CASE WHEN $3 = $7 THEN NOW() ELSE approved_at END,
                approved_by = CASE WHEN $3 = $7 THEN $4 ELSE approved_by END,
                rejection_reason = CASE
                    WHEN $3 = $8 THEN $5
                    WHEN $3 = $6 THEN NULL
                    ELSE rejection_reason END
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Budget>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(actor)
            .bind(reason)
            .bind(BudgetStatus::Submitted.id())
            .bind(BudgetStatus::Approved.id())
            .bind(BudgetStatus::Rejected.id())
            .fetch_optional(pool)
            .await
    }

    /// Sum of approved, not yet executed allocations drawing on a budget,
    /// optionally leaving one allocation out.
    pub async fn reserved_amount(
        conn: &mut PgConnection,
        budget_id: DbId,
        excluding_allocation: Option<DbId>,
    ) -> Result<Amount, sqlx::Error> {
        let (sum,): (Amount,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::bigint FROM budget_allocations
             WHERE source_budget_id = $1 AND status_id = $2
               AND ($3::bigint IS NULL OR id <> $3)",
        )
        .bind(budget_id)
        .bind(AllocationStatus::Approved.id())
        .bind(excluding_allocation)
        .fetch_one(conn)
        .await?;
        Ok(sum)
    }

    /// Reserved amounts for several budgets at once, as `(budget_id, amount)`.
    pub async fn reserved_amounts(
        pool: &PgPool,
        budget_ids: &[DbId],
    ) -> Result<Vec<(DbId, Amount)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT source_budget_id, COALESCE(SUM(amount), 0)::bigint FROM budget_allocations
             WHERE source_budget_id = ANY($1) AND status_id = $2
             GROUP BY source_budget_id",
        )
        .bind(budget_ids)
        .bind(AllocationStatus::Approved.id())
        .fetch_all(pool)
        .await
    }

    /// Move `amount` from `source` (allocated) to `target` (received).
    /// Both rows must already be locked by the caller's transaction.
    pub async fn transfer(
        conn: &mut PgConnection,
        source_id: DbId,
        target_id: DbId,
        amount: Amount,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE budgets SET allocated_amount = allocated_amount + $2 WHERE id = $1")
            .bind(source_id)
            .bind(amount)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE budgets SET received_amount = received_amount + $2 WHERE id = $1")
            .bind(target_id)
            .bind(amount)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Record a validated expense against a locked budget.
    pub async fn add_spent(
        conn: &mut PgConnection,
        id: DbId,
        amount: Amount,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE budgets SET spent_amount = spent_amount + $2 WHERE id = $1")
            .bind(id)
            .bind(amount)
            .execute(conn)
            .await?;
        Ok(())
    }
}
