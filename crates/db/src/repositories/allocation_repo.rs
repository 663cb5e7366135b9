//! Repository for the `budget_allocations` table.

use crou_core::budget::AllocationStatus;
use crou_core::status::{StatusEnum, StatusId};
use crou_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use super::qualified;
use crate::models::budget::{BudgetAllocation, CreateAllocation};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, source_budget_id, target_budget_id, amount, purpose, status_id, \
                       rejection_reason, requested_by, decided_by, decided_at, executed_by, \
                       executed_at, created_at, updated_at";

pub struct AllocationRepo;

impl AllocationRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateAllocation,
    ) -> Result<BudgetAllocation, sqlx::Error> {
        let query = format!(
            "INSERT INTO budget_allocations (source_budget_id, target_budget_id, amount, purpose, requested_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetAllocation>(&query)
            .bind(input.source_budget_id)
            .bind(input.target_budget_id)
            .bind(input.amount)
            .bind(&input.purpose)
            .bind(input.requested_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<BudgetAllocation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budget_allocations WHERE id = $1");
        sqlx::query_as::<_, BudgetAllocation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load an allocation under a row lock held by the caller's transaction.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<BudgetAllocation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM budget_allocations WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, BudgetAllocation>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List allocations whose source or target tenant is in the subtree at
    /// `scope_path`, newest first.
    pub async fn list(
        pool: &PgPool,
        scope_path: &str,
        budget_id: Option<DbId>,
        status: Option<AllocationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BudgetAllocation>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM budget_allocations a
             JOIN budgets sb ON sb.id = a.source_budget_id
             JOIN tenants st ON st.id = sb.tenant_id
             JOIN budgets tb ON tb.id = a.target_budget_id
             JOIN tenants tt ON tt.id = tb.tenant_id
             WHERE (st.path LIKE $1 || '%' OR tt.path LIKE $1 || '%')
               AND ($2::bigint IS NULL OR a.source_budget_id = $2 OR a.target_budget_id = $2)
               AND ($3::smallint IS NULL OR a.status_id = $3)
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT $4 OFFSET $5",
            cols = qualified("a", COLUMNS)
        );
        sqlx::query_as::<_, BudgetAllocation>(&query)
            .bind(scope_path)
            .bind(budget_id)
            .bind(status.map(StatusId::from))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move an allocation from `from` to `to` if it is still in `from`.
    ///
    /// Approve/reject/cancel stamp the decision columns, execute stamps the
    /// execution columns. Accepts a pool or a transaction connection.
    pub async fn transition<'e, E>(
        executor: E,
        id: DbId,
        from: AllocationStatus,
        to: AllocationStatus,
        actor: DbId,
        reason: Option<&str>,
    ) -> Result<Option<BudgetAllocation>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE budget_allocations SET
                status_id = $3,
                decided_by = CASE WHEN $3 = $6 THEN decided_by ELSE $4 END,
                decided_at = CASE WHEN $3 = $6 THEN decided_at ELSE NOW() END,
                executed_by = CASE WHEN $3 = $6 THEN $4 ELSE executed_by END,
                executed_at = CASE WHEN $3 = $6 THEN NOW() ELSE executed_at END,
                rejection_reason = COALESCE($5, rejection_reason)
             WHERE id = $1 AND status_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BudgetAllocation>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(actor)
            .bind(reason)
            .bind(AllocationStatus::Executed.id())
            .fetch_optional(executor)
            .await
    }
}
