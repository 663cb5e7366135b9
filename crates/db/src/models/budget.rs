//! Budget, allocation and transaction models.

use chrono::NaiveDate;
use crou_core::budget::{AllocationStatus, BudgetAmounts, BudgetStatus, TransactionStatus};
use crou_core::error::CoreError;
use crou_core::status::{self, StatusEnum, StatusId};
use crou_core::types::{Amount, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `budgets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: DbId,
    pub tenant_id: DbId,
    pub fiscal_year: i32,
    pub title: String,
    pub initial_amount: Amount,
    pub received_amount: Amount,
    pub allocated_amount: Amount,
    pub spent_amount: Amount,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<BudgetStatus, _>")]
    pub status_id: StatusId,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub approved_at: Option<Timestamp>,
    pub approved_by: Option<DbId>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Budget {
    pub fn status(&self) -> Result<BudgetStatus, CoreError> {
        BudgetStatus::try_from_id(self.status_id)
    }

    pub fn amounts(&self) -> BudgetAmounts {
        BudgetAmounts {
            initial: self.initial_amount,
            received: self.received_amount,
            allocated: self.allocated_amount,
            spent: self.spent_amount,
        }
    }
}

/// Budget plus its computed figures, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub total_amount: Amount,
    pub available_amount: Amount,
    /// Approved allocations not yet executed.
    pub reserved_amount: Amount,
}

impl BudgetView {
    pub fn new(budget: Budget, reserved_amount: Amount) -> Self {
        let amounts = budget.amounts();
        Self {
            budget,
            total_amount: amounts.total(),
            available_amount: amounts.available(),
            reserved_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBudget {
    pub tenant_id: DbId,
    pub fiscal_year: i32,
    pub title: String,
    pub initial_amount: Amount,
    pub created_by: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBudget {
    pub title: Option<String>,
    pub initial_amount: Option<Amount>,
}

/// A row from the `budget_allocations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAllocation {
    pub id: DbId,
    pub source_budget_id: DbId,
    pub target_budget_id: DbId,
    pub amount: Amount,
    pub purpose: String,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<AllocationStatus, _>")]
    pub status_id: StatusId,
    pub rejection_reason: Option<String>,
    pub requested_by: Option<DbId>,
    pub decided_by: Option<DbId>,
    pub decided_at: Option<Timestamp>,
    pub executed_by: Option<DbId>,
    pub executed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BudgetAllocation {
    pub fn status(&self) -> Result<AllocationStatus, CoreError> {
        AllocationStatus::try_from_id(self.status_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAllocation {
    pub source_budget_id: DbId,
    pub target_budget_id: DbId,
    pub amount: Amount,
    pub purpose: String,
    pub requested_by: Option<DbId>,
}

/// A row from the `budget_transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTransaction {
    pub id: DbId,
    pub budget_id: DbId,
    pub amount: Amount,
    pub category: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub transaction_date: NaiveDate,
    #[serde(rename = "status", serialize_with = "status::serialize_label::<TransactionStatus, _>")]
    pub status_id: StatusId,
    pub rejection_reason: Option<String>,
    pub created_by: Option<DbId>,
    pub validated_by: Option<DbId>,
    pub validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BudgetTransaction {
    pub fn status(&self) -> Result<TransactionStatus, CoreError> {
        TransactionStatus::try_from_id(self.status_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    pub budget_id: DbId,
    pub amount: Amount,
    pub category: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub created_by: Option<DbId>,
}
