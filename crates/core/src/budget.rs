//! Hierarchical budget allocation rules.
//!
//! Funds flow down the tenant tree one level at a time: the ministry
//! allocates to regions, regions allocate to their CROUs. An allocation is
//! requested (`pending`), decided (`approved` / `rejected`) and finally
//! `executed`, at which point the amounts move between the two budgets.
//! Approved-but-unexecuted allocations reserve funds on the source budget.

use crate::error::CoreError;
use crate::status::{define_status_enum, Lifecycle, StatusEnum};
use crate::tenant::TenantType;
use crate::types::{Amount, DbId};

define_status_enum! {
    /// Budget lifecycle status.
    BudgetStatus ("Budget") {
        Draft = 1 => "draft",
        Submitted = 2 => "submitted",
        Approved = 3 => "approved",
        Rejected = 4 => "rejected",
        Closed = 5 => "closed",
    }
}

impl Lifecycle for BudgetStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use BudgetStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Rejected, Draft)
                | (Approved, Closed)
        )
    }
}

impl BudgetStatus {
    /// Amount fields may only be edited before submission.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

define_status_enum! {
    /// Allocation workflow status.
    AllocationStatus ("Allocation") {
        Pending = 1 => "pending",
        Approved = 2 => "approved",
        Rejected = 3 => "rejected",
        Executed = 4 => "executed",
        Cancelled = 5 => "cancelled",
    }
}

impl Lifecycle for AllocationStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use AllocationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Executed)
                | (Approved, Cancelled)
        )
    }
}

define_status_enum! {
    /// Budget transaction (expense) status.
    TransactionStatus ("Transaction") {
        Pending = 1 => "pending",
        Validated = 2 => "validated",
        Rejected = 3 => "rejected",
    }
}

impl Lifecycle for TransactionStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use TransactionStatus::*;
        matches!((self, next), (Pending, Validated) | (Pending, Rejected))
    }
}

/// The four running totals stored on a budget row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetAmounts {
    /// Own funds voted for the tenant (the ministry's envelope).
    pub initial: Amount,
    /// Funds received from executed allocations of the parent.
    pub received: Amount,
    /// Funds sent to children through executed allocations.
    pub allocated: Amount,
    /// Funds consumed by validated transactions.
    pub spent: Amount,
}

impl BudgetAmounts {
    /// Total resources of the budget.
    pub fn total(&self) -> Amount {
        self.initial.saturating_add(self.received)
    }

    /// Funds still free to allocate or spend.
    pub fn available(&self) -> Amount {
        self.total()
            .saturating_sub(self.allocated)
            .saturating_sub(self.spent)
    }
}

/// Largest single amount accepted anywhere, in FCFA (one quadrillion).
/// Keeps every sum of budget totals far from `i64` overflow.
pub const MAX_AMOUNT: Amount = 1_000_000_000_000_000;

/// Smallest and largest fiscal years accepted on budgets.
pub const MIN_FISCAL_YEAR: i32 = 2000;
pub const MAX_FISCAL_YEAR: i32 = 2100;

pub fn validate_fiscal_year(year: i32) -> Result<(), CoreError> {
    if (MIN_FISCAL_YEAR..=MAX_FISCAL_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Fiscal year {year} is outside {MIN_FISCAL_YEAR}-{MAX_FISCAL_YEAR}"
        )))
    }
}

pub fn validate_positive_amount(amount: Amount) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation(format!(
            "Amount must be strictly positive, got {amount}"
        )));
    }
    check_ceiling(amount)
}

pub fn validate_initial_amount(amount: Amount) -> Result<(), CoreError> {
    if amount < 0 {
        return Err(CoreError::Validation(format!(
            "Initial amount cannot be negative, got {amount}"
        )));
    }
    check_ceiling(amount)
}

fn check_ceiling(amount: Amount) -> Result<(), CoreError> {
    if amount > MAX_AMOUNT {
        return Err(CoreError::Validation(format!(
            "Amount {amount} exceeds the maximum of {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// One side of a proposed allocation, as the handler resolves it.
#[derive(Debug, Clone, Copy)]
pub struct AllocationParty {
    pub budget_id: DbId,
    pub tenant_id: DbId,
    pub tenant_type: TenantType,
    pub parent_tenant_id: Option<DbId>,
    pub fiscal_year: i32,
    pub status: BudgetStatus,
}

/// Check that an allocation may flow from `source` to `target`.
///
/// Allocations go one level down to a direct child, within the same
/// fiscal year, between two approved budgets.
pub fn validate_allocation_route(
    source: &AllocationParty,
    target: &AllocationParty,
) -> Result<(), CoreError> {
    if source.budget_id == target.budget_id {
        return Err(CoreError::Validation(
            "An allocation cannot target its own budget".into(),
        ));
    }
    if source.tenant_type.child_type() != Some(target.tenant_type) {
        return Err(CoreError::Validation(format!(
            "Allocations flow from a {} to its {} children only",
            source.tenant_type.as_str(),
            source
                .tenant_type
                .child_type()
                .map(TenantType::as_str)
                .unwrap_or("(none)")
        )));
    }
    if target.parent_tenant_id != Some(source.tenant_id) {
        return Err(CoreError::Validation(
            "Target tenant is not a direct child of the source tenant".into(),
        ));
    }
    if source.fiscal_year != target.fiscal_year {
        return Err(CoreError::Validation(format!(
            "Fiscal years differ: source {} vs target {}",
            source.fiscal_year, target.fiscal_year
        )));
    }
    for (side, party) in [("Source", source), ("Target", target)] {
        if party.status != BudgetStatus::Approved {
            return Err(CoreError::Conflict(format!(
                "{side} budget must be approved (currently '{}')",
                party.status.as_str()
            )));
        }
    }
    Ok(())
}

/// Check that `amount` fits in the funds still free on a budget.
///
/// `reserved` is the sum of approved-but-unexecuted allocations that do not
/// include the one being checked.
pub fn check_availability(
    amounts: &BudgetAmounts,
    reserved: Amount,
    amount: Amount,
) -> Result<(), CoreError> {
    let free = amounts.available().saturating_sub(reserved);
    if amount <= free {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Insufficient funds: requested {amount}, available {free}"
        )))
    }
}

/// A rejection must say why.
pub fn validate_rejection_reason(reason: Option<&str>) -> Result<String, CoreError> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(CoreError::Validation("A rejection reason is required".into())),
    }
}

/// Share of `total` consumed by `spent`, as a percentage with one decimal.
pub fn execution_rate(spent: Amount, total: Amount) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((spent as f64 / total as f64) * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ensure_transition;
    use assert_matches::assert_matches;

    fn party(budget_id: DbId, tenant_id: DbId, t: TenantType, parent: Option<DbId>) -> AllocationParty {
        AllocationParty {
            budget_id,
            tenant_id,
            tenant_type: t,
            parent_tenant_id: parent,
            fiscal_year: 2026,
            status: BudgetStatus::Approved,
        }
    }

    #[test]
    fn budget_lifecycle() {
        use BudgetStatus::*;
        assert!(ensure_transition(Draft, Submitted).is_ok());
        assert!(ensure_transition(Submitted, Approved).is_ok());
        assert!(ensure_transition(Submitted, Rejected).is_ok());
        assert!(ensure_transition(Rejected, Draft).is_ok());
        assert!(ensure_transition(Approved, Closed).is_ok());

        assert!(ensure_transition(Draft, Approved).is_err());
        assert!(ensure_transition(Closed, Draft).is_err());
        assert!(ensure_transition(Approved, Draft).is_err());
    }

    #[test]
    fn allocation_lifecycle() {
        use AllocationStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Executed));
        assert!(Approved.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Executed));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Executed.can_transition_to(Cancelled));
        assert!(!Executed.can_transition_to(Executed));
    }

    #[test]
    fn transaction_lifecycle() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Validated));
        assert!(!Validated.can_transition_to(Rejected));
    }

    #[test]
    fn available_subtracts_outflows() {
        let a = BudgetAmounts {
            initial: 1_000,
            received: 500,
            allocated: 600,
            spent: 100,
        };
        assert_eq!(a.total(), 1_500);
        assert_eq!(a.available(), 800);
    }

    #[test]
    fn availability_accounts_for_reservations() {
        let a = BudgetAmounts {
            initial: 1_000,
            ..Default::default()
        };
        assert!(check_availability(&a, 0, 1_000).is_ok());
        assert!(check_availability(&a, 400, 600).is_ok());
        assert_matches!(
            check_availability(&a, 400, 601),
            Err(CoreError::Conflict(msg)) if msg.contains("available 600")
        );
    }

    #[test]
    fn route_ministry_to_region() {
        let src = party(1, 10, TenantType::Ministere, None);
        let dst = party(2, 20, TenantType::Region, Some(10));
        assert!(validate_allocation_route(&src, &dst).is_ok());
    }

    #[test]
    fn route_rejects_skipping_a_level() {
        let src = party(1, 10, TenantType::Ministere, None);
        let dst = party(3, 30, TenantType::Crou, Some(20));
        assert_matches!(
            validate_allocation_route(&src, &dst),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn route_rejects_upward_flow() {
        let src = party(2, 20, TenantType::Region, Some(10));
        let dst = party(1, 10, TenantType::Ministere, None);
        assert!(validate_allocation_route(&src, &dst).is_err());
    }

    #[test]
    fn route_rejects_foreign_child() {
        let src = party(2, 20, TenantType::Region, Some(10));
        let dst = party(3, 30, TenantType::Crou, Some(21));
        let err = validate_allocation_route(&src, &dst).unwrap_err();
        assert!(err.to_string().contains("direct child"));
    }

    #[test]
    fn route_rejects_mismatched_years_and_unapproved_budgets() {
        let src = party(2, 20, TenantType::Region, Some(10));
        let mut dst = party(3, 30, TenantType::Crou, Some(20));
        dst.fiscal_year = 2027;
        assert!(validate_allocation_route(&src, &dst).is_err());

        dst.fiscal_year = 2026;
        dst.status = BudgetStatus::Draft;
        assert_matches!(
            validate_allocation_route(&src, &dst),
            Err(CoreError::Conflict(msg)) if msg.starts_with("Target")
        );
    }

    #[test]
    fn rejection_reason_required() {
        assert!(validate_rejection_reason(None).is_err());
        assert!(validate_rejection_reason(Some("   ")).is_err());
        assert_eq!(
            validate_rejection_reason(Some(" over ceiling ")).unwrap(),
            "over ceiling"
        );
    }

    #[test]
    fn amounts() {
        assert!(validate_positive_amount(1).is_ok());
        assert!(validate_positive_amount(0).is_err());
        assert!(validate_initial_amount(0).is_ok());
        assert!(validate_initial_amount(-5).is_err());
        assert!(validate_fiscal_year(2026).is_ok());
        assert!(validate_fiscal_year(1999).is_err());
    }

    #[test]
    fn amounts_are_capped() {
        assert!(validate_initial_amount(MAX_AMOUNT).is_ok());
        assert!(validate_initial_amount(MAX_AMOUNT + 1).is_err());
        assert!(validate_initial_amount(Amount::MAX).is_err());
        assert!(validate_positive_amount(MAX_AMOUNT).is_ok());
        assert!(validate_positive_amount(Amount::MAX).is_err());
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let amounts = BudgetAmounts {
            initial: Amount::MAX,
            received: 1,
            ..Default::default()
        };
        assert_eq!(amounts.total(), Amount::MAX);
        assert_eq!(amounts.available(), Amount::MAX);

        let drained = BudgetAmounts {
            initial: 0,
            allocated: Amount::MAX,
            spent: Amount::MAX,
            ..Default::default()
        };
        assert_eq!(drained.available(), Amount::MIN);
        assert!(check_availability(&drained, Amount::MAX, 1).is_err());
    }

    #[test]
    fn execution_rate_rounds_to_one_decimal() {
        assert_eq!(execution_rate(0, 0), 0.0);
        assert_eq!(execution_rate(1, 3), 33.3);
        assert_eq!(execution_rate(500, 1000), 50.0);
    }
}
